pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod storage;
pub mod task_api;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");
