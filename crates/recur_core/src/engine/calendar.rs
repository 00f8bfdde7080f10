use time::{Date, Duration, Month};

/// Sunday on or before `date`.
pub(crate) fn week_start(date: Date) -> Date {
    let offset = i64::from(date.weekday().number_days_from_sunday());
    date.saturating_sub(Duration::days(offset))
}

/// Whole Sunday-started weeks between the weeks containing `from` and `to`.
pub(crate) fn weeks_between(from: Date, to: Date) -> i64 {
    (week_start(to) - week_start(from)).whole_weeks()
}

/// Months since year 0, so that consecutive months differ by one.
pub(crate) fn month_index(date: Date) -> i64 {
    i64::from(date.year()) * 12 + i64::from(u8::from(date.month())) - 1
}

pub(crate) fn days_in_month(year: i32, month: Month) -> u8 {
    match month {
        Month::February if time::util::is_leap_year(year) => 29,
        Month::February => 28,
        Month::April | Month::June | Month::September | Month::November => 30,
        _ => 31,
    }
}

/// `day` of the month at `index`, clamped to the month's last day. `None`
/// when the month falls outside the supported calendar range.
pub(crate) fn clamped_date(index: i64, day: u8) -> Option<Date> {
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    let month = Month::try_from(u8::try_from(index.rem_euclid(12) + 1).ok()?).ok()?;
    let day = day.min(days_in_month(year, month));
    Date::from_calendar_date(year, month, day).ok()
}
