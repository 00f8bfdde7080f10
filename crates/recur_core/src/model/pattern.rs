use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::{Date, Weekday};

/// Set of weekdays a weekly pattern fires on. Bit `n` is the weekday with
/// index `n`, counting from Sunday = 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub fn from_indices<I>(indices: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = u8>,
    {
        let mut bits = 0u8;
        for index in indices {
            if index > 6 {
                return Err(AppError::invalid_pattern(format!(
                    "day of week {index} is out of range 0..=6"
                )));
            }
            bits |= 1 << index;
        }
        Ok(Self(bits))
    }

    pub fn from_weekdays<I>(weekdays: I) -> Self
    where
        I: IntoIterator<Item = Weekday>,
    {
        weekdays
            .into_iter()
            .fold(Self(0), |set, day| Self(set.0 | 1 << day.number_days_from_sunday()))
    }

    pub fn contains(&self, weekday: Weekday) -> bool {
        self.0 & (1 << weekday.number_days_from_sunday()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn indices(&self) -> Vec<u8> {
        (0..7).filter(|index| self.0 & (1 << index) != 0).collect()
    }
}

/// Which dates a pattern selects, with the data each kind needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Daily,
    Weekly { days: WeekdaySet },
    Monthly { day: u8 },
    /// Opaque rule text, only meaningful to a registered custom evaluator.
    Custom { rule: String },
}

impl Rule {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly { .. } => "weekly",
            Self::Monthly { .. } => "monthly",
            Self::Custom { .. } => "custom",
        }
    }

    fn validate(&self) -> Result<(), AppError> {
        match self {
            Self::Weekly { days } if days.is_empty() => Err(AppError::invalid_pattern(
                "weekly pattern requires at least one day of week",
            )),
            Self::Monthly { day } if !(1..=31).contains(day) => Err(AppError::invalid_pattern(
                format!("day of month {day} is out of range 1..=31"),
            )),
            _ => Ok(()),
        }
    }
}

/// A validated recurrence pattern.
///
/// Every value of this type is structurally valid: weekly rules have at least
/// one weekday, monthly rules target a day in `1..=31`, the frequency is
/// positive and the end date (if any) is not before the start date. Values
/// can only be built through [`RecurrencePattern::new`], the `with_*`
/// builders or deserialization, all of which check these rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PatternRecord", into = "PatternRecord")]
pub struct RecurrencePattern {
    rule: Rule,
    frequency: u32,
    start_date: Date,
    end_date: Option<Date>,
}

impl RecurrencePattern {
    pub fn new(rule: Rule, start_date: Date) -> Result<Self, AppError> {
        rule.validate()?;
        Ok(Self {
            rule,
            frequency: 1,
            start_date,
            end_date: None,
        })
    }

    pub fn daily(start_date: Date) -> Self {
        Self {
            rule: Rule::Daily,
            frequency: 1,
            start_date,
            end_date: None,
        }
    }

    pub fn with_frequency(mut self, frequency: u32) -> Result<Self, AppError> {
        if frequency == 0 {
            return Err(AppError::invalid_pattern("frequency must be at least 1"));
        }
        self.frequency = frequency;
        Ok(self)
    }

    pub fn with_end_date(mut self, end_date: Date) -> Result<Self, AppError> {
        if end_date < self.start_date {
            return Err(AppError::invalid_pattern(format!(
                "end date {end_date} is before start date {}",
                self.start_date
            )));
        }
        self.end_date = Some(end_date);
        Ok(self)
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    pub fn start_date(&self) -> Date {
        self.start_date
    }

    pub fn end_date(&self) -> Option<Date> {
        self.end_date
    }

    /// True when `date` lies inside `[start_date, end_date]`.
    pub fn covers(&self, date: Date) -> bool {
        date >= self.start_date && self.end_date.is_none_or(|end| date <= end)
    }
}

impl fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match &self.rule {
            Rule::Daily => "day",
            Rule::Weekly { .. } => "week",
            Rule::Monthly { .. } => "month",
            Rule::Custom { rule } => return write!(f, "custom '{rule}' from {}", self.start_date),
        };
        if self.frequency == 1 {
            write!(f, "every {unit}")?;
        } else {
            write!(f, "every {} {unit}s", self.frequency)?;
        }
        match &self.rule {
            Rule::Weekly { days } => {
                let names: Vec<String> = days
                    .indices()
                    .into_iter()
                    .map(|index| weekday_from_index(index).to_string())
                    .collect();
                write!(f, " on {}", names.join(", "))?;
            }
            Rule::Monthly { day } => write!(f, " on day {day}")?,
            _ => {}
        }
        write!(f, " from {}", self.start_date)?;
        if let Some(end) = self.end_date {
            write!(f, " until {end}")?;
        }
        Ok(())
    }
}

pub(crate) fn weekday_from_index(index: u8) -> Weekday {
    match index {
        0 => Weekday::Sunday,
        1 => Weekday::Monday,
        2 => Weekday::Tuesday,
        3 => Weekday::Wednesday,
        4 => Weekday::Thursday,
        5 => Weekday::Friday,
        _ => Weekday::Saturday,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PatternKind {
    Daily,
    Weekly,
    Monthly,
    Custom,
}

fn default_frequency() -> u32 {
    1
}

/// Flat wire shape shared with the document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PatternRecord {
    #[serde(rename = "type")]
    kind: PatternKind,
    #[serde(default = "default_frequency")]
    frequency: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    days_of_week: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    day_of_month: Option<u32>,
    #[serde(with = "crate::iso_date")]
    start_date: Date,
    #[serde(
        default,
        with = "crate::iso_date::option",
        skip_serializing_if = "Option::is_none"
    )]
    end_date: Option<Date>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_pattern: Option<String>,
}

impl TryFrom<PatternRecord> for RecurrencePattern {
    type Error = AppError;

    fn try_from(record: PatternRecord) -> Result<Self, Self::Error> {
        let rule = match record.kind {
            PatternKind::Daily => Rule::Daily,
            PatternKind::Weekly => Rule::Weekly {
                days: WeekdaySet::from_indices(record.days_of_week.unwrap_or_default())?,
            },
            PatternKind::Monthly => {
                let day = record.day_of_month.ok_or_else(|| {
                    AppError::invalid_pattern("monthly pattern requires dayOfMonth")
                })?;
                let day = u8::try_from(day).map_err(|_| {
                    AppError::invalid_pattern(format!("day of month {day} is out of range 1..=31"))
                })?;
                Rule::Monthly { day }
            }
            PatternKind::Custom => Rule::Custom {
                rule: record.custom_pattern.unwrap_or_default(),
            },
        };

        let pattern = Self::new(rule, record.start_date)?.with_frequency(record.frequency)?;
        match record.end_date {
            Some(end) => pattern.with_end_date(end),
            None => Ok(pattern),
        }
    }
}

impl From<RecurrencePattern> for PatternRecord {
    fn from(pattern: RecurrencePattern) -> Self {
        let mut record = PatternRecord {
            kind: PatternKind::Daily,
            frequency: pattern.frequency,
            days_of_week: None,
            day_of_month: None,
            start_date: pattern.start_date,
            end_date: pattern.end_date,
            custom_pattern: None,
        };
        match pattern.rule {
            Rule::Daily => {}
            Rule::Weekly { days } => {
                record.kind = PatternKind::Weekly;
                record.days_of_week = Some(days.indices());
            }
            Rule::Monthly { day } => {
                record.kind = PatternKind::Monthly;
                record.day_of_month = Some(u32::from(day));
            }
            Rule::Custom { rule } => {
                record.kind = PatternKind::Custom;
                record.custom_pattern = Some(rule);
            }
        }
        record
    }
}
