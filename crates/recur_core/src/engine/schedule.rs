use super::RecurrenceEngine;
use super::calendar::{clamped_date, month_index, week_start, weeks_between};
use crate::model::{RecurrencePattern, Rule};
use time::{Date, Duration};

/// Consecutive non-due days an open-ended custom scan tolerates before
/// giving up.
pub(crate) const CUSTOM_SCAN_HORIZON_DAYS: u32 = 3_660;

impl RecurrenceEngine {
    /// True when `date` is an occurrence of `pattern`.
    pub fn is_due(&self, pattern: &RecurrencePattern, date: Date) -> bool {
        if !pattern.covers(date) {
            return false;
        }

        let start = pattern.start_date();
        let frequency = i64::from(pattern.frequency());
        match pattern.rule() {
            Rule::Daily => (date - start).whole_days() % frequency == 0,
            Rule::Weekly { days } => {
                days.contains(date.weekday()) && weeks_between(start, date) % frequency == 0
            }
            Rule::Monthly { day } => {
                let elapsed = month_index(date) - month_index(start);
                elapsed % frequency == 0 && clamped_date(month_index(date), *day) == Some(date)
            }
            Rule::Custom { rule } => self
                .custom_evaluator()
                .is_some_and(|evaluator| evaluator.is_due(rule, date)),
        }
    }

    /// Up to `count` due dates on or after `from`, in increasing order.
    ///
    /// The iterator is lazy and stops early at the pattern's end date.
    pub fn next_due_dates<'a>(
        &'a self,
        pattern: &'a RecurrencePattern,
        from: Date,
        count: usize,
    ) -> DueDates<'a> {
        DueDates {
            engine: self,
            pattern,
            cursor: Some(from),
            until: None,
            remaining: count,
        }
    }

    /// Every due date in `[from, to]`.
    pub fn due_dates_between<'a>(
        &'a self,
        pattern: &'a RecurrencePattern,
        from: Date,
        to: Date,
    ) -> DueDates<'a> {
        DueDates {
            engine: self,
            pattern,
            cursor: Some(from),
            until: Some(to),
            remaining: usize::MAX,
        }
    }

    fn first_due_on_or_after(
        &self,
        pattern: &RecurrencePattern,
        from: Date,
        limit: Option<Date>,
    ) -> Option<Date> {
        let start = pattern.start_date();
        let from = from.max(start);
        let limit = match (pattern.end_date(), limit) {
            (Some(end), Some(limit)) => Some(end.min(limit)),
            (end, limit) => end.or(limit),
        };
        let within = |date: Date| limit.is_none_or(|limit| date <= limit);
        if !within(from) {
            return None;
        }

        let frequency = i64::from(pattern.frequency());
        let found = match pattern.rule() {
            Rule::Daily => {
                let remainder = (from - start).whole_days() % frequency;
                if remainder == 0 {
                    Some(from)
                } else {
                    from.checked_add(Duration::days(frequency - remainder))
                }
            }
            Rule::Weekly { days } => {
                let anchor = week_start(start);
                let mut cursor = from;
                loop {
                    let remainder = weeks_between(start, cursor) % frequency;
                    if remainder != 0 {
                        let weeks = weeks_between(start, cursor) - remainder + frequency;
                        cursor = anchor.checked_add(Duration::weeks(weeks))?;
                    }
                    if !within(cursor) {
                        return None;
                    }

                    let week_end = week_start(cursor).checked_add(Duration::days(6))?;
                    let mut day = cursor;
                    let hit = loop {
                        if days.contains(day.weekday()) {
                            break Some(day);
                        }
                        if day >= week_end {
                            break None;
                        }
                        day = day.next_day()?;
                    };
                    match hit {
                        Some(day) => break Some(day),
                        None => cursor = week_end.next_day()?,
                    }
                }
            }
            Rule::Monthly { day } => {
                let first = month_index(from);
                let remainder = (first - month_index(start)) % frequency;
                let mut index = if remainder == 0 {
                    first
                } else {
                    first - remainder + frequency
                };
                loop {
                    let candidate = clamped_date(index, *day)?;
                    if candidate >= from {
                        break Some(candidate);
                    }
                    index += frequency;
                }
            }
            Rule::Custom { rule } => {
                let evaluator = self.custom_evaluator()?;
                if let Ok(next) = evaluator.next_on_or_after(rule, from) {
                    return next.filter(|date| *date >= from && within(*date));
                }

                let mut day = from;
                let mut scanned = 0u32;
                loop {
                    if !within(day) {
                        break None;
                    }
                    if evaluator.is_due(rule, day) {
                        break Some(day);
                    }
                    scanned += 1;
                    // Bounded windows are scanned to their end; only
                    // open-ended searches give up.
                    if limit.is_none() && scanned >= CUSTOM_SCAN_HORIZON_DAYS {
                        tracing::warn!(
                            rule = rule.as_str(),
                            from = %from,
                            "custom pattern produced no occurrence within scan horizon"
                        );
                        break None;
                    }
                    day = day.next_day()?;
                }
            }
        };

        found.filter(|date| within(*date))
    }
}

/// Lazy sequence of due dates produced by [`RecurrenceEngine::next_due_dates`]
/// and [`RecurrenceEngine::due_dates_between`].
#[derive(Debug, Clone)]
pub struct DueDates<'a> {
    engine: &'a RecurrenceEngine,
    pattern: &'a RecurrencePattern,
    cursor: Option<Date>,
    until: Option<Date>,
    remaining: usize,
}

impl Iterator for DueDates<'_> {
    type Item = Date;

    fn next(&mut self) -> Option<Date> {
        if self.remaining == 0 {
            return None;
        }

        let from = self.cursor?;
        match self
            .engine
            .first_due_on_or_after(self.pattern, from, self.until)
        {
            Some(date) => {
                self.remaining -= 1;
                self.cursor = date.next_day();
                Some(date)
            }
            None => {
                self.cursor = None;
                None
            }
        }
    }
}

impl std::iter::FusedIterator for DueDates<'_> {}

#[cfg(test)]
mod tests {
    use crate::engine::{CustomEvaluator, RecurrenceEngine, Unsupported};
    use crate::model::{RecurrencePattern, Rule, WeekdaySet};
    use proptest::prelude::*;
    use rstest::rstest;
    use time::macros::date;
    use time::{Date, Duration, Weekday};

    fn weekly(days: &[Weekday], frequency: u32, start: Date) -> RecurrencePattern {
        RecurrencePattern::new(
            Rule::Weekly {
                days: WeekdaySet::from_weekdays(days.iter().copied()),
            },
            start,
        )
        .and_then(|pattern| pattern.with_frequency(frequency))
        .unwrap()
    }

    fn monthly(day: u8, frequency: u32, start: Date) -> RecurrencePattern {
        RecurrencePattern::new(Rule::Monthly { day }, start)
            .and_then(|pattern| pattern.with_frequency(frequency))
            .unwrap()
    }

    #[test]
    fn daily_every_third_day() {
        let engine = RecurrenceEngine::new();
        let pattern = RecurrencePattern::daily(date!(2024 - 01 - 01))
            .with_frequency(3)
            .unwrap();

        assert!(engine.is_due(&pattern, date!(2024 - 01 - 01)));
        assert!(!engine.is_due(&pattern, date!(2024 - 01 - 02)));
        assert!(engine.is_due(&pattern, date!(2024 - 01 - 04)));
        assert!(!engine.is_due(&pattern, date!(2023 - 12 - 29)));

        let dates: Vec<Date> = engine
            .next_due_dates(&pattern, date!(2024 - 01 - 02), 3)
            .collect();
        assert_eq!(
            dates,
            vec![date!(2024 - 01 - 04), date!(2024 - 01 - 07), date!(2024 - 01 - 10)]
        );
    }

    #[test]
    fn end_date_is_inclusive_and_truncates() {
        let engine = RecurrenceEngine::new();
        let pattern = RecurrencePattern::daily(date!(2024 - 01 - 01))
            .with_end_date(date!(2024 - 01 - 03))
            .unwrap();

        assert!(engine.is_due(&pattern, date!(2024 - 01 - 03)));
        assert!(!engine.is_due(&pattern, date!(2024 - 01 - 04)));

        let dates: Vec<Date> = engine
            .next_due_dates(&pattern, date!(2023 - 12 - 01), 10)
            .collect();
        assert_eq!(dates.len(), 3);
        assert_eq!(dates[0], date!(2024 - 01 - 01));
    }

    #[rstest]
    // Anchored on Sunday 2023-12-31; that week is week 0.
    #[case(date!(2024 - 01 - 01), true)]
    #[case(date!(2024 - 01 - 03), true)]
    #[case(date!(2024 - 01 - 08), false)]
    #[case(date!(2024 - 01 - 10), false)]
    #[case(date!(2024 - 01 - 15), true)]
    #[case(date!(2024 - 01 - 17), true)]
    #[case(date!(2024 - 01 - 16), false)]
    fn weekly_every_other_week(#[case] day: Date, #[case] expected: bool) {
        let engine = RecurrenceEngine::new();
        let pattern = weekly(&[Weekday::Monday, Weekday::Wednesday], 2, date!(2023 - 12 - 31));
        assert_eq!(engine.is_due(&pattern, day), expected, "{day}");
    }

    #[test]
    fn weekly_skips_days_before_start_in_first_week() {
        let engine = RecurrenceEngine::new();
        // Starts on a Wednesday; Monday of the same week is before the start.
        let pattern = weekly(&[Weekday::Monday, Weekday::Friday], 2, date!(2024 - 01 - 03));

        let dates: Vec<Date> = engine
            .next_due_dates(&pattern, date!(2024 - 01 - 01), 4)
            .collect();
        assert_eq!(
            dates,
            vec![
                date!(2024 - 01 - 05),
                date!(2024 - 01 - 15),
                date!(2024 - 01 - 19),
                date!(2024 - 01 - 29),
            ]
        );
    }

    #[rstest]
    #[case(date!(2023 - 02 - 28), true)]
    #[case(date!(2024 - 02 - 29), true)]
    #[case(date!(2024 - 02 - 28), false)]
    #[case(date!(2024 - 04 - 30), true)]
    #[case(date!(2024 - 01 - 31), true)]
    #[case(date!(2024 - 03 - 30), false)]
    fn monthly_day_31_clamps_to_month_end(#[case] day: Date, #[case] expected: bool) {
        let engine = RecurrenceEngine::new();
        let pattern = monthly(31, 1, date!(2023 - 01 - 01));
        assert_eq!(engine.is_due(&pattern, day), expected, "{day}");
    }

    #[test]
    fn monthly_with_interval_and_late_start() {
        let engine = RecurrenceEngine::new();
        let pattern = monthly(10, 2, date!(2024 - 01 - 15));

        assert!(!engine.is_due(&pattern, date!(2024 - 01 - 10)));
        assert!(!engine.is_due(&pattern, date!(2024 - 02 - 10)));
        assert!(engine.is_due(&pattern, date!(2024 - 03 - 10)));

        let dates: Vec<Date> = engine
            .next_due_dates(&pattern, date!(2024 - 01 - 01), 3)
            .collect();
        assert_eq!(
            dates,
            vec![date!(2024 - 03 - 10), date!(2024 - 05 - 10), date!(2024 - 07 - 10)]
        );
    }

    #[test]
    fn custom_without_evaluator_never_fires() {
        let engine = RecurrenceEngine::new();
        let pattern = RecurrencePattern::new(
            Rule::Custom {
                rule: "weekdays".to_string(),
            },
            date!(2024 - 01 - 01),
        )
        .unwrap();

        assert!(!engine.is_due(&pattern, date!(2024 - 01 - 01)));
        assert_eq!(engine.next_due_dates(&pattern, date!(2024 - 01 - 01), 5).count(), 0);
    }

    #[test]
    fn custom_evaluator_drives_occurrences() {
        let engine = RecurrenceEngine::new().with_custom_evaluator(|rule: &str, date: Date| {
            rule == "weekdays" && !matches!(date.weekday(), Weekday::Saturday | Weekday::Sunday)
        });
        let pattern = RecurrencePattern::new(
            Rule::Custom {
                rule: "weekdays".to_string(),
            },
            date!(2024 - 01 - 01),
        )
        .unwrap();

        // Friday, then the following Monday.
        let dates: Vec<Date> = engine
            .next_due_dates(&pattern, date!(2024 - 01 - 05), 2)
            .collect();
        assert_eq!(dates, vec![date!(2024 - 01 - 05), date!(2024 - 01 - 08)]);
    }

    #[test]
    fn custom_scan_gives_up_after_horizon() {
        let engine = RecurrenceEngine::new().with_custom_evaluator(|_: &str, _: Date| false);
        let pattern = RecurrencePattern::new(
            Rule::Custom {
                rule: "never".to_string(),
            },
            date!(2024 - 01 - 01),
        )
        .unwrap();

        assert_eq!(engine.next_due_dates(&pattern, date!(2024 - 01 - 01), 1).count(), 0);
    }

    struct SparseDates(Vec<Date>);

    impl CustomEvaluator for SparseDates {
        fn is_due(&self, _rule: &str, date: Date) -> bool {
            self.0.contains(&date)
        }

        fn next_on_or_after(&self, _rule: &str, from: Date) -> Result<Option<Date>, Unsupported> {
            Ok(self.0.iter().copied().filter(|date| *date >= from).min())
        }
    }

    fn sparse_pattern() -> RecurrencePattern {
        RecurrencePattern::new(
            Rule::Custom {
                rule: "sparse".to_string(),
            },
            date!(2024 - 01 - 01),
        )
        .unwrap()
    }

    #[test]
    fn custom_lookahead_reaches_past_scan_horizon() {
        let engine = RecurrenceEngine::new()
            .with_custom_evaluator(SparseDates(vec![date!(2024 - 01 - 01), date!(2040 - 01 - 01)]));

        let dates: Vec<Date> = engine
            .next_due_dates(&sparse_pattern(), date!(2024 - 01 - 01), 3)
            .collect();
        assert_eq!(dates, vec![date!(2024 - 01 - 01), date!(2040 - 01 - 01)]);
    }

    #[test]
    fn custom_lookahead_respects_end_date() {
        let engine = RecurrenceEngine::new()
            .with_custom_evaluator(SparseDates(vec![date!(2024 - 01 - 01), date!(2040 - 01 - 01)]));
        let pattern = sparse_pattern().with_end_date(date!(2030 - 12 - 31)).unwrap();

        let dates: Vec<Date> = engine
            .next_due_dates(&pattern, date!(2024 - 01 - 01), 3)
            .collect();
        assert_eq!(dates, vec![date!(2024 - 01 - 01)]);
    }

    #[test]
    fn bounded_custom_scan_covers_whole_window() {
        let engine = RecurrenceEngine::new().with_custom_evaluator(|_: &str, date: Date| {
            date == date!(2024 - 01 - 01) || date == date!(2040 - 01 - 01)
        });

        let dates: Vec<Date> = engine
            .due_dates_between(&sparse_pattern(), date!(2024 - 01 - 01), date!(2040 - 06 - 30))
            .collect();
        assert_eq!(dates, vec![date!(2024 - 01 - 01), date!(2040 - 01 - 01)]);
    }

    #[test]
    fn next_due_dates_is_restartable() {
        let engine = RecurrenceEngine::new();
        let pattern = monthly(15, 1, date!(2024 - 01 - 01));

        let first: Vec<Date> = engine
            .next_due_dates(&pattern, date!(2024 - 06 - 16), 4)
            .collect();
        let second: Vec<Date> = engine
            .next_due_dates(&pattern, date!(2024 - 06 - 16), 4)
            .collect();
        assert_eq!(first, second);
        assert_eq!(first[0], date!(2024 - 07 - 15));
    }

    #[test]
    fn due_dates_between_is_bounded() {
        let engine = RecurrenceEngine::new();
        let pattern = weekly(&[Weekday::Saturday], 1, date!(2024 - 01 - 01));

        let dates: Vec<Date> = engine
            .due_dates_between(&pattern, date!(2024 - 01 - 01), date!(2024 - 01 - 20))
            .collect();
        assert_eq!(
            dates,
            vec![date!(2024 - 01 - 06), date!(2024 - 01 - 13), date!(2024 - 01 - 20)]
        );
    }

    fn any_date() -> impl Strategy<Value = Date> {
        (0i64..3_000).prop_map(|offset| date!(2020 - 01 - 01) + Duration::days(offset))
    }

    fn any_pattern() -> impl Strategy<Value = RecurrencePattern> {
        let rule = prop_oneof![
            Just(Rule::Daily),
            proptest::collection::vec(0u8..7, 1..7).prop_map(|days| Rule::Weekly {
                days: WeekdaySet::from_indices(days).unwrap(),
            }),
            (1u8..=31).prop_map(|day| Rule::Monthly { day }),
        ];
        (rule, 1u32..6, any_date(), proptest::option::of(0i64..800)).prop_map(
            |(rule, frequency, start, span)| {
                let pattern = RecurrencePattern::new(rule, start)
                    .and_then(|pattern| pattern.with_frequency(frequency))
                    .unwrap();
                match span {
                    Some(days) => pattern.with_end_date(start + Duration::days(days)).unwrap(),
                    None => pattern,
                }
            },
        )
    }

    proptest! {
        #[test]
        fn daily_frequency_one_covers_whole_range(start in any_date(), span in 0i64..400, probe in 0i64..400) {
            let engine = RecurrenceEngine::new();
            let end = start + Duration::days(span);
            let pattern = RecurrencePattern::daily(start).with_end_date(end).unwrap();
            let day = start + Duration::days(probe);
            prop_assert_eq!(engine.is_due(&pattern, day), day <= end);
        }

        #[test]
        fn weekly_due_dates_fall_on_listed_weekdays(pattern in any_pattern(), probe in any_date()) {
            let engine = RecurrenceEngine::new();
            if let Rule::Weekly { days } = pattern.rule() {
                if engine.is_due(&pattern, probe) {
                    prop_assert!(days.contains(probe.weekday()));
                }
            }
        }

        #[test]
        fn next_due_dates_are_due_increasing_and_complete(
            pattern in any_pattern(),
            from in any_date(),
            count in 0usize..12,
        ) {
            let engine = RecurrenceEngine::new();
            let dates: Vec<Date> = engine.next_due_dates(&pattern, from, count).collect();

            prop_assert!(dates.len() <= count);
            for window in dates.windows(2) {
                prop_assert!(window[0] < window[1]);
            }
            for date in &dates {
                prop_assert!(*date >= from);
                prop_assert!(engine.is_due(&pattern, *date));
            }
            if dates.len() < count {
                // Only the end date may cut the sequence short.
                let end = pattern.end_date();
                prop_assert!(end.is_some());
                let last = dates.last().copied().unwrap_or(from);
                let next = engine.due_dates_between(&pattern, last.next_day().unwrap(), end.unwrap()).next();
                prop_assert_eq!(next, None);
            }
        }
    }
}
