//! Weekly recurrence patterns and their expansion into concrete occurrences.
//!
//! A pattern names a set of weekdays plus a termination rule (a fixed
//! occurrence count or an until-date). Expansion walks forward day by day
//! from a base datetime and emits one timestamp per selected weekday,
//! carrying the base's time-of-day.

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{AlmanacError, AlmanacResult};

/// Safety bound: expansion never walks more than this far past the base
/// date, so a pattern with neither count nor until-date still terminates.
const MAX_SPAN_MONTHS: u32 = 60;

/// A non-empty set of weekdays, stored as a Monday-first bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub fn from_days(days: &[Weekday]) -> Self {
        let mut mask = 0u8;
        for day in days {
            mask |= 1 << day.num_days_from_monday();
        }
        WeekdaySet(mask)
    }

    /// Parse the single-letter boundary codes `M T W R F S U`
    /// (`R` = Thursday, `U` = Sunday). Whitespace is ignored; any other
    /// character is rejected.
    pub fn parse(codes: &str) -> AlmanacResult<Self> {
        let mut mask = 0u8;
        for c in codes.chars() {
            if c.is_whitespace() {
                continue;
            }
            let day = match c.to_ascii_uppercase() {
                'M' => Weekday::Mon,
                'T' => Weekday::Tue,
                'W' => Weekday::Wed,
                'R' => Weekday::Thu,
                'F' => Weekday::Fri,
                'S' => Weekday::Sat,
                'U' => Weekday::Sun,
                other => return Err(AlmanacError::InvalidWeekday(other)),
            };
            mask |= 1 << day.num_days_from_monday();
        }
        if mask == 0 {
            return Err(AlmanacError::Validation(
                "recurrence needs at least one weekday".to_string(),
            ));
        }
        Ok(WeekdaySet(mask))
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// How a recurring series terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecurrenceEnd {
    /// Stop after exactly this many occurrences.
    Count(u32),
    /// Stop once the walked date passes this date (the date itself is
    /// still included).
    Until(NaiveDate),
}

/// A weekly recurrence rule. Immutable once constructed; editing a series
/// builds new patterns rather than mutating a shared one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrencePattern {
    weekdays: WeekdaySet,
    end: Option<RecurrenceEnd>,
}

impl RecurrencePattern {
    pub fn new(weekdays: WeekdaySet, end: Option<RecurrenceEnd>) -> AlmanacResult<Self> {
        if weekdays.is_empty() {
            return Err(AlmanacError::Validation(
                "recurrence needs at least one weekday".to_string(),
            ));
        }
        if let Some(RecurrenceEnd::Count(0)) = end {
            return Err(AlmanacError::Validation(
                "recurrence count must be positive".to_string(),
            ));
        }
        Ok(RecurrencePattern { weekdays, end })
    }

    pub fn weekdays(&self) -> WeekdaySet {
        self.weekdays
    }

    pub fn end(&self) -> Option<RecurrenceEnd> {
        self.end
    }

    /// A copy of this pattern with a different termination rule (used when
    /// a series is split or re-anchored).
    pub fn with_end(&self, end: Option<RecurrenceEnd>) -> Self {
        RecurrencePattern {
            weekdays: self.weekdays,
            end,
        }
    }

    /// Lazily expand this pattern from `base`. The base datetime itself is
    /// included when its weekday is selected. Deterministic: iterating
    /// again from the same base yields the same sequence.
    pub fn occurrences(&self, base: NaiveDateTime) -> Occurrences {
        Occurrences {
            pattern: self.clone(),
            time: base.time(),
            next_date: Some(base.date()),
            cap: base
                .date()
                .checked_add_months(Months::new(MAX_SPAN_MONTHS))
                .unwrap_or(NaiveDate::MAX),
            emitted: 0,
        }
    }

    /// Materialize the full (finite) occurrence list from `base`.
    pub fn expand(&self, base: NaiveDateTime) -> Vec<NaiveDateTime> {
        self.occurrences(base).collect()
    }
}

/// Lazy, finite, restartable expansion of a [`RecurrencePattern`].
#[derive(Debug, Clone)]
pub struct Occurrences {
    pattern: RecurrencePattern,
    time: NaiveTime,
    next_date: Option<NaiveDate>,
    cap: NaiveDate,
    emitted: u32,
}

impl Iterator for Occurrences {
    type Item = NaiveDateTime;

    fn next(&mut self) -> Option<NaiveDateTime> {
        loop {
            let date = self.next_date?;
            if date > self.cap {
                self.next_date = None;
                return None;
            }
            match self.pattern.end {
                Some(RecurrenceEnd::Count(n)) if self.emitted >= n => {
                    self.next_date = None;
                    return None;
                }
                Some(RecurrenceEnd::Until(until)) if date > until => {
                    self.next_date = None;
                    return None;
                }
                _ => {}
            }
            self.next_date = date.succ_opt();
            if self.pattern.weekdays.contains(date.weekday()) {
                self.emitted += 1;
                return Some(NaiveDateTime::new(date, self.time));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn mon_wed_fri_for_three_occurrences() {
        let pattern =
            RecurrencePattern::new(WeekdaySet::parse("MWF").unwrap(), Some(RecurrenceEnd::Count(3)))
                .unwrap();

        // 2024-01-01 is a Monday
        let dates = pattern.expand(dt(2024, 1, 1, 9, 0));
        assert_eq!(
            dates,
            vec![dt(2024, 1, 1, 9, 0), dt(2024, 1, 3, 9, 0), dt(2024, 1, 5, 9, 0)]
        );
    }

    #[test]
    fn base_skipped_when_its_weekday_is_not_selected() {
        let pattern =
            RecurrencePattern::new(WeekdaySet::parse("WF").unwrap(), Some(RecurrenceEnd::Count(2)))
                .unwrap();

        // Base is a Monday; first occurrence lands on Wednesday.
        let dates = pattern.expand(dt(2024, 1, 1, 14, 30));
        assert_eq!(dates, vec![dt(2024, 1, 3, 14, 30), dt(2024, 1, 5, 14, 30)]);
    }

    #[test]
    fn until_date_is_inclusive() {
        let until = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let pattern =
            RecurrencePattern::new(WeekdaySet::parse("MWF").unwrap(), Some(RecurrenceEnd::Until(until)))
                .unwrap();

        let dates = pattern.expand(dt(2024, 1, 1, 9, 0));
        assert_eq!(dates.last(), Some(&dt(2024, 1, 5, 9, 0)));
        assert_eq!(dates.len(), 3);
    }

    #[test]
    fn occurrences_are_monotonic_and_weekday_faithful() {
        let set = WeekdaySet::parse("TR").unwrap();
        let pattern = RecurrencePattern::new(set, Some(RecurrenceEnd::Count(10))).unwrap();

        let dates = pattern.expand(dt(2024, 3, 15, 8, 0));
        assert_eq!(dates.len(), 10);
        for pair in dates.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        for date in &dates {
            assert!(set.contains(date.date().weekday()));
        }
    }

    #[test]
    fn unterminated_pattern_stops_at_safety_bound() {
        let pattern =
            RecurrencePattern::new(WeekdaySet::parse("MTWRFSU").unwrap(), None).unwrap();

        let dates = pattern.expand(dt(2024, 1, 1, 0, 0));
        let last = dates.last().unwrap().date();
        assert!(last <= NaiveDate::from_ymd_opt(2029, 1, 1).unwrap());
        assert!(dates.len() > 1500);
    }

    #[test]
    fn restarting_expansion_is_deterministic() {
        let pattern =
            RecurrencePattern::new(WeekdaySet::parse("MW").unwrap(), Some(RecurrenceEnd::Count(5)))
                .unwrap();
        let base = dt(2024, 2, 5, 10, 15);
        assert_eq!(pattern.expand(base), pattern.expand(base));
    }

    #[test]
    fn weekday_codes_r_and_u_disambiguate() {
        let set = WeekdaySet::parse("RU").unwrap();
        assert!(set.contains(Weekday::Thu));
        assert!(set.contains(Weekday::Sun));
        assert!(!set.contains(Weekday::Tue));
        assert!(!set.contains(Weekday::Sat));
    }

    #[test]
    fn unknown_weekday_code_is_rejected() {
        assert!(matches!(
            WeekdaySet::parse("MX"),
            Err(AlmanacError::InvalidWeekday('X'))
        ));
    }

    #[test]
    fn empty_weekday_set_is_rejected() {
        assert!(WeekdaySet::parse("").is_err());
        assert!(RecurrencePattern::new(WeekdaySet::from_days(&[]), None).is_err());
    }
}
