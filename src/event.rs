//! The schedulable event record and its conflict predicate.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AlmanacError, AlmanacResult};
use crate::recurrence::RecurrencePattern;

/// A single schedulable item: timed or all-day, optionally recurring.
///
/// The start/end are naive wall-clock values; the timezone is a property of
/// the owning calendar. Recurring series are stored as one template event
/// carrying its pattern, never as materialized rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Stable surrogate id. Caller-facing lookup still goes through
    /// (subject, start); the id only disambiguates storage internally.
    pub id: Uuid,
    pub subject: String,
    pub start: NaiveDateTime,
    /// Present for timed events, absent for all-day events.
    pub end: Option<NaiveDateTime>,
    pub description: String,
    pub location: String,
    pub is_public: bool,
    pub is_all_day: bool,
    pub recurrence: Option<RecurrencePattern>,
}

impl Event {
    pub fn timed(subject: &str, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Event {
            id: Uuid::new_v4(),
            subject: subject.to_string(),
            start,
            end: Some(end),
            description: String::new(),
            location: String::new(),
            is_public: true,
            is_all_day: false,
            recurrence: None,
        }
    }

    pub fn all_day(subject: &str, date: NaiveDate) -> Self {
        Event {
            id: Uuid::new_v4(),
            subject: subject.to_string(),
            start: date.and_time(NaiveTime::MIN),
            end: None,
            description: String::new(),
            location: String::new(),
            is_public: true,
            is_all_day: true,
            recurrence: None,
        }
    }

    pub fn with_recurrence(mut self, pattern: RecurrencePattern) -> Self {
        self.recurrence = Some(pattern);
        self
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    pub fn duration(&self) -> Duration {
        match self.end {
            Some(end) => end - self.start,
            None => Duration::zero(),
        }
    }

    /// Check the structural invariants: non-empty subject, all-day events
    /// carry no end, timed events end strictly after they start, recurring
    /// timed events stay within one calendar day.
    pub fn validate(&self) -> AlmanacResult<()> {
        if self.subject.trim().is_empty() {
            return Err(AlmanacError::Validation(
                "event subject must not be empty".to_string(),
            ));
        }
        if self.is_all_day {
            if self.end.is_some() {
                return Err(AlmanacError::Validation(
                    "all-day events have no end time".to_string(),
                ));
            }
            return Ok(());
        }
        let end = self.end.ok_or_else(|| {
            AlmanacError::Validation("timed events need an end time".to_string())
        })?;
        if end <= self.start {
            return Err(AlmanacError::Validation(
                "event end must be after its start".to_string(),
            ));
        }
        if self.is_recurring() && end.date() != self.start.date() {
            return Err(AlmanacError::Validation(
                "recurring timed events must start and end on the same day".to_string(),
            ));
        }
        Ok(())
    }

    /// Materialize every (start, end) slot this event occupies.
    ///
    /// Non-recurring events yield their single slot; recurring events yield
    /// one slot per expansion, each keeping the template's duration.
    pub fn occurrence_times(&self) -> Vec<(NaiveDateTime, Option<NaiveDateTime>)> {
        match &self.recurrence {
            None => vec![(self.start, self.end)],
            Some(pattern) => {
                let duration = self.duration();
                pattern
                    .occurrences(self.start)
                    .map(|start| (start, self.end.map(|_| start + duration)))
                    .collect()
            }
        }
    }

    /// A synthesized occurrence-Event anchored at one expansion slot, used
    /// by queries and the conflict check. The pattern is stripped: an
    /// occurrence stands for itself.
    pub fn occurrence_at(&self, start: NaiveDateTime, end: Option<NaiveDateTime>) -> Event {
        Event {
            start,
            end,
            recurrence: None,
            ..self.clone()
        }
    }

    /// Conflict test between two concrete placements.
    ///
    /// If either side is all-day the two conflict when they share a start
    /// calendar date; otherwise the half-open `[start, end)` intervals must
    /// overlap. Recurring events are tested occurrence by occurrence, not
    /// via their templates.
    pub fn conflicts_with(&self, other: &Event) -> bool {
        if self.is_all_day || other.is_all_day {
            return self.start.date() == other.start.date();
        }
        match (self.end, other.end) {
            (Some(self_end), Some(other_end)) => {
                !(self_end <= other.start || self.start >= other_end)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::{RecurrenceEnd, RecurrencePattern, WeekdaySet};
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn identical_timed_intervals_conflict() {
        let a = Event::timed("a", dt(2024, 1, 1, 9, 0), dt(2024, 1, 1, 10, 0));
        let b = Event::timed("b", dt(2024, 1, 1, 9, 0), dt(2024, 1, 1, 10, 0));
        assert!(a.conflicts_with(&b));
    }

    #[test]
    fn adjacent_intervals_do_not_conflict() {
        let a = Event::timed("a", dt(2024, 1, 1, 9, 0), dt(2024, 1, 1, 10, 0));
        let b = Event::timed("b", dt(2024, 1, 1, 10, 0), dt(2024, 1, 1, 11, 0));
        assert!(!a.conflicts_with(&b));
        assert!(!b.conflicts_with(&a));
    }

    #[test]
    fn conflict_predicate_is_symmetric() {
        let a = Event::timed("a", dt(2024, 1, 1, 9, 0), dt(2024, 1, 1, 11, 0));
        let b = Event::timed("b", dt(2024, 1, 1, 10, 0), dt(2024, 1, 1, 12, 0));
        assert_eq!(a.conflicts_with(&b), b.conflicts_with(&a));
        assert!(a.conflicts_with(&b));
    }

    #[test]
    fn all_day_events_conflict_on_shared_date_only() {
        let a = Event::all_day("a", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let b = Event::all_day("b", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let c = Event::all_day("c", NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert!(a.conflicts_with(&b));
        assert!(!a.conflicts_with(&c));
    }

    #[test]
    fn all_day_event_conflicts_with_timed_event_by_date() {
        let all_day = Event::all_day("a", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let timed = Event::timed("b", dt(2024, 1, 1, 15, 0), dt(2024, 1, 1, 16, 0));
        assert!(all_day.conflicts_with(&timed));
        assert!(timed.conflicts_with(&all_day));
    }

    #[test]
    fn recurring_occurrences_keep_the_template_duration() {
        let pattern = RecurrencePattern::new(
            WeekdaySet::parse("MWF").unwrap(),
            Some(RecurrenceEnd::Count(3)),
        )
        .unwrap();
        let event = Event::timed("standup", dt(2024, 1, 1, 9, 0), dt(2024, 1, 1, 9, 30))
            .with_recurrence(pattern);

        let slots = event.occurrence_times();
        assert_eq!(slots.len(), 3);
        for (start, end) in slots {
            assert_eq!(end.unwrap() - start, Duration::minutes(30));
        }
    }

    #[test]
    fn validate_rejects_inverted_and_multi_day_recurring_times() {
        let inverted = Event::timed("a", dt(2024, 1, 1, 10, 0), dt(2024, 1, 1, 9, 0));
        assert!(inverted.validate().is_err());

        let pattern = RecurrencePattern::new(
            WeekdaySet::parse("M").unwrap(),
            Some(RecurrenceEnd::Count(2)),
        )
        .unwrap();
        let multi_day = Event::timed("b", dt(2024, 1, 1, 23, 0), dt(2024, 1, 2, 1, 0))
            .with_recurrence(pattern);
        assert!(multi_day.validate().is_err());
    }
}
