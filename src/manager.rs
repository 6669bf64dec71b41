//! Multi-calendar registry and cross-calendar operations.
//!
//! The manager owns calendar lifecycle (create, rename, retimezone) and the
//! copy operations that move events between calendars while preserving
//! absolute instants across timezone changes. Every operation names its
//! calendars explicitly; the "current calendar" selection is only a
//! convenience default for the command layer.

use chrono::{Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::calendar::{Calendar, starts_match, subject_matches};
use crate::error::{AlmanacError, AlmanacResult};
use crate::event::Event;
use crate::recurrence::RecurrenceEnd;

/// A registry of named calendars, case-sensitive and unique by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalendarManager {
    calendars: Vec<Calendar>,
    current: Option<String>,
}

impl CalendarManager {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Calendar lifecycle
    // =========================================================================

    pub fn create_calendar(&mut self, name: &str, timezone: &str) -> AlmanacResult<()> {
        if name.trim().is_empty() {
            return Err(AlmanacError::Validation(
                "calendar name must not be empty".to_string(),
            ));
        }
        if self.calendar(name).is_some() {
            return Err(AlmanacError::CalendarExists(name.to_string()));
        }
        let tz = parse_timezone(timezone)?;
        self.calendars.push(Calendar::new(name, tz));
        debug!(calendar = name, timezone = tz.name(), "calendar created");
        Ok(())
    }

    pub fn calendars(&self) -> &[Calendar] {
        &self.calendars
    }

    pub fn calendar(&self, name: &str) -> Option<&Calendar> {
        self.calendars.iter().find(|c| c.name == name)
    }

    pub fn calendar_mut(&mut self, name: &str) -> Option<&mut Calendar> {
        self.calendars.iter_mut().find(|c| c.name == name)
    }

    pub fn calendar_names(&self) -> Vec<&str> {
        self.calendars.iter().map(|c| c.name.as_str()).collect()
    }

    /// Select the calendar subsequent convenience calls default to.
    pub fn use_calendar(&mut self, name: &str) -> AlmanacResult<()> {
        if self.calendar(name).is_none() {
            return Err(AlmanacError::CalendarNotFound(name.to_string()));
        }
        self.current = Some(name.to_string());
        Ok(())
    }

    pub fn current_calendar(&self) -> Option<&Calendar> {
        self.current.as_deref().and_then(|name| {
            self.calendars.iter().find(|c| c.name == name)
        })
    }

    pub fn current_calendar_mut(&mut self) -> Option<&mut Calendar> {
        let name = self.current.clone()?;
        self.calendar_mut(&name)
    }

    /// Rename or retimezone a calendar. Renaming keeps the current-calendar
    /// selection pointing at the same calendar; retimezoning rewrites every
    /// timed event's wall clock through the old zone's absolute instant
    /// (all-day events stay on their calendar date).
    pub fn edit_calendar(&mut self, name: &str, property: &str, value: &str) -> AlmanacResult<()> {
        match property.to_ascii_lowercase().as_str() {
            "name" => self.rename_calendar(name, value),
            "timezone" => self.retimezone_calendar(name, value),
            _ => Err(AlmanacError::InvalidProperty(property.to_string())),
        }
    }

    fn rename_calendar(&mut self, name: &str, new_name: &str) -> AlmanacResult<()> {
        if new_name.trim().is_empty() {
            return Err(AlmanacError::Validation(
                "calendar name must not be empty".to_string(),
            ));
        }
        if self.calendar(new_name).is_some() {
            return Err(AlmanacError::CalendarExists(new_name.to_string()));
        }
        let calendar = self
            .calendar_mut(name)
            .ok_or_else(|| AlmanacError::CalendarNotFound(name.to_string()))?;
        calendar.name = new_name.to_string();
        if self.current.as_deref() == Some(name) {
            self.current = Some(new_name.to_string());
        }
        debug!(from = name, to = new_name, "calendar renamed");
        Ok(())
    }

    fn retimezone_calendar(&mut self, name: &str, value: &str) -> AlmanacResult<()> {
        let new_tz = parse_timezone(value)?;
        let calendar = self
            .calendar_mut(name)
            .ok_or_else(|| AlmanacError::CalendarNotFound(name.to_string()))?;
        let old_tz = calendar.timezone;

        for event in calendar.events_mut() {
            if event.is_all_day {
                continue;
            }
            let original_time = event.start.time();
            event.start = convert_local(event.start, old_tz, new_tz);
            event.end = event.end.map(|end| convert_local(end, old_tz, new_tz));

            // An until-date travels through the conversion with the
            // event's original time-of-day attached.
            if let Some(pattern) = event.recurrence.clone() {
                if let Some(RecurrenceEnd::Until(until)) = pattern.end() {
                    let shifted = convert_local(
                        NaiveDateTime::new(until, original_time),
                        old_tz,
                        new_tz,
                    )
                    .date();
                    event.recurrence = Some(pattern.with_end(Some(RecurrenceEnd::Until(shifted))));
                }
            }
        }
        calendar.timezone = new_tz;
        debug!(calendar = name, timezone = new_tz.name(), "calendar retimezoned");
        Ok(())
    }

    // =========================================================================
    // Cross-calendar copies
    // =========================================================================

    /// Copy one event to another calendar, anchored at `target_start`
    /// (a wall-clock time in the target calendar's zone).
    ///
    /// The source event is located by quote-normalized subject and an exact
    /// start: the template start, or any occurrence matching on date, hour,
    /// and minute. Timed copies keep their duration; recurring series are
    /// re-anchored with the until-date shifted by the day offset it had
    /// from the original start. The copy goes through the target calendar's
    /// conflict-checked creation path and fails like any other create.
    pub fn copy_event(
        &mut self,
        source: &str,
        subject: &str,
        source_start: NaiveDateTime,
        target: &str,
        target_start: NaiveDateTime,
    ) -> AlmanacResult<()> {
        let source_cal = self
            .calendar(source)
            .ok_or_else(|| AlmanacError::CalendarNotFound(source.to_string()))?;
        let template = find_event(source_cal, subject, source_start)?.clone();

        let target_cal = self
            .calendar_mut(target)
            .ok_or_else(|| AlmanacError::CalendarNotFound(target.to_string()))?;
        let copy = rebase_event(&template, target_start);
        target_cal.add_event(copy, true)?;
        debug!(subject, source, target, "event copied");
        Ok(())
    }

    /// Copy every event occurring on `date` to another calendar, shifting
    /// each to `target_date` with source-zone to target-zone conversion.
    ///
    /// Best-effort: individual conflicts are tolerated and logged; the
    /// result is the number of events copied. With no candidate events the
    /// call fails; with candidates but no copies the last error surfaces.
    pub fn copy_events_on(
        &mut self,
        source: &str,
        date: NaiveDate,
        target: &str,
        target_date: NaiveDate,
    ) -> AlmanacResult<usize> {
        let candidates = {
            let cal = self
                .calendar(source)
                .ok_or_else(|| AlmanacError::CalendarNotFound(source.to_string()))?;
            let mut found = Vec::new();
            for event in cal.events() {
                let anchor = if event.is_recurring() {
                    event
                        .occurrence_times()
                        .into_iter()
                        .map(|(start, _)| start)
                        .find(|start| start.date() == date)
                } else if event.start.date() == date {
                    Some(event.start)
                } else {
                    None
                };
                if let Some(anchor) = anchor {
                    found.push((event.subject.clone(), anchor, event.is_all_day));
                }
            }
            found
        };
        if candidates.is_empty() {
            return Err(AlmanacError::EventNotFound(format!(
                "no events on {date} in '{source}'"
            )));
        }

        let offset = target_date - date;
        self.copy_candidates(source, target, candidates, offset)
    }

    /// Copy every event with an occurrence in `[from, to]` to another
    /// calendar, shifted so the range start lands on `target_date`. Each
    /// recurring series is visited once via its template and re-anchored
    /// whole. Best-effort like [`copy_events_on`](Self::copy_events_on).
    pub fn copy_events_between(
        &mut self,
        source: &str,
        from: NaiveDate,
        to: NaiveDate,
        target: &str,
        target_date: NaiveDate,
    ) -> AlmanacResult<usize> {
        let candidates = {
            let cal = self
                .calendar(source)
                .ok_or_else(|| AlmanacError::CalendarNotFound(source.to_string()))?;
            let mut found = Vec::new();
            for event in cal.events() {
                let in_range = event
                    .occurrence_times()
                    .iter()
                    .any(|(start, _)| start.date() >= from && start.date() <= to);
                if in_range {
                    found.push((event.subject.clone(), event.start, event.is_all_day));
                }
            }
            found
        };
        if candidates.is_empty() {
            return Err(AlmanacError::EventNotFound(format!(
                "no events between {from} and {to} in '{source}'"
            )));
        }

        let offset = target_date - from;
        self.copy_candidates(source, target, candidates, offset)
    }

    fn copy_candidates(
        &mut self,
        source: &str,
        target: &str,
        candidates: Vec<(String, NaiveDateTime, bool)>,
        offset: Duration,
    ) -> AlmanacResult<usize> {
        let source_tz = self
            .calendar(source)
            .ok_or_else(|| AlmanacError::CalendarNotFound(source.to_string()))?
            .timezone;
        let target_tz = self
            .calendar(target)
            .ok_or_else(|| AlmanacError::CalendarNotFound(target.to_string()))?
            .timezone;

        let mut copied = 0usize;
        let mut last_err = None;
        for (subject, anchor, is_all_day) in candidates {
            // All-day events keep their calendar date; timed events convert
            // through the absolute instant (which also corrects the date
            // when the converted time crosses midnight).
            let target_start = if is_all_day {
                NaiveDateTime::new(anchor.date() + offset, NaiveTime::MIN)
            } else {
                convert_local(anchor, source_tz, target_tz) + offset
            };
            match self.copy_event(source, &subject, anchor, target, target_start) {
                Ok(()) => copied += 1,
                Err(err) => {
                    warn!(subject, error = %err, "skipping event during bulk copy");
                    last_err = Some(err);
                }
            }
        }
        match (copied, last_err) {
            (0, Some(err)) => Err(err),
            _ => Ok(copied),
        }
    }
}

// =============================================================================
// Event rebasing and timezone conversion
// =============================================================================

/// Locate a stored event by quote-normalized subject and an exact start:
/// the template start, or any occurrence matching on date + hour + minute.
fn find_event<'a>(
    calendar: &'a Calendar,
    subject: &str,
    start: NaiveDateTime,
) -> AlmanacResult<&'a Event> {
    calendar
        .events()
        .iter()
        .find(|event| {
            if !subject_matches(&event.subject, subject) {
                return false;
            }
            if starts_match(event.start, start) {
                return true;
            }
            event.is_recurring()
                && event
                    .occurrence_times()
                    .iter()
                    .any(|(occurrence, _)| starts_match(*occurrence, start))
        })
        .ok_or_else(|| AlmanacError::EventNotFound(subject.to_string()))
}

/// Build the copy of `template` anchored at `target_start`: all-day events
/// land on `target_start`'s date, timed events keep their duration, and a
/// series' until-date is shifted by the day offset it had from the
/// original start.
fn rebase_event(template: &Event, target_start: NaiveDateTime) -> Event {
    let mut copy = template.clone();
    copy.id = Uuid::new_v4();
    if template.is_all_day {
        copy.start = target_start.date().and_time(NaiveTime::MIN);
    } else {
        copy.start = target_start;
        copy.end = template.end.map(|_| target_start + template.duration());
    }
    if let Some(pattern) = template.recurrence.clone() {
        if let Some(RecurrenceEnd::Until(until)) = pattern.end() {
            let day_offset = until - template.start.date();
            let shifted = copy.start.date() + day_offset;
            copy.recurrence = Some(pattern.with_end(Some(RecurrenceEnd::Until(shifted))));
        }
    }
    copy
}

/// Map a wall-clock time in `from` onto the same absolute instant's wall
/// clock in `to`. Ambiguous local times resolve to the earlier instant; a
/// time inside a DST gap is nudged forward an hour first.
fn convert_local(local: NaiveDateTime, from: Tz, to: Tz) -> NaiveDateTime {
    let instant = match from.from_local_datetime(&local) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt,
        LocalResult::None => match from.from_local_datetime(&(local + Duration::hours(1))) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt,
            LocalResult::None => return local,
        },
    };
    instant.with_timezone(&to).naive_local()
}

fn parse_timezone(value: &str) -> AlmanacResult<Tz> {
    value
        .parse::<Tz>()
        .map_err(|_| AlmanacError::InvalidTimezone(value.to_string()))
}
