//! Single-calendar event storage: conflict-checked creation, edits, queries.

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{AlmanacError, AlmanacResult};
use crate::event::Event;
use crate::property::EventProperty;
use crate::recurrence::{RecurrenceEnd, RecurrencePattern};

/// An ordered collection of events bound to one name and timezone.
///
/// All mutation goes through validated-then-committed operations: a failed
/// create or edit leaves the collection untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calendar {
    pub name: String,
    pub timezone: Tz,
    events: Vec<Event>,
}

impl Calendar {
    pub fn new(name: &str, timezone: Tz) -> Self {
        Calendar {
            name: name.to_string(),
            timezone,
            events: Vec::new(),
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub(crate) fn events_mut(&mut self) -> &mut [Event] {
        &mut self.events
    }

    // =========================================================================
    // Creation
    // =========================================================================

    pub fn create_event(
        &mut self,
        subject: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
        auto_decline: bool,
    ) -> AlmanacResult<()> {
        self.add_event(Event::timed(subject, start, end), auto_decline)
    }

    pub fn create_all_day_event(
        &mut self,
        subject: &str,
        date: NaiveDate,
        auto_decline: bool,
    ) -> AlmanacResult<()> {
        self.add_event(Event::all_day(subject, date), auto_decline)
    }

    pub fn create_recurring_event(
        &mut self,
        subject: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
        pattern: RecurrencePattern,
        auto_decline: bool,
    ) -> AlmanacResult<()> {
        let event = Event::timed(subject, start, end).with_recurrence(pattern);
        self.add_event(event, auto_decline)
    }

    pub fn create_recurring_all_day_event(
        &mut self,
        subject: &str,
        date: NaiveDate,
        pattern: RecurrencePattern,
        auto_decline: bool,
    ) -> AlmanacResult<()> {
        let event = Event::all_day(subject, date).with_recurrence(pattern);
        self.add_event(event, auto_decline)
    }

    /// Validate and append an already-built event.
    ///
    /// With `auto_decline` set, every occurrence of the candidate is tested
    /// against every occurrence of every stored event; a single conflicting
    /// pair aborts the whole insert.
    pub(crate) fn add_event(&mut self, event: Event, auto_decline: bool) -> AlmanacResult<()> {
        event.validate()?;
        if auto_decline {
            if let Some(with) = self.first_conflict(&event, None) {
                return Err(AlmanacError::Conflict {
                    subject: event.subject,
                    with,
                });
            }
        }
        debug!(calendar = %self.name, subject = %event.subject, "event created");
        self.events.push(event);
        Ok(())
    }

    /// Subject of the first stored event with an occurrence conflicting
    /// with any occurrence of `candidate`. `skip` excludes the stored event
    /// being replaced during an edit.
    fn first_conflict(&self, candidate: &Event, skip: Option<Uuid>) -> Option<String> {
        self.events
            .iter()
            .find(|stored| Some(stored.id) != skip && events_conflict(candidate, stored))
            .map(|stored| stored.subject.clone())
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Edit one event, located by quote-normalized subject plus its start
    /// matched at date/hour/minute precision (a recurring series matches by
    /// template start, not by occurrence).
    ///
    /// Time-valued edits are conflict-checked against every other stored
    /// event before anything is applied.
    pub fn edit_event(
        &mut self,
        property: &str,
        subject: &str,
        start: NaiveDateTime,
        value: &str,
    ) -> AlmanacResult<()> {
        let property = EventProperty::parse(property)?;
        let idx = self
            .events
            .iter()
            .position(|e| subject_matches(&e.subject, subject) && starts_match(e.start, start))
            .ok_or_else(|| AlmanacError::EventNotFound(subject.to_string()))?;

        let mut candidate = self.events[idx].clone();
        property.apply(&mut candidate, value)?;

        if property.is_time_valued() {
            if let Some(with) = self.first_conflict(&candidate, Some(candidate.id)) {
                return Err(AlmanacError::Conflict {
                    subject: candidate.subject,
                    with,
                });
            }
        }
        debug!(calendar = %self.name, subject = %candidate.subject, "event edited");
        self.events[idx] = candidate;
        Ok(())
    }

    /// Edit every matching event from a cutoff onward, splitting recurring
    /// series at the cutoff.
    ///
    /// A series with occurrences on both sides of the cutoff is replaced by
    /// two templates: the original truncated (by until-date) to the day
    /// before the cutoff, and a re-anchored remainder starting at the first
    /// occurrence on/after the cutoff, inheriting the original termination
    /// rule. Only the remainder receives the property change. Non-recurring
    /// events whose start date is on/after the cutoff date are edited
    /// directly (the cutoff applies at date precision throughout).
    ///
    /// All-or-nothing: every staged edit must parse, validate, and pass the
    /// conflict check before any replacement is committed.
    pub fn edit_events_from(
        &mut self,
        property: &str,
        subject: &str,
        from: NaiveDateTime,
        value: &str,
    ) -> AlmanacResult<()> {
        let property = EventProperty::parse(property)?;
        // (index, replacements); the edited event is always the last entry.
        let mut staged: Vec<(usize, Vec<Event>)> = Vec::new();

        for (idx, event) in self.events.iter().enumerate() {
            if !subject_matches(&event.subject, subject) {
                continue;
            }
            match &event.recurrence {
                None => {
                    if event.start.date() >= from.date() {
                        let mut candidate = event.clone();
                        property.apply(&mut candidate, value)?;
                        staged.push((idx, vec![candidate]));
                    }
                }
                Some(pattern) => {
                    let cutover = pattern
                        .occurrences(event.start)
                        .find(|occ| occ.date() >= from.date());
                    let Some(cutover) = cutover else { continue };

                    if event.start.date() >= from.date() {
                        // Whole series lies on/after the cutoff.
                        let mut candidate = event.clone();
                        property.apply(&mut candidate, value)?;
                        staged.push((idx, vec![candidate]));
                    } else {
                        let mut before = event.clone();
                        before.id = Uuid::new_v4();
                        before.recurrence = Some(pattern.with_end(Some(RecurrenceEnd::Until(
                            from.date() - Duration::days(1),
                        ))));

                        let mut after = event.clone();
                        after.id = Uuid::new_v4();
                        after.start = cutover;
                        after.end = event.end.map(|_| cutover + event.duration());
                        property.apply(&mut after, value)?;

                        staged.push((idx, vec![before, after]));
                    }
                }
            }
        }

        if staged.is_empty() {
            return Err(AlmanacError::EventNotFound(subject.to_string()));
        }

        if property.is_time_valued() {
            for (idx, replacements) in &staged {
                // Only the last replacement moved; a truncated prefix keeps
                // a subset of the original's slots.
                if let Some(candidate) = replacements.last() {
                    let original_id = self.events[*idx].id;
                    if let Some(with) = self.first_conflict(candidate, Some(original_id)) {
                        return Err(AlmanacError::Conflict {
                            subject: candidate.subject.clone(),
                            with,
                        });
                    }
                    // The edited event must also clear the other staged
                    // replacements, in particular its own truncated
                    // prefix, which is not stored yet.
                    for (_, other_replacements) in &staged {
                        for other in other_replacements {
                            if other.id == candidate.id {
                                continue;
                            }
                            if events_conflict(candidate, other) {
                                return Err(AlmanacError::Conflict {
                                    subject: candidate.subject.clone(),
                                    with: other.subject.clone(),
                                });
                            }
                        }
                    }
                }
            }
        }

        // Commit back-to-front so staged indices stay valid.
        staged.sort_by(|a, b| b.0.cmp(&a.0));
        let affected = staged.len();
        for (idx, replacements) in staged {
            self.events.splice(idx..idx + 1, replacements);
        }
        debug!(calendar = %self.name, subject, affected, "events edited from cutoff");
        Ok(())
    }

    /// Apply one property change to every event sharing the subject.
    /// All-or-nothing: each mutated copy is validated (and, for time-valued
    /// properties, conflict-checked) before any of them is committed.
    pub fn edit_all_events(
        &mut self,
        property: &str,
        subject: &str,
        value: &str,
    ) -> AlmanacResult<()> {
        let property = EventProperty::parse(property)?;
        let mut staged: Vec<(usize, Event)> = Vec::new();

        for (idx, event) in self.events.iter().enumerate() {
            if !subject_matches(&event.subject, subject) {
                continue;
            }
            let mut candidate = event.clone();
            property.apply(&mut candidate, value)?;
            staged.push((idx, candidate));
        }

        if staged.is_empty() {
            return Err(AlmanacError::EventNotFound(subject.to_string()));
        }

        if property.is_time_valued() {
            for (_, candidate) in &staged {
                if let Some(with) = self.first_conflict(candidate, Some(candidate.id)) {
                    return Err(AlmanacError::Conflict {
                        subject: candidate.subject.clone(),
                        with,
                    });
                }
            }
        }

        let affected = staged.len();
        for (idx, candidate) in staged {
            self.events[idx] = candidate;
        }
        debug!(calendar = %self.name, subject, affected, "all matching events edited");
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Events active on a calendar date. Non-recurring events match when
    /// their start or end falls on the date; recurring events contribute
    /// one synthesized occurrence per matching expansion date.
    pub fn events_on(&self, date: NaiveDate) -> Vec<Event> {
        let mut found = Vec::new();
        for event in &self.events {
            match &event.recurrence {
                None => {
                    let ends_on = event.end.is_some_and(|end| end.date() == date);
                    if event.start.date() == date || ends_on {
                        found.push(event.clone());
                    }
                }
                Some(_) => {
                    for (start, end) in event.occurrence_times() {
                        if start.date() == date {
                            found.push(event.occurrence_at(start, end));
                        }
                    }
                }
            }
        }
        found
    }

    /// Events in the inclusive range. Recurring events contribute one
    /// synthesized occurrence per expansion date inside the range.
    pub fn events_between(&self, from: NaiveDateTime, to: NaiveDateTime) -> Vec<Event> {
        let mut found = Vec::new();
        for event in &self.events {
            match &event.recurrence {
                None => {
                    let start_in = event.start >= from && event.start <= to;
                    let end_in = event
                        .end
                        .is_some_and(|end| end >= from && end <= to);
                    if start_in || end_in {
                        found.push(event.clone());
                    }
                }
                Some(_) => {
                    for (start, end) in event.occurrence_times() {
                        if start.date() >= from.date() && start.date() <= to.date() {
                            found.push(event.occurrence_at(start, end));
                        }
                    }
                }
            }
        }
        found
    }

    /// Whether any stored occurrence is active at the instant: all-day
    /// events occupy their whole calendar date, timed events their
    /// half-open interval.
    pub fn is_busy(&self, at: NaiveDateTime) -> bool {
        self.events.iter().any(|event| {
            event.occurrence_times().into_iter().any(|(start, end)| {
                if event.is_all_day {
                    start.date() == at.date()
                } else {
                    end.is_some_and(|end| start <= at && at < end)
                }
            })
        })
    }
}

// =============================================================================
// Matching helpers
// =============================================================================

/// Whether any occurrence of `a` conflicts with any occurrence of `b`.
fn events_conflict(a: &Event, b: &Event) -> bool {
    let b_slots = b.occurrence_times();
    a.occurrence_times().into_iter().any(|(a_start, a_end)| {
        let a_occurrence = a.occurrence_at(a_start, a_end);
        b_slots
            .iter()
            .any(|(b_start, b_end)| a_occurrence.conflicts_with(&b.occurrence_at(*b_start, *b_end)))
    })
}

/// Subjects match exactly or after stripping one layer of surrounding
/// quotes from either side (the command layer sometimes passes subjects
/// still quoted).
pub(crate) fn subject_matches(stored: &str, query: &str) -> bool {
    normalize_subject(stored) == normalize_subject(query)
}

fn normalize_subject(subject: &str) -> &str {
    let trimmed = subject.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(trimmed);
    unquoted
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .unwrap_or(unquoted)
}

/// Starts match at date + hour + minute precision.
pub(crate) fn starts_match(stored: NaiveDateTime, query: NaiveDateTime) -> bool {
    stored.date() == query.date()
        && stored.hour() == query.hour()
        && stored.minute() == query.minute()
}
