//! In-memory multi-calendar scheduling engine.
//!
//! This crate stores events (timed, all-day, recurring) across named
//! calendars, each bound to a timezone, and provides:
//! - conflict-checked creation and editing, including recurring-series
//!   splitting (`calendar`)
//! - weekly recurrence expansion (`recurrence`)
//! - range queries and busy/free lookup (`calendar`)
//! - cross-calendar copies that preserve absolute instants across timezone
//!   changes (`manager`)
//! - the CSV export record layout (`export`)
//!
//! The engine is synchronous and in-memory: callers pass already-parsed,
//! strongly-typed requests and serialize their own access (one logical
//! writer at a time per [`CalendarManager`]).

pub mod calendar;
pub mod error;
pub mod event;
pub mod export;
pub mod manager;
pub mod property;
pub mod recurrence;

pub use calendar::Calendar;
pub use error::{AlmanacError, AlmanacResult};
pub use event::Event;
pub use manager::CalendarManager;
pub use property::EventProperty;
pub use recurrence::{Occurrences, RecurrenceEnd, RecurrencePattern, WeekdaySet};
