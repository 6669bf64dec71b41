//! Error types for the almanac engine.

use thiserror::Error;

/// Errors reported by the scheduling engine.
///
/// Every expected domain failure (validation, conflicts, missing targets,
/// bad property values) comes back through these variants; the engine never
/// panics on caller input.
#[derive(Error, Debug)]
pub enum AlmanacError {
    #[error("Invalid event: {0}")]
    Validation(String),

    #[error("'{subject}' conflicts with existing event '{with}'")]
    Conflict { subject: String, with: String },

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("Calendar not found: {0}")]
    CalendarNotFound(String),

    #[error("Calendar already exists: {0}")]
    CalendarExists(String),

    #[error("Unknown property: {0}")]
    InvalidProperty(String),

    #[error("Invalid value '{value}' for property '{property}'")]
    InvalidValue { property: String, value: String },

    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),

    #[error("Unknown weekday code: {0}")]
    InvalidWeekday(char),
}

/// Result type alias for almanac operations.
pub type AlmanacResult<T> = Result<T, AlmanacError>;
