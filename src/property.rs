//! Editable event properties and their string-value parsing.
//!
//! Edit requests arrive from the command layer as a property name plus a
//! string value; unknown names and unparsable values are invalid-property
//! failures, reported before anything mutates.

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{AlmanacError, AlmanacResult};
use crate::event::Event;

/// The property names the edit operations recognize, including the
/// spelling aliases accepted at the command boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventProperty {
    Subject,
    Description,
    Location,
    Public,
    StartTime,
    StartDate,
    EndTime,
    EndDate,
}

impl EventProperty {
    pub fn parse(name: &str) -> AlmanacResult<Self> {
        match name.to_ascii_lowercase().as_str() {
            "name" | "subject" => Ok(Self::Subject),
            "description" => Ok(Self::Description),
            "location" => Ok(Self::Location),
            "public" => Ok(Self::Public),
            "starttime" => Ok(Self::StartTime),
            "startdate" => Ok(Self::StartDate),
            "endtime" => Ok(Self::EndTime),
            "enddate" => Ok(Self::EndDate),
            _ => Err(AlmanacError::InvalidProperty(name.to_string())),
        }
    }

    /// Whether applying this property moves the event in time (and
    /// therefore requires a conflict re-check).
    pub fn is_time_valued(&self) -> bool {
        matches!(
            self,
            Self::StartTime | Self::StartDate | Self::EndTime | Self::EndDate
        )
    }

    /// Apply this property to `event`, parsing `value` as the property's
    /// native type. The mutated event is re-validated; the caller decides
    /// whether a conflict check is also needed.
    pub fn apply(&self, event: &mut Event, value: &str) -> AlmanacResult<()> {
        match self {
            Self::Subject => {
                if value.trim().is_empty() {
                    return Err(AlmanacError::Validation(
                        "event subject must not be empty".to_string(),
                    ));
                }
                event.subject = value.to_string();
                Ok(())
            }
            Self::Description => {
                event.description = value.to_string();
                Ok(())
            }
            Self::Location => {
                event.location = value.to_string();
                Ok(())
            }
            Self::Public => {
                event.is_public = parse_bool("public", value)?;
                Ok(())
            }
            Self::StartTime => {
                event.start = parse_datetime("starttime", value)?;
                event.validate()
            }
            Self::StartDate => {
                let date = parse_date("startdate", value)?;
                event.start = NaiveDateTime::new(date, event.start.time());
                event.validate()
            }
            Self::EndTime => {
                if event.is_all_day {
                    return Err(AlmanacError::Validation(
                        "all-day events have no end time".to_string(),
                    ));
                }
                event.end = Some(parse_datetime("endtime", value)?);
                event.validate()
            }
            Self::EndDate => {
                if event.is_all_day {
                    return Err(AlmanacError::Validation(
                        "all-day events have no end time".to_string(),
                    ));
                }
                let date = parse_date("enddate", value)?;
                let time = match event.end {
                    Some(end) => end.time(),
                    None => event.start.time(),
                };
                event.end = Some(NaiveDateTime::new(date, time));
                event.validate()
            }
        }
    }
}

fn parse_bool(property: &str, value: &str) -> AlmanacResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(invalid(property, value)),
    }
}

fn parse_datetime(property: &str, value: &str) -> AlmanacResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|_| invalid(property, value))
}

fn parse_date(property: &str, value: &str) -> AlmanacResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| invalid(property, value))
}

fn invalid(property: &str, value: &str) -> AlmanacError {
    AlmanacError::InvalidValue {
        property: property.to_string(),
        value: value.to_string(),
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
    fn property_names_and_aliases_parse() {
        assert_eq!(EventProperty::parse("name").unwrap(), EventProperty::Subject);
        assert_eq!(EventProperty::parse("Subject").unwrap(), EventProperty::Subject);
        assert_eq!(EventProperty::parse("starttime").unwrap(), EventProperty::StartTime);
        assert!(matches!(
            EventProperty::parse("priority"),
            Err(AlmanacError::InvalidProperty(_))
        ));
    }

    #[test]
    fn time_valued_properties_are_flagged() {
        assert!(EventProperty::StartDate.is_time_valued());
        assert!(EventProperty::EndTime.is_time_valued());
        assert!(!EventProperty::Location.is_time_valued());
    }

    #[test]
    fn malformed_boolean_is_an_invalid_value() {
        let mut event = Event::timed("a", dt(2024, 1, 1, 9, 0), dt(2024, 1, 1, 10, 0));
        let err = EventProperty::Public.apply(&mut event, "yes").unwrap_err();
        assert!(matches!(err, AlmanacError::InvalidValue { .. }));
        assert!(event.is_public);
    }

    #[test]
    fn end_time_edit_rejected_for_all_day_events() {
        let mut event = Event::all_day("a", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!(EventProperty::EndTime
            .apply(&mut event, "2024-01-01T17:00")
            .is_err());
        assert!(event.end.is_none());
    }

    #[test]
    fn start_edit_that_inverts_the_interval_fails_validation() {
        let mut event = Event::timed("a", dt(2024, 1, 1, 9, 0), dt(2024, 1, 1, 10, 0));
        assert!(EventProperty::StartTime
            .apply(&mut event, "2024-01-01T11:00")
            .is_err());
    }

    #[test]
    fn start_date_edit_keeps_the_time_of_day() {
        let mut event = Event::timed("a", dt(2024, 1, 1, 9, 0), dt(2024, 1, 5, 10, 0));
        EventProperty::StartDate.apply(&mut event, "2024-01-02").unwrap();
        assert_eq!(event.start, dt(2024, 1, 2, 9, 0));
    }
}
