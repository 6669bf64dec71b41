//! Flat-file export: the CSV record layout for calendar events.
//!
//! Only the field layout and quoting rule live here; writing the bytes out
//! is a caller concern. Recurring events expand to one row per occurrence.

use chrono::NaiveDateTime;

use crate::calendar::Calendar;
use crate::event::Event;
use crate::manager::CalendarManager;

pub const CSV_HEADER: &str =
    "Subject,Start Date,Start Time,End Date,End Time,All Day Event,Description,Location,Private";

pub const CSV_HEADER_WITH_CALENDAR: &str =
    "Subject,Start Date,Start Time,End Date,End Time,All Day Event,Description,Location,Private,Calendar,Timezone";

/// Render one calendar as CSV lines, header first.
pub fn calendar_to_csv(calendar: &Calendar) -> Vec<String> {
    let mut lines = vec![CSV_HEADER.to_string()];
    for event in calendar.events() {
        for (start, end) in event.occurrence_times() {
            lines.push(occurrence_row(event, start, end, None));
        }
    }
    lines
}

/// Render every registered calendar as CSV lines with the calendar name and
/// timezone appended to each record.
pub fn manager_to_csv(manager: &CalendarManager) -> Vec<String> {
    let mut lines = vec![CSV_HEADER_WITH_CALENDAR.to_string()];
    for calendar in manager.calendars() {
        let origin = (calendar.name.as_str(), calendar.timezone.name());
        for event in calendar.events() {
            for (start, end) in event.occurrence_times() {
                lines.push(occurrence_row(event, start, end, Some(origin)));
            }
        }
    }
    lines
}

fn occurrence_row(
    event: &Event,
    start: NaiveDateTime,
    end: Option<NaiveDateTime>,
    calendar: Option<(&str, &str)>,
) -> String {
    let start_date = start.format("%m/%d/%Y").to_string();
    let start_time = if event.is_all_day {
        String::new()
    } else {
        start.format("%I:%M %p").to_string()
    };
    // An absent end duplicates the start date and leaves the time empty.
    let end_date = end
        .map(|end| end.format("%m/%d/%Y").to_string())
        .unwrap_or_else(|| start_date.clone());
    let end_time = match end {
        Some(end) if !event.is_all_day => end.format("%I:%M %p").to_string(),
        _ => String::new(),
    };

    let mut fields = vec![
        escape(&event.subject),
        start_date,
        start_time,
        end_date,
        end_time,
        flag(event.is_all_day),
        escape(&event.description),
        escape(&event.location),
        flag(!event.is_public),
    ];
    if let Some((name, timezone)) = calendar {
        fields.push(escape(name));
        fields.push(escape(timezone));
    }
    fields.join(",")
}

fn flag(value: bool) -> String {
    if value { "True" } else { "False" }.to_string()
}

/// RFC4180-style quoting: wrap the field when it carries the delimiter, a
/// quote, or a newline, doubling internal quotes.
fn escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
