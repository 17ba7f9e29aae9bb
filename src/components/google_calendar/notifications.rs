use super::models::{CalendarEvent, EventDateTime};
use crate::utils::time::{local_time_of_day, weekday_glyph, AgendaLabel};
use chrono::{NaiveDate, NaiveTime};
use std::fmt;
use tracing::debug;

/// Shown instead of a time range for date-only or unparseable events
pub const ALL_DAY: &str = "全天";
/// Title of events without a summary
pub const UNTITLED: &str = "(無標題)";

/// Time span of one agenda line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    Timed { start: NaiveTime, end: NaiveTime },
    AllDay,
}

impl TimeRange {
    /// Local time range of an event; anything short of two parseable
    /// timestamps is an all-day line
    pub fn of_event(event: &CalendarEvent) -> Self {
        match (timestamp(&event.start), timestamp(&event.end)) {
            (Some(start), Some(end)) => match (local_time_of_day(start), local_time_of_day(end)) {
                (Ok(start), Ok(end)) => TimeRange::Timed { start, end },
                (start, end) => {
                    debug!(
                        "Unparseable event times ({:?}, {:?}), showing as all day",
                        start.err(),
                        end.err()
                    );
                    TimeRange::AllDay
                }
            },
            _ => TimeRange::AllDay,
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeRange::Timed { start, end } => {
                write!(f, "{}–{}", start.format("%H:%M"), end.format("%H:%M"))
            }
            TimeRange::AllDay => f.write_str(ALL_DAY),
        }
    }
}

fn timestamp(when: &EventDateTime) -> Option<&str> {
    when.date_time.as_deref()
}

/// `明日行程（2024/06/15（六））` followed by the separator line
pub fn header(date: NaiveDate, label: AgendaLabel) -> String {
    format!(
        "{}（{}（{}））\n—",
        label,
        date.format("%Y/%m/%d"),
        weekday_glyph(date)
    )
}

/// Line used when the day has nothing scheduled
pub fn no_events_line(label: AgendaLabel) -> String {
    format!("{}沒有行程 🎉", label)
}

/// One bullet line of the agenda
pub fn event_line(event: &CalendarEvent) -> String {
    let title = event.summary.as_deref().unwrap_or(UNTITLED);
    format!("• {} ｜ {}", TimeRange::of_event(event), title)
}

/// Build the digest pushed to the group. Events keep the order the
/// calendar returned them in.
pub fn format_agenda(date: NaiveDate, events: &[CalendarEvent], label: AgendaLabel) -> String {
    let mut message = header(date, label);

    if events.is_empty() {
        message.push('\n');
        message.push_str(&no_events_line(label));
        return message;
    }

    for event in events {
        message.push('\n');
        message.push_str(&event_line(event));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn timed(summary: Option<&str>, start: &str, end: &str) -> CalendarEvent {
        CalendarEvent {
            summary: summary.map(str::to_string),
            start: EventDateTime::timed(start),
            end: EventDateTime::timed(end),
            ..Default::default()
        }
    }

    #[test]
    fn test_header() {
        assert_eq!(
            header(date(), AgendaLabel::Tomorrow),
            "明日行程（2024/06/15（六））\n—"
        );
    }

    #[test]
    fn test_empty_agenda() {
        let message = format_agenda(date(), &[], AgendaLabel::Tomorrow);
        assert_eq!(message, "明日行程（2024/06/15（六））\n—\n明日行程沒有行程 🎉");
    }

    #[test]
    fn test_timed_events_are_shown_in_local_time() {
        let events = vec![
            timed(Some("Standup"), "2024-06-15T01:00:00Z", "2024-06-15T01:30:00Z"),
            timed(Some("Lunch"), "2024-06-15T12:00:00+08:00", "2024-06-15T13:00:00+08:00"),
        ];
        let message = format_agenda(date(), &events, AgendaLabel::Tomorrow);
        let lines: Vec<&str> = message.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "• 09:00–09:30 ｜ Standup");
        assert_eq!(lines[3], "• 12:00–13:00 ｜ Lunch");
    }

    #[test]
    fn test_all_day_and_untitled() {
        let event = CalendarEvent {
            start: EventDateTime::all_day("2024-06-15"),
            end: EventDateTime::all_day("2024-06-16"),
            ..Default::default()
        };
        assert_eq!(TimeRange::of_event(&event), TimeRange::AllDay);
        assert_eq!(event_line(&event), "• 全天 ｜ (無標題)");
    }

    #[test]
    fn test_malformed_timestamp_degrades_to_all_day() {
        let event = timed(Some("Broken"), "2024-06-15 10:00", "2024-06-15T11:00:00Z");
        assert_eq!(TimeRange::of_event(&event), TimeRange::AllDay);
        assert_eq!(event_line(&event), "• 全天 ｜ Broken");

        // Start timed but end date-only
        let event = CalendarEvent {
            start: EventDateTime::timed("2024-06-15T02:00:00Z"),
            end: EventDateTime::all_day("2024-06-16"),
            ..Default::default()
        };
        assert_eq!(TimeRange::of_event(&event), TimeRange::AllDay);
    }

    #[test]
    fn test_input_order_is_kept() {
        let events = vec![
            timed(Some("Late"), "2024-06-15T10:00:00Z", "2024-06-15T11:00:00Z"),
            timed(Some("Early"), "2024-06-15T00:00:00Z", "2024-06-15T00:30:00Z"),
        ];
        let message = format_agenda(date(), &events, AgendaLabel::Today);
        let late = message.find("Late").unwrap();
        let early = message.find("Early").unwrap();
        assert!(late < early);
        assert!(message.starts_with("今日行程（2024/06/15（六））"));
    }
}
