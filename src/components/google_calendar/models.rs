use serde::{Deserialize, Serialize};

/// Start or end of an event as the Calendar API returns it.
/// Timed events carry `dateTime`, all-day events only `date`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventDateTime {
    pub fn timed(date_time: &str) -> Self {
        Self {
            date_time: Some(date_time.to_string()),
            ..Default::default()
        }
    }

    pub fn all_day(date: &str) -> Self {
        Self {
            date: Some(date.to_string()),
            ..Default::default()
        }
    }
}

/// Calendar event, read-only view of an API item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub start: EventDateTime,
    #[serde(default)]
    pub end: EventDateTime,
}

/// One page of `events.list`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsPage {
    #[serde(default)]
    pub items: Vec<CalendarEvent>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}
