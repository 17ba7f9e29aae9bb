pub mod bootstrap;
pub mod models;
pub mod notifications;
pub mod token;

pub use models::CalendarEvent;
pub use token::{Credential, CredentialStore};

use crate::components::CalendarSource;
use crate::config::Config;
use crate::error::{auth_error, provider_error, AgendaResult};
use crate::utils::time::DayWindow;
use async_trait::async_trait;
use chrono::NaiveDate;
use models::EventsPage;
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

/// Google Calendar v3 `events.list` client
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    api_base: String,
    calendar_id: String,
    client: Client,
}

impl GoogleCalendarClient {
    pub fn new(config: &Config, client: Client) -> Self {
        Self::with_base(&config.google_calendar_api_base, &config.google_calendar_id, client)
    }

    pub fn with_base(api_base: &str, calendar_id: &str, client: Client) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            calendar_id: calendar_id.to_string(),
            client,
        }
    }

    fn events_url(&self, window: &DayWindow, page_token: Option<&str>) -> AgendaResult<Url> {
        let mut url = Url::parse(&format!("{}/calendars/", self.api_base))
            .map_err(|e| provider_error(&format!("Failed to parse URL: {}", e)))?;

        // Shared calendar ids may contain `#`, push them as an encoded segment
        url.path_segments_mut()
            .map_err(|_| provider_error("Calendar API base cannot carry a path"))?
            .pop_if_empty()
            .push(&self.calendar_id)
            .push("events");

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("timeMin", &window.time_min())
                .append_pair("timeMax", &window.time_max())
                .append_pair("singleEvents", "true")
                .append_pair("orderBy", "startTime");
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl CalendarSource for GoogleCalendarClient {
    async fn list_events(
        &self,
        window: &DayWindow,
        credential: &Credential,
    ) -> AgendaResult<Vec<CalendarEvent>> {
        let access_token = credential
            .access_token
            .as_deref()
            .ok_or_else(|| auth_error("No access token available"))?;

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = self.events_url(window, page_token.as_deref())?;
            debug!("Requesting {}", url);

            let response = self
                .client
                .get(url)
                .bearer_auth(access_token)
                .send()
                .await
                .map_err(|e| provider_error(&format!("Failed to fetch events: {}", e)))?;

            if !response.status().is_success() {
                let status = response.status();
                let error_body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Could not read error response".to_string());
                return Err(provider_error(&format!(
                    "Failed to fetch events: HTTP {} - {}",
                    status, error_body
                )));
            }

            let page: EventsPage = response
                .json()
                .await
                .map_err(|e| provider_error(&format!("Failed to parse events response: {}", e)))?;

            events.extend(page.items);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(events)
    }
}

/// Fetch every event overlapping the given local day
pub async fn fetch<S>(
    source: &S,
    date: NaiveDate,
    credential: &Credential,
) -> AgendaResult<Vec<CalendarEvent>>
where
    S: CalendarSource + ?Sized,
{
    let window = DayWindow::for_date(date);
    let events = source.list_events(&window, credential).await?;
    info!(
        "Fetched {} events for {} ({} to {})",
        events.len(),
        date,
        window.time_min(),
        window.time_max()
    );
    Ok(events)
}
