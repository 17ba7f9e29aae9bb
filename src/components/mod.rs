use crate::error::AgendaResult;
use async_trait::async_trait;

// Export components
pub mod google_calendar;
pub mod line;

pub use google_calendar::models::CalendarEvent;
pub use google_calendar::token::Credential;
pub use line::DeliveryResult;

use crate::utils::time::DayWindow;

/// Something that can hand out a usable calendar credential
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn obtain_credential(&self) -> AgendaResult<Credential>;
}

/// Calendar capability: list the events overlapping a time window.
/// Implementations return recurring events expanded and ordered by start.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    async fn list_events(
        &self,
        window: &DayWindow,
        credential: &Credential,
    ) -> AgendaResult<Vec<CalendarEvent>>;
}

/// Messaging capability: deliver one text message to the configured recipient.
/// A non-2xx answer is reported in the result, not raised.
#[async_trait]
pub trait PushNotifier: Send + Sync {
    async fn notify(&self, text: &str) -> AgendaResult<DeliveryResult>;
}
