use crate::components::PushNotifier;
use crate::config::Config;
use crate::error::{delivery_error, AgendaResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

/// Raw answer of the push endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    pub status_code: u16,
    pub body: String,
}

impl DeliveryResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    messages: [TextMessage<'a>; 1],
}

/// LINE Messaging API push client for a single group
#[derive(Debug, Clone)]
pub struct LinePushClient {
    endpoint: String,
    access_token: String,
    recipient: String,
    client: Client,
}

impl LinePushClient {
    pub fn new(config: &Config, client: Client) -> Self {
        Self::with_endpoint(
            &config.line_push_endpoint,
            &config.line_access_token,
            &config.line_group_id,
            client,
        )
    }

    pub fn with_endpoint(endpoint: &str, access_token: &str, recipient: &str, client: Client) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            access_token: access_token.to_string(),
            recipient: recipient.to_string(),
            client,
        }
    }
}

#[async_trait]
impl PushNotifier for LinePushClient {
    async fn notify(&self, text: &str) -> AgendaResult<DeliveryResult> {
        let payload = PushRequest {
            to: &self.recipient,
            messages: [TextMessage { kind: "text", text }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| delivery_error(&format!("Failed to reach LINE: {}", e)))?;

        let status_code = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Could not read response body".to_string());
        let result = DeliveryResult { status_code, body };

        if result.is_success() {
            info!("[LINE] status {}", result.status_code);
        } else {
            warn!("[LINE] push failed: status {} {}", result.status_code, result.body);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let payload = PushRequest {
            to: "Cgroup",
            messages: [TextMessage { kind: "text", text: "hello" }],
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "to": "Cgroup",
                "messages": [{"type": "text", "text": "hello"}]
            })
        );
    }

    #[test]
    fn test_success_range() {
        let ok = DeliveryResult { status_code: 200, body: "{}".to_string() };
        let bad = DeliveryResult { status_code: 400, body: "{}".to_string() };
        assert!(ok.is_success());
        assert!(!bad.is_success());
    }
}
