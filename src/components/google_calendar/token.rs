use super::bootstrap;
use crate::components::CredentialProvider;
use crate::config::Config;
use crate::error::{auth_error, config_error, AgendaResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Read-only calendar access, the only scope this tool asks for
pub const CALENDAR_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";
pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Access tokens this close to expiry are refreshed early
const EXPIRY_SKEW_SECS: i64 = 300;
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Authorized-user credential, stored in the same JSON layout Google's
/// client libraries use for `token.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "token", alias = "access_token", default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// Usable as-is: has an access token that is not about to expire
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty()) && !self.is_expired(now)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry
            .is_some_and(|expiry| expiry - Duration::seconds(EXPIRY_SKEW_SECS) <= now)
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Build a credential from a token endpoint answer.
    /// `previous_refresh` is kept when the server does not rotate it.
    pub(crate) fn from_token_response(
        response: TokenResponse,
        previous_refresh: Option<String>,
        token_uri: &str,
        client: (&str, &str),
        requested_scopes: &[String],
        now: DateTime<Utc>,
    ) -> Self {
        let expires_in = response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let scopes = match response.scope.as_deref() {
            Some(scope) if !scope.trim().is_empty() => {
                scope.split_whitespace().map(str::to_string).collect()
            }
            _ => requested_scopes.to_vec(),
        };

        Credential {
            access_token: Some(response.access_token),
            refresh_token: response.refresh_token.or(previous_refresh),
            token_uri: token_uri.to_string(),
            client_id: Some(client.0.to_string()),
            client_secret: Some(client.1.to_string()),
            scopes,
            expiry: Some(now + Duration::seconds(expires_in)),
        }
    }
}

/// OAuth client registration from the provisioned `credentials.json`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

impl ClientSecret {
    /// Load the client registration; absence is a configuration problem
    pub fn load(path: &Path) -> AgendaResult<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(config_error(&format!(
                    "missing client-secret artifact: {}",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let file: ClientSecretFile = serde_json::from_str(&content).map_err(|e| {
            config_error(&format!("Invalid client-secret file {}: {}", path.display(), e))
        })?;

        file.installed.or(file.web).ok_or_else(|| {
            config_error(&format!(
                "Client-secret file {} has neither an `installed` nor a `web` section",
                path.display()
            ))
        })
    }
}

/// Token endpoint answer for both code exchange and refresh
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// POST a form to the token endpoint, returning status and raw body
pub(crate) async fn post_token_form(
    client: &Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> AgendaResult<(StatusCode, String)> {
    let response = client
        .post(token_uri)
        .form(form)
        .send()
        .await
        .map_err(|e| auth_error(&format!("Token endpoint unreachable: {}", e)))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Could not read token response".to_string());
    Ok((status, body))
}

/// Result of trying to refresh an expired credential
#[derive(Debug)]
pub enum RefreshOutcome {
    Refreshed(Credential),
    /// The authorization server no longer accepts the refresh token
    Revoked(String),
}

/// Loads, refreshes, bootstraps and persists the calendar credential
#[derive(Debug, Clone)]
pub struct CredentialStore {
    token_path: PathBuf,
    client_secret_path: PathBuf,
    interactive: bool,
    bootstrap_timeout: std::time::Duration,
    client: Client,
}

impl CredentialStore {
    pub fn new(config: &Config, client: Client) -> Self {
        Self {
            token_path: config.token_path.clone(),
            client_secret_path: config.client_secret_path.clone(),
            interactive: config.interactive_auth,
            bootstrap_timeout: config.bootstrap_timeout,
            client,
        }
    }

    /// Store over explicit paths, with interactive bootstrap disabled
    pub fn with_paths(token_path: PathBuf, client_secret_path: PathBuf, client: Client) -> Self {
        Self {
            token_path,
            client_secret_path,
            interactive: false,
            bootstrap_timeout: std::time::Duration::from_secs(300),
            client,
        }
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    /// Read the persisted credential. Unreadable or corrupt content is
    /// logged and reported as absent.
    pub fn load(&self) -> Option<Credential> {
        let content = match fs::read_to_string(&self.token_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No stored credential at {}", self.token_path.display());
                return None;
            }
            Err(e) => {
                warn!("Failed to read {}: {}", self.token_path.display(), e);
                return None;
            }
        };

        match serde_json::from_str::<Credential>(&content) {
            Ok(credential) => Some(credential),
            Err(e) => {
                warn!("Failed to parse {}: {}", self.token_path.display(), e);
                None
            }
        }
    }

    /// Persist a credential, overwriting the previous file
    pub fn save(&self, credential: &Credential) -> AgendaResult<()> {
        if let Some(parent) = self.token_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(credential)?;
        fs::write(&self.token_path, json)?;
        info!("Credential saved to {}", self.token_path.display());
        Ok(())
    }

    pub fn load_client_secret(&self) -> AgendaResult<ClientSecret> {
        ClientSecret::load(&self.client_secret_path)
    }

    /// Exchange the refresh token for a new access token with the same scopes
    pub async fn refresh(&self, credential: &Credential) -> AgendaResult<RefreshOutcome> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or_else(|| auth_error("No refresh token in credential"))?;

        let (client_id, client_secret) = match (&credential.client_id, &credential.client_secret) {
            (Some(id), Some(secret)) => (id.clone(), secret.clone()),
            _ => {
                let secret = self.load_client_secret()?;
                (secret.client_id, secret.client_secret)
            }
        };

        let form = [
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        let (status, body) = post_token_form(&self.client, &credential.token_uri, &form).await?;

        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            return Ok(RefreshOutcome::Revoked(format!("HTTP {} - {}", status, body)));
        }
        if !status.is_success() {
            return Err(auth_error(&format!(
                "Failed to refresh token: HTTP {} - {}",
                status, body
            )));
        }

        let response: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| auth_error(&format!("Failed to parse token response: {}", e)))?;

        Ok(RefreshOutcome::Refreshed(Credential::from_token_response(
            response,
            Some(refresh_token.to_string()),
            &credential.token_uri,
            (client_id.as_str(), client_secret.as_str()),
            &credential.scopes,
            Utc::now(),
        )))
    }

    /// Run the interactive browser authorization and persist the result
    pub async fn bootstrap(&self) -> AgendaResult<Credential> {
        let secret = self.load_client_secret()?;
        let credential = bootstrap::run_installed_flow(
            &self.client,
            &secret,
            &[CALENDAR_READONLY_SCOPE],
            self.bootstrap_timeout,
        )
        .await?;
        self.save(&credential)?;
        Ok(credential)
    }

    /// Return a usable credential, refreshing or bootstrapping as needed
    pub async fn obtain_credential(&self) -> AgendaResult<Credential> {
        let now = Utc::now();
        let stored = self
            .load()
            .filter(|c| {
                let scoped = c.has_scope(CALENDAR_READONLY_SCOPE);
                if !scoped {
                    warn!("Stored credential lacks the calendar read-only scope");
                }
                scoped
            });

        if let Some(credential) = stored {
            if credential.is_valid(now) {
                debug!("Using stored credential");
                return Ok(credential);
            }

            if credential.can_refresh() {
                info!("Access token expired, refreshing");
                match self.refresh(&credential).await? {
                    RefreshOutcome::Refreshed(fresh) => {
                        self.save(&fresh)?;
                        return Ok(fresh);
                    }
                    RefreshOutcome::Revoked(reason) => {
                        warn!("Refresh token rejected ({}), authorization required", reason);
                    }
                }
            }
        }

        // Checked before any prompt so cron runs fail on the missing file
        self.load_client_secret()?;

        if !self.interactive {
            return Err(auth_error(
                "No usable credential and interactive authorization is disabled",
            ));
        }

        info!("Starting interactive calendar authorization");
        self.bootstrap().await
    }
}

#[async_trait]
impl CredentialProvider for CredentialStore {
    async fn obtain_credential(&self) -> AgendaResult<Credential> {
        CredentialStore::obtain_credential(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_credential() -> Credential {
        Credential {
            access_token: Some("ya29.access".to_string()),
            refresh_token: Some("1//refresh".to_string()),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            client_id: Some("client-id".to_string()),
            client_secret: Some("client-secret".to_string()),
            scopes: vec![CALENDAR_READONLY_SCOPE.to_string()],
            expiry: Some(Utc::now() + Duration::hours(1)),
        }
    }

    #[test]
    fn test_validity_and_expiry() {
        let now = Utc::now();
        let mut credential = sample_credential();
        assert!(credential.is_valid(now));
        assert!(!credential.is_expired(now));

        credential.expiry = Some(now + Duration::seconds(60));
        assert!(credential.is_expired(now));
        assert!(!credential.is_valid(now));
        assert!(credential.can_refresh());

        credential.expiry = None;
        assert!(credential.is_valid(now));

        credential.access_token = None;
        assert!(!credential.is_valid(now));
    }

    #[test]
    fn test_parses_google_authorized_user_layout() {
        let json = r#"{
            "token": "ya29.a0",
            "refresh_token": "1//0g",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_id": "abc.apps.googleusercontent.com",
            "client_secret": "shh",
            "scopes": ["https://www.googleapis.com/auth/calendar.readonly"],
            "universe_domain": "googleapis.com",
            "account": "",
            "expiry": "2024-06-14T02:00:00.123456Z"
        }"#;

        let credential: Credential = serde_json::from_str(json).unwrap();
        assert_eq!(credential.access_token.as_deref(), Some("ya29.a0"));
        assert_eq!(credential.refresh_token.as_deref(), Some("1//0g"));
        assert!(credential.has_scope(CALENDAR_READONLY_SCOPE));
        assert!(credential.expiry.is_some());
    }

    #[test]
    fn test_access_token_alias() {
        let json = r#"{"access_token": "abc", "refresh_token": "def"}"#;
        let credential: Credential = serde_json::from_str(json).unwrap();
        assert_eq!(credential.access_token.as_deref(), Some("abc"));
        assert_eq!(credential.token_uri, DEFAULT_TOKEN_URI);
        assert!(credential.scopes.is_empty());
    }

    #[test]
    fn test_from_token_response_keeps_refresh_token() {
        let now = Utc::now();
        let response = TokenResponse {
            access_token: "new".to_string(),
            expires_in: Some(1800),
            refresh_token: None,
            scope: None,
        };
        let scopes = vec![CALENDAR_READONLY_SCOPE.to_string()];
        let credential = Credential::from_token_response(
            response,
            Some("old-refresh".to_string()),
            DEFAULT_TOKEN_URI,
            ("id", "secret"),
            &scopes,
            now,
        );

        assert_eq!(credential.access_token.as_deref(), Some("new"));
        assert_eq!(credential.refresh_token.as_deref(), Some("old-refresh"));
        assert_eq!(credential.scopes, scopes);
        assert_eq!(credential.expiry, Some(now + Duration::seconds(1800)));
    }

    #[test]
    fn test_client_secret_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");

        fs::write(
            &path,
            r#"{"installed": {"client_id": "id", "client_secret": "secret", "redirect_uris": ["http://localhost"]}}"#,
        )
        .unwrap();
        let secret = ClientSecret::load(&path).unwrap();
        assert_eq!(secret.client_id, "id");
        assert_eq!(secret.token_uri, DEFAULT_TOKEN_URI);

        fs::write(&path, r#"{"web": {"client_id": "w", "client_secret": "s"}}"#).unwrap();
        assert_eq!(ClientSecret::load(&path).unwrap().client_id, "w");

        fs::write(&path, r#"{"other": {}}"#).unwrap();
        assert!(matches!(
            ClientSecret::load(&path),
            Err(crate::error::Error::Config(_))
        ));
    }

    #[test]
    fn test_missing_client_secret_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientSecret::load(&dir.path().join("credentials.json")).unwrap_err();
        assert!(matches!(err, crate::error::Error::Config(_)));
        assert!(err.to_string().contains("missing client-secret artifact"));
    }
}
