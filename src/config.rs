use crate::error::{config_error, AgendaResult};
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the persisted calendar credential
pub const DEFAULT_TOKEN_PATH: &str = "token.json";
/// Default location of the provisioned OAuth client file
pub const DEFAULT_CLIENT_SECRET_PATH: &str = "credentials.json";
/// Default Google Calendar API root
pub const DEFAULT_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
/// Default LINE push endpoint
pub const DEFAULT_LINE_PUSH_ENDPOINT: &str = "https://api.line.me/v2/bot/message/push";
/// Optional settings file
pub const SETTINGS_FILE: &str = "config/agenda.toml";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_BOOTSTRAP_TIMEOUT_SECS: u64 = 300;

/// Immutable run configuration, loaded once at startup
#[derive(Debug, Clone)]
pub struct Config {
    /// LINE channel access token used for the push call
    pub line_access_token: String,
    /// LINE group that receives the digest
    pub line_group_id: String,
    /// LINE push API endpoint
    pub line_push_endpoint: String,
    /// Google Calendar to read, `primary` by default
    pub google_calendar_id: String,
    /// Google Calendar API root URL
    pub google_calendar_api_base: String,
    /// Where the authorized credential is persisted
    pub token_path: PathBuf,
    /// Where the OAuth client file is provisioned
    pub client_secret_path: PathBuf,
    /// Timeout applied to every HTTP request
    pub http_timeout: Duration,
    /// How long the interactive bootstrap waits for the browser callback
    pub bootstrap_timeout: Duration,
    /// Whether a missing credential may start the interactive flow
    pub interactive_auth: bool,
}

/// Non-secret settings that may come from `config/agenda.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    pub line_push_endpoint: Option<String>,
    pub google_calendar_id: Option<String>,
    pub google_calendar_api_base: Option<String>,
    pub token_path: Option<PathBuf>,
    pub client_secret_path: Option<PathBuf>,
    pub http_timeout_secs: Option<u64>,
    pub bootstrap_timeout_secs: Option<u64>,
    pub interactive_auth: Option<bool>,
}

impl FileSettings {
    /// Read settings from a TOML file; a missing file yields defaults
    pub fn load(path: &Path) -> AgendaResult<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Config {
    /// Load configuration from environment and the optional settings file
    pub fn load() -> AgendaResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let file = FileSettings::load(Path::new(SETTINGS_FILE))?;
        Self::from_sources(|key| env::var(key).ok(), file)
    }

    /// Build a configuration from an environment lookup and file settings.
    /// Environment values take precedence over the file.
    pub fn from_sources<F>(lookup: F, file: FileSettings) -> AgendaResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| config_error(&format!("Missing environment variable: {}", key)))
        };

        let line_access_token = required("LINE_CHANNEL_ACCESS_TOKEN")?;
        let line_group_id = required("LINE_GROUP_ID")?;

        let seconds = |key: &str, from_file: Option<u64>, default: u64| -> AgendaResult<Duration> {
            let secs = match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| config_error(&format!("Invalid {} value: {}", key, raw)))?,
                None => from_file.unwrap_or(default),
            };
            Ok(Duration::from_secs(secs))
        };

        let http_timeout = seconds("HTTP_TIMEOUT_SECS", file.http_timeout_secs, DEFAULT_HTTP_TIMEOUT_SECS)?;
        let bootstrap_timeout = seconds(
            "BOOTSTRAP_TIMEOUT_SECS",
            file.bootstrap_timeout_secs,
            DEFAULT_BOOTSTRAP_TIMEOUT_SECS,
        )?;

        let interactive_auth = match lookup("INTERACTIVE_AUTH") {
            Some(raw) => parse_flag(&raw)
                .ok_or_else(|| config_error(&format!("Invalid INTERACTIVE_AUTH value: {}", raw)))?,
            None => file.interactive_auth.unwrap_or(true),
        };

        Ok(Config {
            line_access_token,
            line_group_id,
            line_push_endpoint: lookup("LINE_PUSH_ENDPOINT")
                .or(file.line_push_endpoint)
                .unwrap_or_else(|| DEFAULT_LINE_PUSH_ENDPOINT.to_string()),
            google_calendar_id: lookup("GOOGLE_CALENDAR_ID")
                .or(file.google_calendar_id)
                .unwrap_or_else(|| "primary".to_string()),
            google_calendar_api_base: lookup("GOOGLE_CALENDAR_API_BASE")
                .or(file.google_calendar_api_base)
                .unwrap_or_else(|| DEFAULT_CALENDAR_API_BASE.to_string()),
            token_path: lookup("TOKEN_PATH")
                .map(PathBuf::from)
                .or(file.token_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_PATH)),
            client_secret_path: lookup("CLIENT_SECRET_PATH")
                .map(PathBuf::from)
                .or(file.client_secret_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CLIENT_SECRET_PATH)),
            http_timeout,
            bootstrap_timeout,
            interactive_auth,
        })
    }

    /// Shared HTTP client with the configured request timeout
    pub fn http_client(&self) -> AgendaResult<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.http_timeout)
            .build()
            .map_err(|e| config_error(&format!("Failed to build HTTP client: {}", e)))
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_sources(
            lookup_from(&[("LINE_CHANNEL_ACCESS_TOKEN", "tok"), ("LINE_GROUP_ID", "group")]),
            FileSettings::default(),
        )
        .unwrap();

        assert_eq!(config.google_calendar_id, "primary");
        assert_eq!(config.line_push_endpoint, DEFAULT_LINE_PUSH_ENDPOINT);
        assert_eq!(config.token_path, PathBuf::from("token.json"));
        assert_eq!(config.client_secret_path, PathBuf::from("credentials.json"));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.bootstrap_timeout, Duration::from_secs(300));
        assert!(config.interactive_auth);
    }

    #[test]
    fn test_missing_line_token_is_config_error() {
        let err = Config::from_sources(lookup_from(&[("LINE_GROUP_ID", "group")]), FileSettings::default())
            .unwrap_err();
        assert!(matches!(err, crate::error::Error::Config(_)));
        assert!(err.to_string().contains("LINE_CHANNEL_ACCESS_TOKEN"));
    }

    #[test]
    fn test_env_overrides_file() {
        let file: FileSettings = toml::from_str(
            r#"
            google_calendar_id = "team@example.com"
            http_timeout_secs = 10
            interactive_auth = false
            "#,
        )
        .unwrap();

        let config = Config::from_sources(
            lookup_from(&[
                ("LINE_CHANNEL_ACCESS_TOKEN", "tok"),
                ("LINE_GROUP_ID", "group"),
                ("HTTP_TIMEOUT_SECS", "5"),
            ]),
            file,
        )
        .unwrap();

        assert_eq!(config.google_calendar_id, "team@example.com");
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        assert!(!config.interactive_auth);
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        let result = Config::from_sources(
            lookup_from(&[
                ("LINE_CHANNEL_ACCESS_TOKEN", "tok"),
                ("LINE_GROUP_ID", "group"),
                ("BOOTSTRAP_TIMEOUT_SECS", "soon"),
            ]),
            FileSettings::default(),
        );
        assert!(result.is_err());
    }
}
