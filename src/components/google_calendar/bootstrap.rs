use super::token::{post_token_form, ClientSecret, Credential, TokenResponse};
use crate::error::{auth_error, AgendaResult};
use chrono::Utc;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use url::Url;

/// What the browser callback carried
#[derive(Debug, PartialEq, Eq)]
pub enum CallbackOutcome {
    Code(String),
    Denied(String),
    StateMismatch,
}

/// Build the consent URL for the installed-app flow
pub fn authorization_url(
    secret: &ClientSecret,
    redirect_uri: &str,
    scopes: &[&str],
    state: &str,
) -> AgendaResult<Url> {
    let scope = scopes.join(" ");
    Url::parse_with_params(
        &secret.auth_uri,
        &[
            ("client_id", secret.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
        ],
    )
    .map_err(|e| auth_error(&format!("Invalid auth_uri {}: {}", secret.auth_uri, e)))
}

/// Interpret a request path received by the local listener.
/// Returns `None` for requests that are not the OAuth redirect.
pub fn parse_callback(path_and_query: &str, expected_state: &str) -> Option<CallbackOutcome> {
    let url = Url::parse(&format!("http://localhost{}", path_and_query)).ok()?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if code.is_none() && error.is_none() {
        return None;
    }
    if state.as_deref() != Some(expected_state) {
        return Some(CallbackOutcome::StateMismatch);
    }
    match (code, error) {
        (_, Some(error)) => Some(CallbackOutcome::Denied(error)),
        (Some(code), None) => Some(CallbackOutcome::Code(code)),
        (None, None) => None,
    }
}

/// Block until the redirect arrives or the timeout elapses
fn wait_for_callback(
    server: tiny_http::Server,
    expected_state: &str,
    timeout: Duration,
) -> AgendaResult<String> {
    let deadline = Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(auth_error(&format!(
                "Timed out after {}s waiting for the authorization callback",
                timeout.as_secs()
            )));
        }

        let request = match server.recv_timeout(remaining) {
            Ok(Some(request)) => request,
            Ok(None) => continue,
            Err(e) => return Err(auth_error(&format!("Callback listener failed: {}", e))),
        };

        let outcome = parse_callback(request.url(), expected_state);
        let (reply, result) = match outcome {
            None => {
                let _ = request.respond(tiny_http::Response::empty(tiny_http::StatusCode(404)));
                continue;
            }
            Some(CallbackOutcome::Code(code)) => (
                "Authorization successful! You can close this window.",
                Ok(code),
            ),
            Some(CallbackOutcome::Denied(reason)) => (
                "Authorization was denied.",
                Err(auth_error(&format!("Authorization denied: {}", reason))),
            ),
            Some(CallbackOutcome::StateMismatch) => (
                "Authorization failed: state mismatch.",
                Err(auth_error("Authorization callback state did not match")),
            ),
        };

        if let Err(e) = request.respond(tiny_http::Response::from_string(reply)) {
            warn!("Failed to answer the browser: {}", e);
        }
        return result;
    }
}

/// Run the installed-app authorization flow and return a fresh credential
pub async fn run_installed_flow(
    client: &Client,
    secret: &ClientSecret,
    scopes: &[&str],
    timeout: Duration,
) -> AgendaResult<Credential> {
    let server = tiny_http::Server::http("127.0.0.1:0")
        .map_err(|e| auth_error(&format!("Failed to start callback listener: {}", e)))?;
    let port = server
        .server_addr()
        .to_ip()
        .map(|addr| addr.port())
        .ok_or_else(|| auth_error("Callback listener has no TCP address"))?;
    let redirect_uri = format!("http://127.0.0.1:{}/", port);

    // Random state guards against forged callbacks
    let state = uuid::Uuid::new_v4().to_string();
    let auth_url = authorization_url(secret, &redirect_uri, scopes, &state)?;

    println!("Open this URL to authorize calendar access:\n{}", auth_url);
    if let Err(e) = webbrowser::open(auth_url.as_str()) {
        warn!("Could not open a browser: {}", e);
    }
    info!("Waiting up to {}s for the authorization callback", timeout.as_secs());

    let code = tokio::task::spawn_blocking(move || wait_for_callback(server, &state, timeout))
        .await
        .map_err(|e| auth_error(&format!("Callback task failed: {}", e)))??;

    let form = [
        ("client_id", secret.client_id.as_str()),
        ("client_secret", secret.client_secret.as_str()),
        ("code", code.as_str()),
        ("redirect_uri", redirect_uri.as_str()),
        ("grant_type", "authorization_code"),
    ];
    let (status, body) = post_token_form(client, &secret.token_uri, &form).await?;
    if !status.is_success() {
        return Err(auth_error(&format!(
            "Failed to exchange authorization code: HTTP {} - {}",
            status, body
        )));
    }

    let response: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| auth_error(&format!("Failed to parse token response: {}", e)))?;
    let requested: Vec<String> = scopes.iter().map(|s| s.to_string()).collect();

    Ok(Credential::from_token_response(
        response,
        None,
        &secret.token_uri,
        (secret.client_id.as_str(), secret.client_secret.as_str()),
        &requested,
        Utc::now(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> ClientSecret {
        ClientSecret {
            client_id: "client.apps.googleusercontent.com".to_string(),
            client_secret: "secret".to_string(),
            auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
        }
    }

    #[test]
    fn test_authorization_url_parameters() {
        let url = authorization_url(
            &secret(),
            "http://127.0.0.1:4321/",
            &["https://www.googleapis.com/auth/calendar.readonly"],
            "xyz",
        )
        .unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let get = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .unwrap()
        };

        assert_eq!(get("client_id"), "client.apps.googleusercontent.com");
        assert_eq!(get("redirect_uri"), "http://127.0.0.1:4321/");
        assert_eq!(get("response_type"), "code");
        assert_eq!(get("access_type"), "offline");
        assert_eq!(get("state"), "xyz");
        assert_eq!(get("scope"), "https://www.googleapis.com/auth/calendar.readonly");
    }

    #[test]
    fn test_parse_callback() {
        assert_eq!(
            parse_callback("/?state=abc&code=4%2F0Ab", "abc"),
            Some(CallbackOutcome::Code("4/0Ab".to_string()))
        );
        assert_eq!(
            parse_callback("/?error=access_denied&state=abc", "abc"),
            Some(CallbackOutcome::Denied("access_denied".to_string()))
        );
        assert_eq!(
            parse_callback("/?state=other&code=1", "abc"),
            Some(CallbackOutcome::StateMismatch)
        );
        assert_eq!(parse_callback("/favicon.ico", "abc"), None);
    }
}
