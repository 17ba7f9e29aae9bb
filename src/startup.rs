use crate::components::google_calendar::{self, notifications, CredentialStore, GoogleCalendarClient};
use crate::components::line::LinePushClient;
use crate::components::{CalendarSource, CredentialProvider, DeliveryResult, PushNotifier};
use crate::config::Config;
use crate::error::{AgendaResult, Error};
use crate::utils::time::{select_target, DigestMode, TargetDate};
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Config(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load the run configuration
pub fn load_config() -> miette::Result<Config> {
    match Config::load() {
        Ok(config) => Ok(config),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// What a digest run produced
#[derive(Debug, Clone)]
pub struct DigestReport {
    pub target: TargetDate,
    pub message: String,
    /// `None` when the push call itself could not be made
    pub delivery: Option<DeliveryResult>,
}

/// Select the day, fetch its events, format and push the digest.
/// Credential, config and calendar failures abort; delivery failures
/// are logged and the run still succeeds.
pub async fn run_digest<P, S, N>(
    now: DateTime<Utc>,
    mode: DigestMode,
    credentials: &P,
    calendar: &S,
    notifier: &N,
) -> AgendaResult<DigestReport>
where
    P: CredentialProvider + ?Sized,
    S: CalendarSource + ?Sized,
    N: PushNotifier + ?Sized,
{
    let target = select_target(now, mode);
    info!("Building {} for {}", target.label, target.date);

    let credential = credentials.obtain_credential().await?;
    let events = google_calendar::fetch(calendar, target.date, &credential).await?;
    let message = notifications::format_agenda(target.date, &events, target.label);

    println!("=== 將發送到 LINE 的訊息 ===");
    println!("{}", message);

    let delivery = match notifier.notify(&message).await {
        Ok(result) => {
            println!("[LINE] 狀態碼： {} {}", result.status_code, result.body);
            if !result.is_success() {
                warn!("Digest was not delivered (HTTP {})", result.status_code);
            }
            Some(result)
        }
        Err(e) if !e.is_fatal() => {
            warn!("Digest was not delivered: {}", e);
            None
        }
        Err(e) => return Err(e),
    };

    Ok(DigestReport {
        target,
        message,
        delivery,
    })
}

/// Wire the real Google Calendar and LINE clients and run once
pub async fn start(config: Config, mode: DigestMode) -> miette::Result<()> {
    let client = config.http_client()?;
    let credentials = CredentialStore::new(&config, client.clone());
    let calendar = GoogleCalendarClient::new(&config, client.clone());
    let notifier = LinePushClient::new(&config, client);

    let report = run_digest(Utc::now(), mode, &credentials, &calendar, &notifier).await?;
    info!(
        "Run finished for {} (delivered: {})",
        report.target.date,
        report.delivery.as_ref().is_some_and(DeliveryResult::is_success)
    );
    Ok(())
}
