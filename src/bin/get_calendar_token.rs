use agenda_push::components::google_calendar::CredentialStore;
use agenda_push::config::Config;
use agenda_push::startup;

/// Authorize calendar access in the browser and save the credential.
/// Run this once by hand before scheduling the digest.
#[tokio::main(flavor = "current_thread")]
async fn main() -> miette::Result<()> {
    startup::init_logging()?;

    let config = Config::load()?;
    let client = config.http_client()?;
    let store = CredentialStore::new(&config, client);

    store.bootstrap().await?;

    println!(
        "Calendar credential saved to {}",
        store.token_path().display()
    );
    Ok(())
}
