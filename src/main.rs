use agenda_push::startup;
use agenda_push::utils::time::DigestMode;
use clap::Parser;
use tracing::info;

/// Push a Google Calendar agenda digest to a LINE group
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Send today's agenda
    #[arg(long)]
    today: bool,
    /// Send next Monday's agenda
    #[arg(long)]
    monday: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> miette::Result<()> {
    let args = Args::parse();

    // Initialize logging
    startup::init_logging()?;

    let mode = DigestMode::from_flags(args.today, args.monday);
    info!("Starting agenda push ({:?})", mode);

    let config = startup::load_config()?;
    startup::start(config, mode).await
}
