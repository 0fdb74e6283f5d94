use irc_ingest::config::load_account;
use irc_ingest::config::load_token;
use irc_ingest::IngestConfig;
use irc_ingest::IngestNode;
use irc_ingest::Result;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; the environment may be set directly.
    let _ = dotenvy::dotenv();

    let settings = IngestConfig::load()?;
    init_observability(&settings);

    let account = load_account(&settings.accounts_path)?;
    let token = load_token(&settings.tokens_path)?;

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());
    let signal_tx = graceful_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = graceful_shutdown(signal_tx).await {
            error!(err = %e, "failed to shutdown");
        }
    });

    let node = IngestNode::new(settings, account, token, graceful_tx, graceful_rx);
    if let Err(e) = node.run().await {
        error!(err = %e, "collector stopped");
        return Err(e);
    }
    info!("collector stopped");
    Ok(())
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| irc_ingest::Error::Fatal(format!("install SIGINT handler: {e}")))?;
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| irc_ingest::Error::Fatal(format!("install SIGTERM handler: {e}")))?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected");
        },
    }

    graceful_tx
        .send(())
        .map_err(|e| irc_ingest::Error::Fatal(format!("failed to send shutdown signal: {e}")))?;
    Ok(())
}

fn init_observability(settings: &IngestConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone()));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    info!(
        service = "irc-ingest",
        env = %settings.app_env,
        "observability initialized"
    );
}
