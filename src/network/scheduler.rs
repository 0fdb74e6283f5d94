use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::debug;
use tracing::info;

use crate::IrcCommand;
use crate::Result;

/// Formats reconciler command intents into wire lines for the writer.
pub async fn run_scheduler(
    mut shutdown: watch::Receiver<()>,
    mut commands_rx: mpsc::Receiver<IrcCommand>,
    writer_tx: mpsc::Sender<String>,
) -> Result<()> {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                info!("scheduler stopping");
                return Ok(());
            }
            maybe_cmd = commands_rx.recv() => {
                let Some(cmd) = maybe_cmd else {
                    info!("command channel closed");
                    return Ok(());
                };
                debug!(op = %cmd.op, channel = %cmd.channel, "forwarding command");
                let line = format!("{} {}\r\n", cmd.op, cmd.channel);
                if writer_tx.send(line).await.is_err() {
                    info!("writer queue closed");
                    return Ok(());
                }
            }
        }
    }
}
