use futures::SinkExt;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::error;
use tracing::info;

use super::WsSink;
use crate::Result;
use crate::TransportError;

/// Single consumer of the outbound-line queue, single producer to the
/// socket. Lines go out as individual text frames in the order they were
/// enqueued. A write failure is fatal: it propagates and the supervisor
/// cancels the peers.
pub async fn run_writer(
    mut shutdown: watch::Receiver<()>,
    mut sink: WsSink,
    mut writer_rx: mpsc::Receiver<String>,
) -> Result<()> {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                info!("writer stopping");
                return Ok(());
            }
            maybe_line = writer_rx.recv() => {
                let Some(line) = maybe_line else {
                    info!("writer queue closed");
                    return Ok(());
                };
                if let Err(e) = sink.send(Message::Text(line)).await {
                    error!(err = %e, "socket write failed");
                    return Err(TransportError::Write(e).into());
                }
            }
        }
    }
}
