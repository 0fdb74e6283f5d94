use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::WsSource;
use crate::constants::DEFAULT_PING_ORIGIN;
use crate::Result;
use crate::TransportError;

/// Reads frames off the socket, splits them into lines, and dispatches:
/// keepalive probes answer straight onto the writer queue (mandatory, so
/// they bypass the classifier and the reconciler's rate limit), everything
/// else goes to the classifier with backpressure.
///
/// Selecting against the shutdown signal keeps a pending socket read from
/// blocking cancellation.
pub async fn run_reader(
    mut shutdown: watch::Receiver<()>,
    mut socket: WsSource,
    writer_tx: mpsc::Sender<String>,
    lines_tx: mpsc::Sender<String>,
) -> Result<()> {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                info!("reader stopping");
                return Ok(());
            }
            frame = socket.next() => {
                let payload = match frame {
                    None => {
                        warn!("socket closed");
                        return Err(TransportError::Closed.into());
                    }
                    Some(Err(e)) => {
                        warn!(err = %e, "socket read failed");
                        return Err(TransportError::Read(e).into());
                    }
                    Some(Ok(Message::Text(payload))) => payload,
                    Some(Ok(Message::Close(_))) => {
                        warn!("socket closed by peer");
                        return Err(TransportError::Closed.into());
                    }
                    // WebSocket-level ping/pong is the transport's concern.
                    Some(Ok(_)) => continue,
                };
                dispatch_payload(&payload, &writer_tx, &lines_tx).await?;
            }
        }
    }
}

/// Splits one text frame into `\r\n`-delimited lines and routes each.
pub(crate) async fn dispatch_payload(
    payload: &str,
    writer_tx: &mpsc::Sender<String>,
    lines_tx: &mpsc::Sender<String>,
) -> Result<()> {
    for line in payload.split("\r\n") {
        if line.is_empty() {
            continue;
        }
        if line.starts_with("PING") {
            let reply = keepalive_reply(line);
            debug!(reply = %reply.trim_end(), "answering keepalive");
            if writer_tx.send(reply).await.is_err() {
                return Err(TransportError::ChannelClosed("writer queue closed".into()).into());
            }
            continue;
        }
        if lines_tx.send(line.to_string()).await.is_err() {
            return Err(TransportError::ChannelClosed("classifier queue closed".into()).into());
        }
    }
    Ok(())
}

/// `PONG :<server>`, echoing the server token the PING carried.
pub(crate) fn keepalive_reply(line: &str) -> String {
    let origin = line["PING".len()..]
        .trim_start()
        .trim_start_matches(':')
        .trim();
    let origin = if origin.is_empty() {
        DEFAULT_PING_ORIGIN
    } else {
        origin
    };
    format!("PONG :{origin}\r\n")
}
