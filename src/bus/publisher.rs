use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::error;
use tracing::info;

use super::BusSink;
use crate::ChatEvent;
use crate::Result;

/// Self-describing record shape written to the bus.
#[derive(Serialize)]
struct BusRecord<'a> {
    kind: &'static str,
    #[serde(flatten)]
    event: &'a ChatEvent,
}

/// Forwards classified chat events to the downstream bus, keyed by
/// `channel_id`. A delivery failure is logged and the event dropped;
/// at-least-once is not guaranteed here.
pub async fn run_publisher<S: BusSink>(
    mut shutdown: watch::Receiver<()>,
    mut chat_rx: mpsc::Receiver<ChatEvent>,
    sink: S,
) -> Result<()> {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                info!("publisher stopping");
                return Ok(());
            }
            maybe_evt = chat_rx.recv() => {
                let Some(event) = maybe_evt else {
                    info!("chat channel closed");
                    return Ok(());
                };
                let record = BusRecord {
                    kind: event.kind(),
                    event: &event,
                };
                let payload = match serde_json::to_vec(&record) {
                    Ok(payload) => payload,
                    Err(e) => {
                        error!(err = %e, "chat event serialization failed");
                        continue;
                    }
                };
                if let Err(e) = sink.publish(event.key().as_bytes(), &payload).await {
                    error!(err = %e, channel_id = %event.channel_id, "bus write failed; event dropped");
                }
            }
        }
    }
}
