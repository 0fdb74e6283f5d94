//! The HTTP control surface.
//!
//! Operators enqueue JOIN/PART intents at runtime; the desired-set store
//! is the only consumer. The enqueue is non-blocking: a full intent queue
//! answers 503 rather than wedging the handler behind a stuck store.
//! `/healthz` and `/readyz` expose liveness and listener readiness.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::info;
use tracing::warn;

use crate::normalize_channel;
use crate::IrcCommand;
use crate::MembershipOp;
use crate::Result;
use crate::TransportError;

#[cfg(test)]
mod api_test;

#[derive(Clone)]
pub(crate) struct ApiState {
    control_tx: mpsc::Sender<IrcCommand>,
    ready: Arc<AtomicBool>,
}

#[derive(Deserialize)]
struct ChannelParam {
    channel: Option<String>,
}

pub(crate) fn router(state: ApiState) -> Router {
    Router::new()
        .route("/join", get(join))
        .route("/part", get(part))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(state)
}

/// Binds the control listener and serves until the shutdown signal.
pub async fn run_http_api(
    mut shutdown: watch::Receiver<()>,
    host: String,
    port: u16,
    control_tx: mpsc::Sender<IrcCommand>,
) -> Result<()> {
    let ready = Arc::new(AtomicBool::new(false));
    let app = router(ApiState {
        control_tx,
        ready: Arc::clone(&ready),
    });

    let address = format!("{host}:{port}");
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| TransportError::Listen {
            address: address.clone(),
            source,
        })?;
    ready.store(true, Ordering::SeqCst);
    info!(address = %address, "http api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
            info!("http api shutting down");
        })
        .await
        .map_err(|e| TransportError::Serve(e).into())
}

async fn join(
    State(state): State<ApiState>,
    Query(params): Query<ChannelParam>,
) -> (StatusCode, String) {
    enqueue(&state, MembershipOp::Join, params.channel)
}

async fn part(
    State(state): State<ApiState>,
    Query(params): Query<ChannelParam>,
) -> (StatusCode, String) {
    enqueue(&state, MembershipOp::Part, params.channel)
}

fn enqueue(
    state: &ApiState,
    op: MembershipOp,
    raw: Option<String>,
) -> (StatusCode, String) {
    let Some(channel) = raw.as_deref().and_then(normalize_channel) else {
        warn!(op = %op, "request missing channel parameter");
        return (
            StatusCode::BAD_REQUEST,
            "Missing channel parameter".to_string(),
        );
    };

    match state.control_tx.try_send(IrcCommand {
        op,
        channel: channel.clone(),
    }) {
        Ok(()) => {
            info!(op = %op, channel = %channel, "intent enqueued");
            (
                StatusCode::OK,
                format!("Queued {} for channel: {channel}", op.to_string().to_lowercase()),
            )
        }
        Err(e) => {
            warn!(op = %op, channel = %channel, err = %e, "intent queue unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Control queue unavailable".to_string(),
            )
        }
    }
}

async fn healthz() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

async fn readyz(State(state): State<ApiState>) -> (StatusCode, &'static str) {
    if state.ready.load(Ordering::SeqCst) {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}
