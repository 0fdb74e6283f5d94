use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::http::StatusCode;
use http_body_util::BodyExt;
use tokio::sync::mpsc;
use tower::ServiceExt;

use super::*;

fn test_state(
    capacity: usize,
    ready: bool,
) -> (ApiState, mpsc::Receiver<IrcCommand>) {
    let (control_tx, control_rx) = mpsc::channel(capacity);
    let state = ApiState {
        control_tx,
        ready: Arc::new(AtomicBool::new(ready)),
    };
    (state, control_rx)
}

async fn send_request(
    app: Router,
    uri: &str,
) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&body).to_string())
}

#[tokio::test]
async fn join_should_enqueue_a_normalized_intent() {
    let (state, mut control_rx) = test_state(4, true);
    let app = router(state);

    let (status, body) = send_request(app, "/join?channel=%20Chess%20").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Queued join for channel: #chess");
    let cmd = control_rx.recv().await.unwrap();
    assert_eq!(cmd.op, MembershipOp::Join);
    assert_eq!(cmd.channel, "#chess");
}

#[tokio::test]
async fn part_should_enqueue_a_part_intent() {
    let (state, mut control_rx) = test_state(4, true);
    let app = router(state);

    let (status, _) = send_request(app, "/part?channel=chess").await;

    assert_eq!(status, StatusCode::OK);
    let cmd = control_rx.recv().await.unwrap();
    assert_eq!(cmd.op, MembershipOp::Part);
    assert_eq!(cmd.channel, "#chess");
}

#[tokio::test]
async fn missing_channel_should_answer_bad_request() {
    let (state, _control_rx) = test_state(4, true);

    let (status, body) = send_request(router(state.clone()), "/join").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Missing channel parameter");

    let (status, _) = send_request(router(state.clone()), "/join?channel=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_request(router(state), "/part?channel=%20%20").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn full_intent_queue_should_answer_unavailable() {
    let (state, mut control_rx) = test_state(1, true);

    let (status, _) = send_request(router(state.clone()), "/join?channel=a").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send_request(router(state), "/join?channel=b").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, "Control queue unavailable");

    // The first intent is intact.
    assert_eq!(control_rx.recv().await.unwrap().channel, "#a");
}

#[tokio::test]
async fn probes_should_reflect_readiness() {
    let (state, _control_rx) = test_state(4, false);

    let (status, body) = send_request(router(state.clone()), "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");

    let (status, _) = send_request(router(state.clone()), "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    state.ready.store(true, Ordering::SeqCst);
    let (status, _) = send_request(router(state), "/readyz").await;
    assert_eq!(status, StatusCode::OK);
}
