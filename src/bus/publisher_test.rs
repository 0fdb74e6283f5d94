use tokio::sync::mpsc;
use tokio::sync::watch;

use super::run_publisher;
use super::MockBusSink;
use crate::BusError;
use crate::ChatEvent;

fn event() -> ChatEvent {
    ChatEvent {
        user_id: "123".to_string(),
        user_login: "bob".to_string(),
        channel_id: "999".to_string(),
        channel_login: "chess".to_string(),
        text: "hello world!".to_string(),
    }
}

#[tokio::test]
async fn events_should_be_published_keyed_by_channel_id() {
    let mut sink = MockBusSink::new();
    sink.expect_publish()
        .withf(|key: &[u8], payload: &[u8]| {
            let value: serde_json::Value = serde_json::from_slice(payload).unwrap();
            key == b"999"
                && value["kind"] == "privmsg"
                && value["user_id"] == "123"
                && value["channel_login"] == "chess"
                && value["text"] == "hello world!"
        })
        .times(1)
        .returning(|_, _| Ok(()));

    let (_shutdown_tx, shutdown_rx) = watch::channel(());
    let (chat_tx, chat_rx) = mpsc::channel(4);
    let task = tokio::spawn(run_publisher(shutdown_rx, chat_rx, sink));

    chat_tx.send(event()).await.unwrap();
    drop(chat_tx);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn delivery_failure_should_drop_the_event_and_continue() {
    let mut sink = MockBusSink::new();
    let mut calls = 0u32;
    sink.expect_publish()
        .times(2)
        .returning(move |_, _| {
            calls += 1;
            if calls == 1 {
                Err(BusError::Delivery(rdkafka::error::KafkaError::Canceled).into())
            } else {
                Ok(())
            }
        });

    let (_shutdown_tx, shutdown_rx) = watch::channel(());
    let (chat_tx, chat_rx) = mpsc::channel(4);
    let task = tokio::spawn(run_publisher(shutdown_rx, chat_rx, sink));

    chat_tx.send(event()).await.unwrap();
    chat_tx.send(event()).await.unwrap();
    drop(chat_tx);

    // The loop survives the failed delivery and exits cleanly.
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_should_stop_the_publisher() {
    let mut sink = MockBusSink::new();
    sink.expect_publish().never();

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let (_chat_tx, chat_rx) = mpsc::channel::<ChatEvent>(4);
    let task = tokio::spawn(run_publisher(shutdown_rx, chat_rx, sink));

    shutdown_tx.send(()).unwrap();
    task.await.unwrap().unwrap();
}
