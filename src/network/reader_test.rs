use tokio::sync::mpsc;

use super::reader::*;

#[tokio::test]
async fn payload_should_split_lines_and_discard_empties() {
    let (writer_tx, _writer_rx) = mpsc::channel(8);
    let (lines_tx, mut lines_rx) = mpsc::channel(8);

    dispatch_payload(
        ":a!a@t PRIVMSG #x :one\r\n\r\n:b!b@t PRIVMSG #x :two\r\n",
        &writer_tx,
        &lines_tx,
    )
    .await
    .unwrap();

    assert_eq!(lines_rx.recv().await.unwrap(), ":a!a@t PRIVMSG #x :one");
    assert_eq!(lines_rx.recv().await.unwrap(), ":b!b@t PRIVMSG #x :two");
    assert!(lines_rx.try_recv().is_err());
}

#[tokio::test]
async fn ping_should_short_circuit_to_the_writer_queue() {
    let (writer_tx, mut writer_rx) = mpsc::channel(8);
    let (lines_tx, mut lines_rx) = mpsc::channel(8);

    dispatch_payload("PING :tmi.twitch.tv\r\n", &writer_tx, &lines_tx)
        .await
        .unwrap();

    assert_eq!(writer_rx.recv().await.unwrap(), "PONG :tmi.twitch.tv\r\n");
    assert!(lines_rx.try_recv().is_err());
}

#[test]
fn keepalive_reply_should_echo_the_server_token() {
    assert_eq!(keepalive_reply("PING :irc.example.net"), "PONG :irc.example.net\r\n");
    assert_eq!(keepalive_reply("PING"), "PONG :tmi.twitch.tv\r\n");
    assert_eq!(keepalive_reply("PING :"), "PONG :tmi.twitch.tv\r\n");
}
