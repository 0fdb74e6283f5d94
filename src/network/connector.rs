use futures::SinkExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::debug;

use super::WsStream;
use crate::Result;
use crate::TransportError;

const CAP_REQ: &str = "CAP REQ :twitch.tv/tags twitch.tv/commands twitch.tv/membership";

/// Dials the IRC-over-WebSocket endpoint and performs the startup
/// sequence: PASS, NICK, then the capability request. Any failure here is
/// fatal; the caller exits before spawning the pipeline.
pub async fn connect(
    uri: &str,
    token: &str,
    account: &str,
) -> Result<WsStream> {
    let (mut socket, _response) = connect_async(uri)
        .await
        .map_err(TransportError::Dial)?;
    debug!(uri = %uri, "websocket dialed");

    for line in [
        format!("PASS oauth:{token}\r\n"),
        format!("NICK {account}\r\n"),
        format!("{CAP_REQ}\r\n"),
    ] {
        socket
            .send(Message::Text(line))
            .await
            .map_err(TransportError::Write)?;
    }
    debug!(account = %account, "authenticated and requested capabilities");

    Ok(socket)
}
