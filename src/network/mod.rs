//! Socket ownership and the wire plumbing around it.
//!
//! The WebSocket is owned exclusively: the reader task holds the stream
//! half, the writer task holds the sink half. Everything outbound funnels
//! through the writer's queue, which preserves enqueue order.
mod connector;
mod reader;
mod scheduler;
mod writer;

pub use connector::connect;
pub use reader::run_reader;
pub use scheduler::run_scheduler;
pub use writer::run_writer;

use futures::stream::SplitSink;
use futures::stream::SplitStream;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::MaybeTlsStream;
use tokio_tungstenite::WebSocketStream;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type WsSink = SplitSink<WsStream, Message>;
pub type WsSource = SplitStream<WsStream>;

#[cfg(test)]
mod reader_test;
#[cfg(test)]
mod scheduler_test;
