/// Schema version written into the persisted channels file.
pub const CHANNELS_SCHEMA: u32 = 1;

// -
// Inter-stage buffer capacities.
//
// The chat path uses large buffers: losing a chat event is unacceptable
// except under extreme overload. Control-plane buffers are small; the
// reconciler catches up on the next tick when one fills.

pub(crate) const READER_BUFFER: usize = 1000;
pub(crate) const CHAT_BUFFER: usize = 1000;

pub(crate) const CONTROL_BUFFER: usize = 100;
pub(crate) const COMMAND_BUFFER: usize = 100;
pub(crate) const MEMBERSHIP_BUFFER: usize = 100;
pub(crate) const WRITER_BUFFER: usize = 100;

/// Fallback keepalive origin when a PING carries no server token.
pub(crate) const DEFAULT_PING_ORIGIN: &str = "tmi.twitch.tv";
