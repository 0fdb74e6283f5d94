//! Shared event and record types flowing between pipeline stages.

use std::fmt;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// JOIN or PART, shared between command intents and membership signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MembershipOp {
    Join,
    Part,
}

impl fmt::Display for MembershipOp {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            MembershipOp::Join => write!(f, "JOIN"),
            MembershipOp::Part => write!(f, "PART"),
        }
    }
}

/// A requested JOIN or PART, not yet sent on the wire.
///
/// Produced by the HTTP surface and by the reconciler; consumed by the
/// desired-set store and the writer path respectively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcCommand {
    pub op: MembershipOp,
    pub channel: String,
}

/// A JOIN/PART frame the server addressed to the bot's own account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipEvent {
    pub op: MembershipOp,
    pub channel: String,
}

/// A parsed PRIVMSG.
///
/// The ID fields come from IRCv3 tags and may be empty when the server
/// omitted them; logins are the mutable fallback identities derived from
/// the prefix and the channel parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub user_id: String,
    pub user_login: String,
    pub channel_id: String,
    pub channel_login: String,
    pub text: String,
}

impl ChatEvent {
    pub fn kind(&self) -> &'static str {
        "privmsg"
    }

    /// Bus partitioning key.
    pub fn key(&self) -> &str {
        &self.channel_id
    }
}

/// On-disk shape of the persisted desired set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsFile {
    pub schema: u32,
    pub account: String,
    pub updated_at: DateTime<Utc>,
    pub channels: Vec<String>,
}

/// Canonicalizes a channel name: surrounding whitespace stripped, ASCII
/// lowercased, leading `#` enforced. Returns `None` when nothing remains.
///
/// Idempotent: feeding the result back yields the same string.
pub fn normalize_channel(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_ascii_lowercase();
    if lowered.starts_with('#') {
        Some(lowered)
    } else {
        Some(format!("#{lowered}"))
    }
}
