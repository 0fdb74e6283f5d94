//! The IRC line classifier.
//!
//! Consumes already-framed lines and classifies each into either a chat
//! event (forwarded to the publisher path) or a membership signal
//! (forwarded to the reconciler). Anything else, including malformed
//! input, is logged at debug and dropped; parsing never fails the
//! pipeline.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::debug;
use tracing::info;

use crate::ChatEvent;
use crate::MembershipEvent;
use crate::MembershipOp;
use crate::Result;


/// Outcome of classifying one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    Chat(ChatEvent),
    Membership(MembershipEvent),
}

/// Classifies a single IRC line.
///
/// `self_login` is the bot's own lowercased account; JOIN/PART frames for
/// any other login carry no membership information and yield `None`.
pub fn classify(
    line: &str,
    self_login: &str,
) -> Option<Classified> {
    let mut rest = line;

    // TAGS
    let mut tags = HashMap::new();
    if let Some(after) = rest.strip_prefix('@') {
        let Some(sp) = after.find(' ') else {
            debug!(reason = "malformed tags", "skip malformed");
            return None;
        };
        tags = parse_tags(&after[..sp]);
        rest = &after[sp + 1..];
    }

    // PREFIX
    let mut prefix = "";
    if let Some(after) = rest.strip_prefix(':') {
        let Some(sp) = after.find(' ') else {
            debug!(reason = "malformed prefix", "skip malformed");
            return None;
        };
        prefix = &after[..sp];
        rest = &after[sp + 1..];
    }

    // COMMAND
    if rest.is_empty() {
        debug!(reason = "missing command", "skip malformed");
        return None;
    }
    let command = match rest.find(' ') {
        Some(sp) => {
            let c = &rest[..sp];
            rest = &rest[sp + 1..];
            c
        }
        None => {
            let c = rest;
            rest = "";
            c
        }
    };

    // PARAMS / TRAILING
    let (params_part, trailing) = match rest.find(" :") {
        Some(k) => (&rest[..k], &rest[k + 2..]),
        None => (rest, ""),
    };
    let params: Vec<&str> = params_part.split_ascii_whitespace().collect();

    match command {
        "PRIVMSG" => {
            if params.is_empty() || trailing.is_empty() {
                debug!(reason = "malformed PRIVMSG", "skip malformed");
                return None;
            }

            // Tags are authoritative for IDs when present.
            let user_id = tags.get("user-id").cloned().unwrap_or_default();
            let channel_id = tags.get("room-id").cloned().unwrap_or_default();

            let user_login = login_from_prefix(prefix).to_ascii_lowercase();
            let lowered = params[0].to_ascii_lowercase();
            let channel_login = lowered.strip_prefix('#').unwrap_or(&lowered).to_string();

            if channel_id.is_empty() && channel_login.is_empty() {
                debug!("drop PRIVMSG: no channel id or login");
                return None;
            }

            // Trailing stays verbatim: it is the message body, not a tag
            // value, so IRCv3 unescaping does not apply.
            Some(Classified::Chat(ChatEvent {
                user_id,
                user_login,
                channel_id,
                channel_login,
                text: trailing.to_string(),
            }))
        }

        "JOIN" | "PART" => {
            if params.is_empty() {
                debug!(reason = "missing channel", "skip malformed");
                return None;
            }

            let login = login_from_prefix(prefix).to_ascii_lowercase();
            if login.is_empty() || login != self_login {
                // Not attributable to the bot itself; no membership signal.
                return None;
            }

            let mut channel = params[0].to_ascii_lowercase();
            if !channel.starts_with('#') {
                channel.insert(0, '#');
            }

            let op = if command == "JOIN" {
                MembershipOp::Join
            } else {
                MembershipOp::Part
            };
            Some(Classified::Membership(MembershipEvent { op, channel }))
        }

        // USERNOTICE, ROOMSTATE, numerics, etc.
        _ => None,
    }
}

/// The login portion of a prefix like `login!login@login.tmi.twitch.tv`.
/// Server-origin prefixes without `!` are returned whole.
fn login_from_prefix(prefix: &str) -> &str {
    match prefix.find('!') {
        Some(idx) => &prefix[..idx],
        None => prefix,
    }
}

/// Parses `;`-separated `key[=value]` tag pairs. A bare key denotes the
/// value `"1"`.
fn parse_tags(tags_str: &str) -> HashMap<String, String> {
    let mut tags = HashMap::with_capacity(16);
    for pair in tags_str.split(';') {
        if pair.is_empty() {
            continue;
        }
        match pair.find('=') {
            Some(eq) => {
                tags.insert(pair[..eq].to_string(), unescape_tag_value(&pair[eq + 1..]));
            }
            None => {
                tags.insert(pair.to_string(), "1".to_string());
            }
        }
    }
    tags
}

/// IRCv3 tag value unescaping: `\s` `\:` `\;` `\\` `\r` `\n`.
///
/// Total over arbitrary input: unknown escapes and a trailing lone
/// backslash are preserved literally.
fn unescape_tag_value(s: &str) -> String {
    if !s.contains('\\') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => out.push(' '),
            Some(':') => out.push(':'),
            Some(';') => out.push(';'),
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            // Trailing lone backslash stays literal.
            None => out.push('\\'),
        }
    }
    out
}

/// Pulls framed lines off the reader channel and fans classified events
/// out to the chat and membership paths.
///
/// Chat events use a backpressured send: losing one is unacceptable.
/// Membership signals use a non-blocking send and are dropped when the
/// buffer is full; the reconciler catches up via tick or a later
/// confirmation.
pub async fn run_classifier(
    mut shutdown: watch::Receiver<()>,
    mut lines_rx: mpsc::Receiver<String>,
    chat_tx: mpsc::Sender<ChatEvent>,
    membership_tx: mpsc::Sender<MembershipEvent>,
    self_login: String,
) -> Result<()> {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                info!("classifier stopping");
                return Ok(());
            }
            maybe_line = lines_rx.recv() => {
                let Some(line) = maybe_line else {
                    info!("reader channel closed");
                    return Ok(());
                };
                match classify(&line, &self_login) {
                    Some(Classified::Chat(evt)) => {
                        if chat_tx.send(evt).await.is_err() {
                            info!("chat channel closed");
                            return Ok(());
                        }
                    }
                    Some(Classified::Membership(evt)) => {
                        if let Err(e) = membership_tx.try_send(evt) {
                            debug!(err = %e, "membership event dropped (full)");
                        }
                    }
                    None => {}
                }
            }
        }
    }
}
