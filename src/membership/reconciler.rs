//! The channel reconciler.
//!
//! Drives every channel's `(want, have)` pair toward equality by emitting
//! JOIN/PART commands, with rate limiting, per-operation timeouts, and
//! bounded exponential backoff. All state lives in one map owned by a
//! single-threaded loop: given a clock and an event trace the whole
//! control plane is deterministic, and no cross-channel locking exists.
//!
//! `have` is server truth, `phase` is our outstanding-action truth; their
//! divergence carries the retry intent.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::time::interval;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::bucket::TokenBucket;
use super::store::DesiredSnapshot;
use crate::IrcCommand;
use crate::MembershipEvent;
use crate::MembershipOp;
use crate::ReconcilerConfig;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Idle,
    Joining,
    Joined,
    Parting,
    Error,
}

#[derive(Debug)]
pub(crate) struct ChannelState {
    pub(crate) want: bool,
    pub(crate) have: bool,
    pub(crate) phase: Phase,
    pub(crate) last_try: Instant,
    pub(crate) deadline: Instant,
    pub(crate) next_try_at: Instant,
    pub(crate) backoff: Duration,
}

pub struct Reconciler<D: DesiredSnapshot> {
    desired: D,
    updates: mpsc::Receiver<()>,
    events: mpsc::Receiver<MembershipEvent>,
    out: mpsc::Sender<IrcCommand>,
    cfg: ReconcilerConfig,
    pub(crate) state: HashMap<String, ChannelState>,
    bucket: TokenBucket,
    last_desired_version: u64,
    shutdown: watch::Receiver<()>,
}

impl<D: DesiredSnapshot> Reconciler<D> {
    pub fn new(
        desired: D,
        updates: mpsc::Receiver<()>,
        events: mpsc::Receiver<MembershipEvent>,
        out: mpsc::Sender<IrcCommand>,
        cfg: ReconcilerConfig,
        shutdown: watch::Receiver<()>,
    ) -> Self {
        let bucket = TokenBucket::new(cfg.tokens_per_second, cfg.burst, Instant::now());
        Self {
            desired,
            updates,
            events,
            out,
            cfg,
            state: HashMap::new(),
            bucket,
            last_desired_version: 0,
            shutdown,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let account = self.desired.snapshot().account;
        info!(
            account = %account,
            tokens_per_sec = self.cfg.tokens_per_second,
            burst = self.cfg.burst,
            join_timeout_ms = self.cfg.join_timeout_in_ms,
            "reconciler starting"
        );

        let mut tick = interval(self.cfg.tick());
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.changed() => {
                    info!("reconciler stopping");
                    return Ok(());
                }

                _ = tick.tick() => {
                    self.observe_desired();
                    self.reconcile(Instant::now());
                }

                Some(()) = self.updates.recv() => {
                    debug!("desired snapshot updated");
                    self.observe_desired();
                    self.reconcile(Instant::now());
                }

                Some(evt) = self.events.recv() => {
                    debug!(op = %evt.op, channel = %evt.channel, "membership event");
                    self.observe_event(evt);
                    self.reconcile(Instant::now());
                }
            }
        }
    }

    /// Re-reads the desired snapshot and refreshes every `want` flag.
    /// Entries for channels no longer desired become `want = false` and
    /// will be PARTed by the next reconcile pass.
    pub(crate) fn observe_desired(&mut self) {
        let view = self.desired.snapshot();
        if view.version == self.last_desired_version {
            return;
        }
        info!(version = view.version, channels = view.channels.len(), "desired set changed");
        for state in self.state.values_mut() {
            state.want = false;
        }
        for channel in &view.channels {
            self.ensure(channel.clone()).want = true;
        }
        self.last_desired_version = view.version;
    }

    /// Applies a membership confirmation. A confirmation always resets the
    /// phase and implicitly signals success of an outstanding action.
    pub(crate) fn observe_event(
        &mut self,
        evt: MembershipEvent,
    ) {
        let Some(channel) = crate::normalize_channel(&evt.channel) else {
            return;
        };
        let state = self.ensure(channel.clone());
        match evt.op {
            MembershipOp::Join => {
                if !state.have {
                    state.have = true;
                    state.phase = Phase::Joined;
                    info!(channel = %channel, "join confirmed");
                }
            }
            MembershipOp::Part => {
                if state.have {
                    state.have = false;
                    state.phase = Phase::Idle;
                    info!(channel = %channel, "part confirmed");
                }
            }
        }
    }

    /// Two passes over the state map: shed surplus channels first, then
    /// fill the deficit, each gated by the token bucket.
    pub(crate) fn reconcile(
        &mut self,
        now: Instant,
    ) {
        // Pass 1: channels we no longer want.
        for (name, state) in self.state.iter_mut() {
            if state.want {
                continue;
            }
            if state.have
                && (matches!(state.phase, Phase::Idle | Phase::Joined)
                    || (state.phase == Phase::Error && now > state.next_try_at))
            {
                debug!(channel = %name, phase = ?state.phase, "trying PART");
                if try_send(&mut self.bucket, &self.out, &self.cfg, now, MembershipOp::Part, name, state) {
                    continue;
                }
            }
            maybe_timeout(&self.cfg, now, state);
        }

        // Pass 2: channels we want but do not have.
        for (name, state) in self.state.iter_mut() {
            if !state.want {
                continue;
            }
            if !state.have
                && (state.phase == Phase::Idle
                    || (state.phase == Phase::Error && now > state.next_try_at))
            {
                debug!(channel = %name, phase = ?state.phase, "trying JOIN");
                if try_send(&mut self.bucket, &self.out, &self.cfg, now, MembershipOp::Join, name, state) {
                    continue;
                }
            }
            maybe_timeout(&self.cfg, now, state);
        }

        // A parted channel nobody wants carries no retry intent; drop it.
        self.state
            .retain(|_, s| s.want || s.have || s.phase != Phase::Idle);
    }

    fn ensure(
        &mut self,
        channel: String,
    ) -> &mut ChannelState {
        let backoff_min = self.cfg.backoff_min();
        self.state.entry(channel).or_insert_with(|| {
            let now = Instant::now();
            ChannelState {
                want: false,
                have: false,
                phase: Phase::Idle,
                last_try: now,
                deadline: now,
                next_try_at: now,
                backoff: backoff_min,
            }
        })
    }
}

/// Reserves a token and attempts a non-blocking enqueue. A full outbound
/// buffer refunds the token and leaves the state untouched; the next tick
/// retries.
fn try_send(
    bucket: &mut TokenBucket,
    out: &mpsc::Sender<IrcCommand>,
    cfg: &ReconcilerConfig,
    now: Instant,
    op: MembershipOp,
    channel: &str,
    state: &mut ChannelState,
) -> bool {
    if !bucket.take(now) {
        debug!(op = %op, channel = %channel, "rate-limited; skipping for now");
        return false;
    }

    let cmd = IrcCommand {
        op,
        channel: channel.to_string(),
    };
    match out.try_send(cmd) {
        Ok(()) => {
            state.last_try = now;
            state.deadline = now + cfg.join_timeout();
            state.phase = match op {
                MembershipOp::Join => Phase::Joining,
                MembershipOp::Part => Phase::Parting,
            };
            if state.backoff.is_zero() {
                state.backoff = cfg.backoff_min();
            }
            info!(op = %op, channel = %channel, timeout_ms = cfg.join_timeout_in_ms, "command emitted");
            true
        }
        Err(_) => {
            bucket.refund(now);
            warn!(op = %op, channel = %channel, "outbound buffer full; command not emitted");
            false
        }
    }
}

/// Expires an outstanding JOIN/PART whose deadline passed: park the
/// channel in `Error` until `next_try_at`, doubling the backoff up to the
/// configured cap.
fn maybe_timeout(
    cfg: &ReconcilerConfig,
    now: Instant,
    state: &mut ChannelState,
) {
    if matches!(state.phase, Phase::Joining | Phase::Parting) && now > state.deadline {
        info!(
            phase = ?state.phase,
            next_try_in_ms = state.backoff.as_millis() as u64,
            "operation timed out; scheduling retry"
        );
        state.phase = Phase::Error;
        state.next_try_at = now + state.backoff;
        state.backoff = (state.backoff * 2).min(cfg.backoff_max());
    }
}
