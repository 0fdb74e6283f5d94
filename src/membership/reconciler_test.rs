use std::sync::Arc;
use std::sync::RwLock;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::time::Instant;

use super::reconciler::*;
use super::store::DesiredSnapshot;
use super::store::DesiredView;
use crate::IrcCommand;
use crate::MembershipEvent;
use crate::MembershipOp;
use crate::ReconcilerConfig;

#[derive(Clone)]
struct DesiredStub(Arc<RwLock<DesiredView>>);

impl DesiredStub {
    fn new(
        account: &str,
        channels: &[&str],
    ) -> Self {
        Self(Arc::new(RwLock::new(DesiredView {
            version: 1,
            account: account.to_string(),
            updated_at: Utc::now(),
            channels: channels.iter().map(|c| c.to_string()).collect(),
        })))
    }

    fn set(
        &self,
        version: u64,
        channels: &[&str],
    ) {
        let mut view = self.0.write().unwrap();
        view.version = version;
        view.channels = channels.iter().map(|c| c.to_string()).collect();
    }
}

impl DesiredSnapshot for DesiredStub {
    fn snapshot(&self) -> DesiredView {
        self.0.read().unwrap().clone()
    }
}

fn fast_config() -> ReconcilerConfig {
    ReconcilerConfig {
        tokens_per_second: 100.0,
        burst: 10,
        join_timeout_in_ms: 2_000,
        backoff_min_in_ms: 1_000,
        backoff_max_in_ms: 4_000,
        tick_in_ms: 200,
    }
}

struct Harness {
    reconciler: Reconciler<DesiredStub>,
    desired: DesiredStub,
    out_tx: mpsc::Sender<IrcCommand>,
    out_rx: mpsc::Receiver<IrcCommand>,
    _events_tx: mpsc::Sender<MembershipEvent>,
    _shutdown_tx: watch::Sender<()>,
}

fn harness(
    channels: &[&str],
    cfg: ReconcilerConfig,
    out_capacity: usize,
) -> Harness {
    let desired = DesiredStub::new("me", channels);
    let (_updates_tx, updates_rx) = mpsc::channel(1);
    let (events_tx, events_rx) = mpsc::channel(4);
    let (out_tx, out_rx) = mpsc::channel(out_capacity);
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let reconciler = Reconciler::new(
        desired.clone(),
        updates_rx,
        events_rx,
        out_tx.clone(),
        cfg,
        shutdown_rx,
    );
    Harness {
        reconciler,
        desired,
        out_tx,
        out_rx,
        _events_tx: events_tx,
        _shutdown_tx: shutdown_tx,
    }
}

#[test]
fn join_should_time_out_back_off_and_retry_until_confirmed() {
    let mut h = harness(&["#chess"], fast_config(), 4);
    let r = &mut h.reconciler;
    let start = Instant::now();

    r.observe_desired();
    r.reconcile(start);

    let cmd = h.out_rx.try_recv().expect("expected a JOIN command");
    assert_eq!(cmd.op, MembershipOp::Join);
    assert_eq!(cmd.channel, "#chess");

    // No confirmation within the join timeout: Error with doubled backoff.
    let after_timeout = start + Duration::from_millis(2_001);
    r.reconcile(after_timeout);
    {
        let state = r.state.get("#chess").expect("channel state not created");
        assert_eq!(state.phase, Phase::Error);
        assert_eq!(state.backoff, Duration::from_secs(2));
    }

    // Before next_try_at nothing is emitted.
    r.reconcile(after_timeout + Duration::from_millis(500));
    assert!(h.out_rx.try_recv().is_err());

    // Past next_try_at a second JOIN goes out.
    r.reconcile(after_timeout + Duration::from_millis(1_001));
    let cmd = h.out_rx.try_recv().expect("expected a re-JOIN command");
    assert_eq!(cmd.op, MembershipOp::Join);

    // Confirmation settles the state machine.
    r.observe_event(MembershipEvent {
        op: MembershipOp::Join,
        channel: "#chess".to_string(),
    });
    r.reconcile(after_timeout + Duration::from_millis(1_002));
    let state = r.state.get("#chess").unwrap();
    assert_eq!(state.phase, Phase::Joined);
    assert!(state.have);
}

#[test]
fn backoff_should_cap_at_the_configured_max() {
    let mut h = harness(&["#chess"], fast_config(), 4);
    let r = &mut h.reconciler;
    let mut now = Instant::now();

    r.observe_desired();
    for _ in 0..5 {
        r.reconcile(now);
        while h.out_rx.try_recv().is_ok() {}
        // Expire the outstanding attempt and clear the retry delay.
        now += Duration::from_secs(10);
        r.reconcile(now);
    }

    let state = r.state.get("#chess").unwrap();
    assert_eq!(state.backoff, Duration::from_secs(4));
}

#[test]
fn removed_channel_should_be_parted_and_collected() {
    let mut h = harness(&[], fast_config(), 4);
    let r = &mut h.reconciler;
    let now = Instant::now();

    // Already joined, then dropped from the desired set.
    r.observe_desired();
    r.observe_event(MembershipEvent {
        op: MembershipOp::Join,
        channel: "#chess".to_string(),
    });

    r.reconcile(now);
    let cmd = h.out_rx.try_recv().expect("expected a PART command");
    assert_eq!(cmd.op, MembershipOp::Part);
    assert_eq!(cmd.channel, "#chess");

    r.observe_event(MembershipEvent {
        op: MembershipOp::Part,
        channel: "#chess".to_string(),
    });
    {
        let state = r.state.get("#chess").unwrap();
        assert!(!state.have);
        assert_eq!(state.phase, Phase::Idle);
    }

    // Nothing wants it, nothing holds it: the entry is garbage-collected.
    r.reconcile(now + Duration::from_millis(1));
    assert!(r.state.get("#chess").is_none());
}

#[test]
fn full_outbound_buffer_should_refund_the_token() {
    let mut cfg = fast_config();
    cfg.tokens_per_second = 0.0001;
    cfg.burst = 1;
    let mut h = harness(&["#chess"], cfg, 1);
    let r = &mut h.reconciler;
    let now = Instant::now();

    // Occupy the only outbound slot.
    h.out_tx
        .try_send(IrcCommand {
            op: MembershipOp::Part,
            channel: "#other".to_string(),
        })
        .unwrap();

    r.observe_desired();
    r.reconcile(now);
    // The attempt found the buffer full; state must be untouched.
    assert_eq!(r.state.get("#chess").unwrap().phase, Phase::Idle);

    // Drain the buffer; the refunded token allows an immediate retry even
    // though the refill rate is negligible.
    assert_eq!(h.out_rx.try_recv().unwrap().channel, "#other");
    r.reconcile(now + Duration::from_millis(1));
    assert_eq!(h.out_rx.try_recv().unwrap().channel, "#chess");
}

#[test]
fn emission_should_be_rate_limited_across_channels() {
    let mut cfg = fast_config();
    cfg.tokens_per_second = 0.5;
    cfg.burst = 1;
    let mut h = harness(&["#a", "#b"], cfg, 8);
    let r = &mut h.reconciler;
    let now = Instant::now();

    r.observe_desired();
    r.reconcile(now);
    assert!(h.out_rx.try_recv().is_ok());
    assert!(h.out_rx.try_recv().is_err());

    // One token accrues after two seconds at 0.5 tokens/sec.
    r.reconcile(now + Duration::from_secs(2));
    assert!(h.out_rx.try_recv().is_ok());
    assert!(h.out_rx.try_recv().is_err());
}

#[test]
fn unchanged_desired_version_should_be_a_no_op() {
    let mut h = harness(&["#chess"], fast_config(), 4);
    let r = &mut h.reconciler;

    r.observe_desired();
    assert!(r.state.get("#chess").unwrap().want);

    // Mutating the stub without bumping the version must change nothing.
    h.desired.set(1, &[]);
    r.observe_desired();
    assert!(r.state.get("#chess").unwrap().want);

    h.desired.set(2, &[]);
    r.observe_desired();
    assert!(!r.state.get("#chess").unwrap().want);
}

#[test]
fn duplicate_confirmations_should_not_regress_state() {
    let mut h = harness(&["#chess"], fast_config(), 4);
    let r = &mut h.reconciler;

    r.observe_desired();
    for _ in 0..2 {
        r.observe_event(MembershipEvent {
            op: MembershipOp::Join,
            channel: "#chess".to_string(),
        });
    }
    let state = r.state.get("#chess").unwrap();
    assert!(state.have);
    assert_eq!(state.phase, Phase::Joined);
}

#[test]
fn spurious_part_should_not_emit_or_linger() {
    let mut h = harness(&[], fast_config(), 4);
    let r = &mut h.reconciler;

    r.observe_event(MembershipEvent {
        op: MembershipOp::Part,
        channel: "#ghost".to_string(),
    });
    r.reconcile(Instant::now());

    assert!(h.out_rx.try_recv().is_err());
    assert!(r.state.get("#ghost").is_none());
}

#[tokio::test(start_paused = true)]
async fn run_loop_should_converge_on_confirmations() {
    let desired = DesiredStub::new("me", &["#chess"]);
    let (_updates_tx, updates_rx) = mpsc::channel(1);
    let (events_tx, events_rx) = mpsc::channel(4);
    let (out_tx, mut out_rx) = mpsc::channel(8);
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let mut reconciler = Reconciler::new(
        desired,
        updates_rx,
        events_rx,
        out_tx,
        fast_config(),
        shutdown_rx,
    );
    let task = tokio::spawn(async move { reconciler.run().await });

    let cmd = out_rx.recv().await.expect("reconciler should emit a JOIN");
    assert_eq!(cmd.op, MembershipOp::Join);
    assert_eq!(cmd.channel, "#chess");

    events_tx
        .send(MembershipEvent {
            op: MembershipOp::Join,
            channel: "#chess".to_string(),
        })
        .await
        .unwrap();

    // Once confirmed, further ticks stay quiet.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(out_rx.try_recv().is_err());

    shutdown_tx.send(()).unwrap();
    task.await.unwrap().unwrap();
    drop(events_tx);
}
