//! The desired-set store: single writer of the persisted channel list.
//!
//! Owns the authoritative desired set. Intents arrive on a channel from
//! the HTTP surface, mutate an in-memory working copy, and are flushed to
//! disk behind a debounce window via atomic replace. Every persisted
//! change bumps the version and fires a coalesced notification; consumers
//! must re-snapshot on every signal.

use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::RwLock;

use chrono::DateTime;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::time::sleep_until;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;

use crate::constants::CHANNELS_SCHEMA;
use crate::normalize_channel;
use crate::utils::write_atomic;
use crate::ChannelsFile;
use crate::IrcCommand;
use crate::MembershipOp;
use crate::Result;
use crate::RosterConfig;
use crate::StorageError;

/// An immutable copy of the desired set at one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredView {
    pub version: u64,
    pub account: String,
    pub updated_at: DateTime<Utc>,
    pub channels: Vec<String>,
}

/// Read access to the desired set. The reconciler depends on this seam
/// rather than on the store itself so tests can substitute a stub.
pub trait DesiredSnapshot: Send + Sync + 'static {
    fn snapshot(&self) -> DesiredView;
}

/// Cloneable read handle; copies the snapshot out under the read lock.
#[derive(Clone)]
pub struct RosterHandle {
    shared: Arc<RwLock<DesiredView>>,
}

impl DesiredSnapshot for RosterHandle {
    fn snapshot(&self) -> DesiredView {
        self.shared
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

pub struct RosterStore {
    path: PathBuf,
    account: String,
    debounce: std::time::Duration,
    control_rx: mpsc::Receiver<IrcCommand>,
    updates_tx: mpsc::Sender<()>,
    updates_rx: Option<mpsc::Receiver<()>>,
    shared: Arc<RwLock<DesiredView>>,
    shutdown: watch::Receiver<()>,
}

impl RosterStore {
    /// Loads the persisted desired set, or bootstraps an empty one when the
    /// file does not exist yet. A file carrying another account's channels
    /// is a startup error.
    pub fn open(
        path: impl Into<PathBuf>,
        account: &str,
        cfg: &RosterConfig,
        control_rx: mpsc::Receiver<IrcCommand>,
        shutdown: watch::Receiver<()>,
    ) -> Result<Self> {
        let path = path.into();

        let on_disk = load_file(&path)?;
        let channels = match &on_disk {
            Some(file) => {
                if !file.account.is_empty() && file.account != account {
                    return Err(StorageError::AccountMismatch {
                        found: file.account.clone(),
                        expected: account.to_string(),
                    }
                    .into());
                }
                debug!(channels = file.channels.len(), "loaded channels file");
                canonical_set(&file.channels)
            }
            None => {
                debug!("no existing channels file; will initialize");
                BTreeSet::new()
            }
        };

        let snap = DesiredView {
            version: 1,
            account: account.to_string(),
            updated_at: Utc::now(),
            channels: channels.iter().cloned().collect(),
        };

        if on_disk.is_none() {
            persist(&path, &snap)?;
            info!(channels = snap.channels.len(), "initialized channels file");
        }

        let (updates_tx, updates_rx) = mpsc::channel(1);
        info!(
            version = snap.version,
            channels = snap.channels.len(),
            path = %path.display(),
            "roster store ready"
        );
        Ok(Self {
            path,
            account: account.to_string(),
            debounce: cfg.write_debounce(),
            control_rx,
            updates_tx,
            updates_rx: Some(updates_rx),
            shared: Arc::new(RwLock::new(snap)),
            shutdown,
        })
    }

    pub fn handle(&self) -> RosterHandle {
        RosterHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// The coalesced change-notification stream. Capacity 1; a dropped
    /// signal is harmless because consumers re-snapshot on every wakeup.
    /// May be taken once.
    pub fn updates(&mut self) -> mpsc::Receiver<()> {
        self.updates_rx
            .take()
            .expect("roster updates stream already taken")
    }

    pub async fn run(mut self) -> Result<()> {
        let initial = self.handle().snapshot();
        let mut desired: BTreeSet<String> = initial.channels.into_iter().collect();
        let mut version = initial.version;

        let mut dirty = false;
        let mut flush_at: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.changed() => {
                    info!(version, channels = desired.len(), "roster store stopping");
                    return Ok(());
                }

                maybe_cmd = self.control_rx.recv() => {
                    let Some(cmd) = maybe_cmd else {
                        info!("intent channel closed");
                        return Ok(());
                    };
                    let Some(channel) = normalize_channel(&cmd.channel) else {
                        debug!(op = %cmd.op, raw = %cmd.channel, "dropping invalid intent");
                        continue;
                    };
                    let changed = match cmd.op {
                        MembershipOp::Join => desired.insert(channel.clone()),
                        MembershipOp::Part => desired.remove(&channel),
                    };
                    if changed {
                        info!(op = %cmd.op, channel = %channel, "desired set edit");
                        dirty = true;
                        if flush_at.is_none() {
                            flush_at = Some(Instant::now() + self.debounce);
                        }
                    }
                }

                _ = maybe_sleep(flush_at), if flush_at.is_some() => {
                    if dirty {
                        version += 1;
                        let snap = DesiredView {
                            version,
                            account: self.account.clone(),
                            updated_at: Utc::now(),
                            channels: desired.iter().cloned().collect(),
                        };
                        persist(&self.path, &snap)?;
                        info!(version, channels = snap.channels.len(), "persisted snapshot");
                        {
                            let mut guard = self
                                .shared
                                .write()
                                .unwrap_or_else(|poisoned| poisoned.into_inner());
                            *guard = snap;
                        }
                        // Coalesced: a still-pending signal already covers
                        // this change.
                        let _ = self.updates_tx.try_send(());
                    }
                    dirty = false;
                    flush_at = None;
                }
            }
        }
    }
}

async fn maybe_sleep(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn canonical_set(raw: &[String]) -> BTreeSet<String> {
    raw.iter()
        .filter_map(|ch| normalize_channel(ch))
        .collect()
}

fn load_file(path: &Path) -> Result<Option<ChannelsFile>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StorageError::PathError {
                path: path.to_path_buf(),
                source,
            }
            .into())
        }
    };
    let file: ChannelsFile =
        serde_json::from_slice(&bytes).map_err(StorageError::Serialization)?;
    Ok(Some(file))
}

fn persist(
    path: &Path,
    snap: &DesiredView,
) -> Result<()> {
    let on_disk = ChannelsFile {
        schema: CHANNELS_SCHEMA,
        account: snap.account.clone(),
        updated_at: snap.updated_at,
        channels: snap.channels.clone(),
    };
    let bytes = serde_json::to_vec_pretty(&on_disk).map_err(StorageError::Serialization)?;
    write_atomic(path, &bytes)?;
    Ok(())
}
