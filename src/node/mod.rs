//! Collector assembly and task supervision.
//!
//! ## Key Responsibilities
//! - Owns the channel plumbing between pipeline stages
//! - Spawns every stage under one shared shutdown scope
//! - Propagates the first failure and drains all peers before exit

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::error;
use tracing::info;

use crate::api::run_http_api;
use crate::bus::run_publisher;
use crate::bus::KafkaSink;
use crate::classifier::run_classifier;
use crate::config::Account;
use crate::config::IngestConfig;
use crate::config::Token;
use crate::constants::CHAT_BUFFER;
use crate::constants::COMMAND_BUFFER;
use crate::constants::CONTROL_BUFFER;
use crate::constants::MEMBERSHIP_BUFFER;
use crate::constants::READER_BUFFER;
use crate::constants::WRITER_BUFFER;
use crate::membership::Reconciler;
use crate::membership::RosterStore;
use crate::network;
use crate::network::run_reader;
use crate::network::run_scheduler;
use crate::network::run_writer;
use crate::Result;

pub struct IngestNode {
    settings: Arc<IngestConfig>,
    account: Account,
    token: Token,
    shutdown_tx: watch::Sender<()>,
    shutdown_rx: watch::Receiver<()>,
}

impl IngestNode {
    pub fn new(
        settings: IngestConfig,
        account: Account,
        token: Token,
        shutdown_tx: watch::Sender<()>,
        shutdown_rx: watch::Receiver<()>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            account,
            token,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Connects upstream, wires the pipeline, and runs it to completion.
    ///
    /// Every stage runs until the shared shutdown signal fires. The first
    /// stage to fail (or exit unexpectedly) triggers that signal; the
    /// remaining stages are awaited before the error is returned.
    pub async fn run(self) -> Result<()> {
        let login = self.account.login();
        info!(account = %login, uri = %self.settings.twitch_irc_uri, "starting");

        // Fail fast on the upstream dial before any stage spawns.
        let socket = network::connect(
            &self.settings.twitch_irc_uri,
            &self.token.access_token,
            &login,
        )
        .await?;
        info!("connected");
        let (ws_sink, ws_source) = socket.split();

        // Inter-stage plumbing. Chat-path buffers are large; control-plane
        // buffers are small.
        let (control_tx, control_rx) = mpsc::channel(CONTROL_BUFFER);
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (membership_tx, membership_rx) = mpsc::channel(MEMBERSHIP_BUFFER);
        let (writer_tx, writer_rx) = mpsc::channel(WRITER_BUFFER);
        let (lines_tx, lines_rx) = mpsc::channel(READER_BUFFER);
        let (chat_tx, chat_rx) = mpsc::channel(CHAT_BUFFER);

        let mut store = RosterStore::open(
            &self.settings.channels_path,
            &login,
            &self.settings.roster,
            control_rx,
            self.shutdown_rx.clone(),
        )?;
        let roster = store.handle();
        let updates = store.updates();

        let sink = KafkaSink::new(&self.settings.kafka_brokers, &self.settings.kafka_topic)?;

        let mut reconciler = Reconciler::new(
            roster,
            updates,
            membership_rx,
            commands_tx,
            self.settings.reconciler.clone(),
            self.shutdown_rx.clone(),
        );

        let mut tasks: JoinSet<Result<()>> = JoinSet::new();
        tasks.spawn(store.run());
        tasks.spawn(run_http_api(
            self.shutdown_rx.clone(),
            self.settings.http_api_host.clone(),
            self.settings.http_api_port,
            control_tx,
        ));
        tasks.spawn(async move { reconciler.run().await });
        tasks.spawn(run_scheduler(
            self.shutdown_rx.clone(),
            commands_rx,
            writer_tx.clone(),
        ));
        tasks.spawn(run_reader(
            self.shutdown_rx.clone(),
            ws_source,
            writer_tx,
            lines_tx,
        ));
        tasks.spawn(run_writer(self.shutdown_rx.clone(), ws_sink, writer_rx));
        tasks.spawn(run_classifier(
            self.shutdown_rx.clone(),
            lines_rx,
            chat_tx,
            membership_tx,
            login,
        ));
        tasks.spawn(run_publisher(self.shutdown_rx.clone(), chat_rx, sink));

        let mut first_err: Option<crate::Error> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(err = %e, "pipeline stage failed");
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
                Err(join_err) => {
                    error!(err = %join_err, "pipeline stage panicked");
                    if first_err.is_none() {
                        first_err = Some(join_err.into());
                    }
                }
            }
            // Any stage ending, cleanly or not, ends the pipeline.
            let _ = self.shutdown_tx.send(());
        }

        match first_err {
            Some(e) => Err(e),
            None => {
                info!("shutdown complete");
                Ok(())
            }
        }
    }
}
