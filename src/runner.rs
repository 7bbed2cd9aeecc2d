//! Background driver for the [`SyncEngine`].
//!
//! The engine is owned by a single task. Everything else talks to it through a
//! [`SyncHandle`], so all mutations are serialized by the command channel. The
//! task ticks at the configured poll interval, keeps at most one oracle call in
//! flight for the current zone, and publishes every [`SyncEvent`] on a
//! broadcast channel.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::SyncConfig;
use crate::model::ObjectModel;
use crate::oracle::{HazardOracle, OracleError, OracleResponse};
use crate::scene::{SceneFrame, ZoneDetails};
use crate::sync::{query_with_timeout, PollTicket, SyncEngine, SyncEvent};

const COMMAND_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RunnerError {
    #[error("sync runner has stopped")]
    Stopped,
}

/// Commands accepted by the sync task.
#[derive(Debug)]
pub enum SyncCommand {
    SetCurrentZone(Option<String>),
    Load(ObjectModel),
    /// Poll now instead of waiting for the next tick.
    PollNow,
    Frame(oneshot::Sender<SceneFrame>),
    ZoneDetails(String, oneshot::Sender<Option<ZoneDetails>>),
    Shutdown,
}

type PendingPoll = BoxFuture<'static, (PollTicket, Result<OracleResponse, OracleError>)>;

/// Cloneable handle to a running sync task.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    command_tx: mpsc::Sender<SyncCommand>,
    event_tx: broadcast::Sender<SyncEvent>,
}

impl SyncHandle {
    async fn send(&self, command: SyncCommand) -> Result<(), RunnerError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| RunnerError::Stopped)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_tx.subscribe()
    }

    pub async fn set_current_zone(&self, zone: Option<String>) -> Result<(), RunnerError> {
        self.send(SyncCommand::SetCurrentZone(zone)).await
    }

    pub async fn load(&self, model: ObjectModel) -> Result<(), RunnerError> {
        self.send(SyncCommand::Load(model)).await
    }

    pub async fn poll_now(&self) -> Result<(), RunnerError> {
        self.send(SyncCommand::PollNow).await
    }

    pub async fn frame(&self) -> Result<SceneFrame, RunnerError> {
        let (tx, rx) = oneshot::channel();
        self.send(SyncCommand::Frame(tx)).await?;
        rx.await.map_err(|_| RunnerError::Stopped)
    }

    pub async fn zone_details(
        &self,
        zone: impl Into<String>,
    ) -> Result<Option<ZoneDetails>, RunnerError> {
        let (tx, rx) = oneshot::channel();
        self.send(SyncCommand::ZoneDetails(zone.into(), tx)).await?;
        rx.await.map_err(|_| RunnerError::Stopped)
    }

    pub async fn shutdown(&self) -> Result<(), RunnerError> {
        self.send(SyncCommand::Shutdown).await
    }
}

/// Spawns the sync task on the current tokio runtime.
pub fn spawn(
    engine: SyncEngine,
    oracle: Arc<dyn HazardOracle>,
    config: &SyncConfig,
) -> (SyncHandle, JoinHandle<()>) {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let handle = SyncHandle {
        command_tx,
        event_tx: event_tx.clone(),
    };
    let poll_interval = config.poll_interval();
    let oracle_timeout = config.oracle_timeout();

    let join_handle = tokio::spawn(run_sync_loop(
        engine,
        oracle,
        command_rx,
        event_tx,
        poll_interval,
        oracle_timeout,
    ));

    (handle, join_handle)
}

fn issue_poll(
    engine: &mut SyncEngine,
    oracle: &Arc<dyn HazardOracle>,
    pending: &mut FuturesUnordered<PendingPoll>,
    timeout: Duration,
) {
    let Some(ticket) = engine.begin_poll() else {
        return;
    };
    debug!(zone = %ticket.zone(), "issuing oracle poll");

    let oracle = Arc::clone(oracle);
    pending.push(
        async move {
            let result = query_with_timeout(oracle.as_ref(), ticket.zone(), timeout).await;
            (ticket, result)
        }
        .boxed(),
    );
}

async fn run_sync_loop(
    mut engine: SyncEngine,
    oracle: Arc<dyn HazardOracle>,
    mut command_rx: mpsc::Receiver<SyncCommand>,
    event_tx: broadcast::Sender<SyncEvent>,
    poll_interval: Duration,
    oracle_timeout: Duration,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut pending: FuturesUnordered<PendingPoll> = FuturesUnordered::new();

    info!(interval_ms = poll_interval.as_millis() as u64, "sync runner started");

    loop {
        tokio::select! {
            command = command_rx.recv() => {
                let Some(command) = command else {
                    debug!("all sync handles dropped");
                    break;
                };
                match command {
                    SyncCommand::Shutdown => {
                        debug!("received shutdown command");
                        break;
                    }
                    SyncCommand::SetCurrentZone(zone) => engine.set_current_zone(zone),
                    SyncCommand::Load(model) => engine.load(model),
                    SyncCommand::PollNow => {
                        issue_poll(&mut engine, &oracle, &mut pending, oracle_timeout);
                    }
                    SyncCommand::Frame(tx) => {
                        let _ = tx.send(SceneFrame::of_engine(&engine));
                    }
                    SyncCommand::ZoneDetails(zone, tx) => {
                        let _ = tx.send(ZoneDetails::of(engine.model(), &zone));
                    }
                }
            }

            _ = ticker.tick() => {
                issue_poll(&mut engine, &oracle, &mut pending, oracle_timeout);
            }

            Some((ticket, result)) = pending.next(), if !pending.is_empty() => {
                for event in engine.complete_poll(ticket, result) {
                    // No subscribers is fine.
                    let _ = event_tx.send(event);
                }
            }
        }
    }

    info!(abandoned_polls = pending.len(), "sync runner stopped");
}
