use crate::error::Result as FeedResult;
use crate::github::RepositorySource;
use crate::live_server::{LiveServer, Subscription};
use crate::models::{FeedStats, Generation, RefreshOutcome, RepositoryRow, RepositorySummary};
use crate::presenter::{Presenter, RowUpdate};
use crate::store::StarStore;
use crate::subscriptions::{Installed, SubscriptionManager};
use chrono::{DateTime, Utc};
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort, SpawnErr};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Owns the directory, the live values and the subscription set.
///
/// This actor is the only place where that state changes. The REST fetch,
/// subscription acknowledgements and pushes all run elsewhere and come back
/// here as messages.
pub struct RefreshCoordinator;

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Maximum number of subscriptions being opened at once
    pub subscribe_concurrency: usize,
    /// Periodic refresh; a zero period disables it
    pub refresh_interval: Option<Duration>,
    pub refresh_on_start: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            subscribe_concurrency: 8,
            refresh_interval: None,
            refresh_on_start: true,
        }
    }
}

/// Arguments for starting the coordinator
pub struct RefreshCoordinatorArgs {
    pub organisation: String,
    pub source: Arc<dyn RepositorySource>,
    pub live_server: Arc<dyn LiveServer>,
    pub presenter: Arc<dyn Presenter>,
    pub config: CoordinatorConfig,
}

pub struct RefreshCoordinatorState {
    organisation: String,
    source: Arc<dyn RepositorySource>,
    presenter: Arc<dyn Presenter>,
    store: StarStore,
    subscriptions: SubscriptionManager,
    next_refresh_id: u64,
    in_flight: BTreeSet<u64>,
    refreshes_started: u64,
    refreshes_succeeded: u64,
    refreshes_failed: u64,
    last_refreshed_at: Option<DateTime<Utc>>,
    last_refresh_error: Option<String>,
    refresh_on_start: bool,
    ticker: Option<JoinHandle<()>>,
}

/// Messages the coordinator can handle
#[derive(Debug)]
pub enum CoordinatorMessage {
    /// Fetch the directory again and rebuild the subscriptions
    Refresh,
    FetchCompleted {
        refresh_id: u64,
        result: FeedResult<Vec<RepositorySummary>>,
    },
    SubscriptionOpened {
        generation: Generation,
        repository_id: u64,
        result: FeedResult<Box<dyn Subscription>>,
    },
    Push {
        generation: Generation,
        repository_id: u64,
        stars: u32,
    },
    /// Cancel every subscription and drop the live values
    CancelAll,
    CurrentStarCount(u64, RpcReplyPort<FeedResult<u32>>),
    Snapshot(RpcReplyPort<Vec<RepositoryRow>>),
    ActiveSubscriptions(RpcReplyPort<Vec<u64>>),
    GetStats(RpcReplyPort<FeedStats>),
    Shutdown,
}

impl RefreshCoordinator {
    /// Spawn the coordinator; it fetches the directory right away unless
    /// `refresh_on_start` is off
    pub async fn start(
        args: RefreshCoordinatorArgs,
    ) -> Result<(ActorRef<CoordinatorMessage>, JoinHandle<()>), SpawnErr> {
        let organisation = args.organisation.clone();
        let (actor_ref, handle) = Actor::spawn(None, RefreshCoordinator, args).await?;

        info!(%organisation, "Refresh coordinator started");
        Ok((actor_ref, handle))
    }
}

impl RefreshCoordinatorState {
    fn start_refresh(&mut self, myself: &ActorRef<CoordinatorMessage>) {
        let refresh_id = self.next_refresh_id;
        self.next_refresh_id += 1;
        self.in_flight.insert(refresh_id);
        self.refreshes_started += 1;

        info!(refresh_id, organisation = %self.organisation, in_flight = self.in_flight.len(), "Refreshing repositories");

        let source = self.source.clone();
        let organisation = self.organisation.clone();
        let feed = myself.clone();
        tokio::spawn(async move {
            let result = source.fetch_repositories(&organisation).await;
            if feed
                .send_message(CoordinatorMessage::FetchCompleted { refresh_id, result })
                .is_err()
            {
                debug!(refresh_id, "Coordinator stopped before the fetch completed");
            }
        });
    }

    fn finish_refresh(
        &mut self,
        myself: &ActorRef<CoordinatorMessage>,
        refresh_id: u64,
        result: FeedResult<Vec<RepositorySummary>>,
    ) {
        if !self.in_flight.remove(&refresh_id) {
            debug!(refresh_id, "Ignoring completion of unknown refresh");
            return;
        }

        let outcome = match result {
            Ok(repositories) => {
                self.install_directory(myself, repositories);
                self.refreshes_succeeded += 1;
                self.last_refreshed_at = Some(Utc::now());
                self.last_refresh_error = None;
                RefreshOutcome::Succeeded
            }
            Err(e) => {
                warn!(refresh_id, error = %e, "Repository fetch failed, keeping previous directory");
                self.refreshes_failed += 1;
                self.last_refresh_error = Some(e.to_string());
                RefreshOutcome::Failed
            }
        };

        self.presenter.on_refresh_finished(outcome);
    }

    /// Tear down the old subscription set, swap the directory, then subscribe
    /// the new one. Subscriptions are only opened once the presenter has seen
    /// the new directory.
    fn install_directory(&mut self, myself: &ActorRef<CoordinatorMessage>, repositories: Vec<RepositorySummary>) {
        self.teardown();
        self.store.replace_directory(repositories);
        info!(
            generation = %self.subscriptions.generation(),
            repositories = self.store.directory().len(),
            "Directory replaced"
        );
        self.presenter.on_directory_replaced(&self.store);

        let repositories = self.store.directory().iter().cloned().collect();
        self.subscriptions.subscribe_all(myself, repositories);
    }

    /// Cancel all subscriptions, then drop live values
    fn teardown(&mut self) {
        self.subscriptions.cancel_all();
        self.store.clear_live();
    }

    fn apply_push(&mut self, generation: Generation, repository_id: u64, stars: u32) {
        if !self.subscriptions.accepts(generation, repository_id) {
            return;
        }

        match self.store.set_live(repository_id, stars) {
            Ok(true) => {
                if self.presenter.on_row_updated(&self.store, repository_id) == RowUpdate::Unmapped {
                    self.presenter.on_directory_replaced(&self.store);
                }
            }
            Ok(false) => {}
            Err(e) => debug!(repository_id, error = %e, "Push for repository outside the directory"),
        }
    }

    fn stats(&self) -> FeedStats {
        FeedStats {
            organisation: self.organisation.clone(),
            generation: self.subscriptions.generation(),
            directory_len: self.store.directory().len(),
            active_subscriptions: self.subscriptions.active_count(),
            failed_subscriptions: self.subscriptions.failed_count(),
            live_overrides: self.store.live_len(),
            stale_pushes_dropped: self.subscriptions.stale_dropped(),
            refreshes_started: self.refreshes_started,
            refreshes_succeeded: self.refreshes_succeeded,
            refreshes_failed: self.refreshes_failed,
            refreshes_in_flight: self.in_flight.len(),
            last_refreshed_at: self.last_refreshed_at,
            last_refresh_error: self.last_refresh_error.clone(),
        }
    }
}

#[ractor::async_trait]
impl Actor for RefreshCoordinator {
    type Msg = CoordinatorMessage;
    type State = RefreshCoordinatorState;
    type Arguments = RefreshCoordinatorArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        info!(organisation = %args.organisation, "Starting refresh coordinator");

        let refresh_interval = match args.config.refresh_interval {
            Some(period) if period.is_zero() => {
                warn!("Zero refresh interval, periodic refresh disabled");
                None
            }
            other => other,
        };

        let ticker = refresh_interval.map(|period| {
            let feed = myself.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.tick().await; // Skip first immediate tick

                loop {
                    interval.tick().await;
                    if feed.send_message(CoordinatorMessage::Refresh).is_err() {
                        break;
                    }
                }
                debug!("Periodic refresh stopped");
            })
        });

        Ok(RefreshCoordinatorState {
            organisation: args.organisation,
            source: args.source,
            presenter: args.presenter,
            store: StarStore::new(),
            subscriptions: SubscriptionManager::new(args.live_server, args.config.subscribe_concurrency),
            next_refresh_id: 1,
            in_flight: BTreeSet::new(),
            refreshes_started: 0,
            refreshes_succeeded: 0,
            refreshes_failed: 0,
            last_refreshed_at: None,
            last_refresh_error: None,
            refresh_on_start: args.config.refresh_on_start,
            ticker,
        })
    }

    async fn post_start(
        &self,
        myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        // Screen load
        if state.refresh_on_start {
            state.start_refresh(&myself);
        }
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            CoordinatorMessage::Refresh => {
                state.start_refresh(&myself);
            }

            CoordinatorMessage::FetchCompleted { refresh_id, result } => {
                state.finish_refresh(&myself, refresh_id, result);
            }

            CoordinatorMessage::SubscriptionOpened {
                generation,
                repository_id,
                result,
            } => match state.subscriptions.install(generation, repository_id, result) {
                Installed::Active | Installed::Replaced => {
                    debug!(repository_id, %generation, "Live subscription active");
                }
                Installed::Failed | Installed::Stale => {}
            },

            CoordinatorMessage::Push {
                generation,
                repository_id,
                stars,
            } => {
                state.apply_push(generation, repository_id, stars);
            }

            CoordinatorMessage::CancelAll => {
                state.teardown();
                state.presenter.on_directory_replaced(&state.store);
            }

            CoordinatorMessage::CurrentStarCount(repository_id, reply) => {
                if !reply.is_closed() {
                    let _ = reply.send(state.store.current_star_count(repository_id));
                }
            }

            CoordinatorMessage::Snapshot(reply) => {
                if !reply.is_closed() {
                    let _ = reply.send(state.store.rows());
                }
            }

            CoordinatorMessage::ActiveSubscriptions(reply) => {
                if !reply.is_closed() {
                    let _ = reply.send(state.subscriptions.active_ids());
                }
            }

            CoordinatorMessage::GetStats(reply) => {
                if !reply.is_closed() {
                    let _ = reply.send(state.stats());
                }
            }

            CoordinatorMessage::Shutdown => {
                info!("Shutting down refresh coordinator");
                myself.stop(Some("Shutdown requested".to_string()));
            }
        }

        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if let Some(ticker) = state.ticker.take() {
            ticker.abort();
        }
        state.teardown();

        // Every refresh still waiting on its fetch gets its finished signal.
        for refresh_id in std::mem::take(&mut state.in_flight) {
            debug!(refresh_id, "Abandoning in-flight refresh");
            state.presenter.on_refresh_finished(RefreshOutcome::Abandoned);
        }

        info!(
            refreshes = state.refreshes_started,
            stale_pushes_dropped = state.subscriptions.stale_dropped(),
            "Refresh coordinator stopped"
        );
        Ok(())
    }
}
