use crate::actors::refresh_coordinator::CoordinatorMessage;
use crate::error::Result;
use crate::live_server::{LiveServer, Subscription, UpdateCallback};
use crate::models::{Generation, RepositorySummary};
use futures::StreamExt;
use ractor::{ActorRef, MessagingErr};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What happened to a subscription acknowledged by the live server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Installed {
    Active,
    /// An older handle for the same repository was cancelled first
    Replaced,
    Failed,
    /// Acknowledged after its generation was torn down; cancelled on arrival
    Stale,
}

/// Owns the active subscription handle of every repository.
///
/// Handles are only inserted or removed from the coordinator actor. Opening
/// a subscription happens on a spawned task which reports back with a
/// `SubscriptionOpened` message tagged with the generation it was opened for.
pub struct SubscriptionManager {
    live_server: Arc<dyn LiveServer>,
    concurrency: usize,
    generation: Generation,
    active: HashMap<u64, Box<dyn Subscription>>,
    failed: HashSet<u64>,
    stale_dropped: u64,
    /// Task still opening the current generation's subscriptions
    batch: Option<JoinHandle<()>>,
}

impl SubscriptionManager {
    pub fn new(live_server: Arc<dyn LiveServer>, concurrency: usize) -> Self {
        Self {
            live_server,
            concurrency: concurrency.max(1),
            generation: Generation::default(),
            active: HashMap::new(),
            failed: HashSet::new(),
            stale_dropped: 0,
            batch: None,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Open one subscription per repository for the current generation.
    ///
    /// Pushes are posted to `feed` as `Push` messages; each result is posted as
    /// `SubscriptionOpened`. A failure for one repository does not affect the
    /// others. A batch still running from an earlier call is aborted.
    pub fn subscribe_all(&mut self, feed: &ActorRef<CoordinatorMessage>, repositories: Vec<RepositorySummary>) {
        let generation = self.generation;
        let live_server = self.live_server.clone();
        let concurrency = self.concurrency;
        let feed = feed.clone();

        info!(%generation, count = repositories.len(), "Opening live subscriptions");

        self.abort_batch();
        self.batch = Some(tokio::spawn(async move {
            futures::stream::iter(repositories)
                .for_each_concurrent(concurrency, |repository| {
                    let live_server = live_server.clone();
                    let feed = feed.clone();
                    async move {
                        let result = subscribe(
                            live_server.as_ref(),
                            &feed,
                            generation,
                            repository.id,
                            repository.star_count,
                        )
                        .await;
                        report_opened(&feed, generation, repository.id, result);
                    }
                })
                .await;
        }));
    }

    /// Take ownership of an acknowledged subscription, or discard it if its
    /// generation is no longer current.
    pub fn install(
        &mut self,
        generation: Generation,
        repository_id: u64,
        result: Result<Box<dyn Subscription>>,
    ) -> Installed {
        if generation != self.generation {
            if let Ok(handle) = result {
                handle.cancel();
            }
            debug!(repository_id, %generation, current = %self.generation, "Discarding stale subscription");
            return Installed::Stale;
        }

        match result {
            Ok(handle) => {
                self.failed.remove(&repository_id);
                match self.active.remove(&repository_id) {
                    Some(previous) => {
                        previous.cancel();
                        self.active.insert(repository_id, handle);
                        Installed::Replaced
                    }
                    None => {
                        self.active.insert(repository_id, handle);
                        Installed::Active
                    }
                }
            }
            Err(e) => {
                warn!(repository_id, error = %e, "Subscription failed, row stays on its baseline");
                self.failed.insert(repository_id);
                Installed::Failed
            }
        }
    }

    /// Whether a push tagged with `generation` may touch state. A push of the
    /// current generation counts even if its handle has not been acknowledged
    /// yet. Rejected pushes are counted.
    pub fn accepts(&mut self, generation: Generation, repository_id: u64) -> bool {
        if generation == self.generation && !self.failed.contains(&repository_id) {
            return true;
        }
        self.stale_dropped += 1;
        debug!(repository_id, %generation, current = %self.generation, "Dropping stale push");
        false
    }

    /// Cancel every handle and move to a new generation. Returns how many
    /// handles were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        self.abort_batch();
        let cancelled = self.active.len();
        for (_, handle) in self.active.drain() {
            handle.cancel();
        }
        self.failed.clear();
        self.generation = self.generation.next();

        if cancelled > 0 {
            info!(cancelled, generation = %self.generation, "Cancelled live subscriptions");
        }
        cancelled
    }

    pub fn is_active(&self, repository_id: u64) -> bool {
        self.active.contains_key(&repository_id)
    }

    pub fn active_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.active.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn stale_dropped(&self) -> u64 {
        self.stale_dropped
    }

    fn abort_batch(&mut self) {
        if let Some(batch) = self.batch.take() {
            batch.abort();
        }
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        self.abort_batch();
        for (_, handle) in self.active.drain() {
            handle.cancel();
        }
    }
}

async fn subscribe(
    live_server: &dyn LiveServer,
    feed: &ActorRef<CoordinatorMessage>,
    generation: Generation,
    repository_id: u64,
    baseline: u32,
) -> Result<Box<dyn Subscription>> {
    let pusher = feed.clone();
    let on_update: UpdateCallback = Arc::new(move |stars: u32| {
        // The feed may already be gone; the push is simply lost then.
        let _ = pusher.send_message(CoordinatorMessage::Push {
            generation,
            repository_id,
            stars,
        });
    });

    live_server.subscribe(repository_id, baseline, on_update).await
}

fn report_opened(
    feed: &ActorRef<CoordinatorMessage>,
    generation: Generation,
    repository_id: u64,
    result: Result<Box<dyn Subscription>>,
) {
    let message = CoordinatorMessage::SubscriptionOpened {
        generation,
        repository_id,
        result,
    };
    if let Err(MessagingErr::SendErr(CoordinatorMessage::SubscriptionOpened { result: Ok(handle), .. })) =
        feed.send_message(message)
    {
        debug!(repository_id, "Feed stopped before subscription was acknowledged");
        handle.cancel();
    }
}
