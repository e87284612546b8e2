use crate::error::{LiveStarsError, Result};
use rand::Rng;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Shortest push interval; `tokio::time::interval` rejects a zero period
const MIN_PUSH_INTERVAL: Duration = Duration::from_millis(1);

/// Callback invoked with each new star count, possibly from another task
pub type UpdateCallback = Arc<dyn Fn(u32) + Send + Sync + 'static>;

/// Handle for one open feed
pub trait Subscription: Send + Sync + fmt::Debug + 'static {
    /// Stop the feed. Calling it again has no effect.
    fn cancel(&self);

    fn is_cancelled(&self) -> bool;
}

/// Push-style update source, one feed per repository
#[ractor::async_trait]
pub trait LiveServer: Send + Sync + 'static {
    async fn subscribe(
        &self,
        repository_id: u64,
        current_stars: u32,
        on_update: UpdateCallback,
    ) -> Result<Box<dyn Subscription>>;
}

#[derive(Debug, Clone)]
pub struct MockLiveServerConfig {
    /// Delay before a subscription is acknowledged
    pub ack_delay: Duration,
    pub push_interval: Duration,
    /// Largest increment applied by a single push
    pub max_step: u32,
}

impl Default for MockLiveServerConfig {
    fn default() -> Self {
        Self {
            ack_delay: Duration::from_millis(50),
            push_interval: Duration::from_secs(2),
            max_step: 3,
        }
    }
}

/// Simulated push feed: every interval, each subscribed repository gains a few stars
pub struct MockLiveServer {
    config: MockLiveServerConfig,
    rejected: Mutex<HashSet<u64>>,
}

impl MockLiveServer {
    pub fn new(config: MockLiveServerConfig) -> Self {
        Self {
            config,
            rejected: Mutex::new(HashSet::new()),
        }
    }

    /// Make future subscriptions for this repository fail
    pub fn reject(&self, repository_id: u64) {
        if let Ok(mut rejected) = self.rejected.lock() {
            rejected.insert(repository_id);
        }
    }

    fn is_rejected(&self, repository_id: u64) -> bool {
        self.rejected
            .lock()
            .map(|rejected| rejected.contains(&repository_id))
            .unwrap_or(false)
    }
}

impl Default for MockLiveServer {
    fn default() -> Self {
        Self::new(MockLiveServerConfig::default())
    }
}

#[ractor::async_trait]
impl LiveServer for MockLiveServer {
    async fn subscribe(
        &self,
        repository_id: u64,
        current_stars: u32,
        on_update: UpdateCallback,
    ) -> Result<Box<dyn Subscription>> {
        tokio::time::sleep(self.config.ack_delay).await;

        if self.is_rejected(repository_id) {
            return Err(LiveStarsError::SubscriptionError {
                repository_id,
                reason: "live server rejected the subscription".to_string(),
            });
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let interval = self.config.push_interval.max(MIN_PUSH_INTERVAL);
        let max_step = self.config.max_step.max(1);

        let task = tokio::spawn(async move {
            let mut stars = current_stars;
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if flag.load(Ordering::Acquire) {
                    break;
                }
                let step = rand::thread_rng().gen_range(1..=max_step);
                stars = stars.saturating_add(step);
                trace!(repository_id, stars, "Pushing star count");
                on_update(stars);
            }
        });

        debug!(repository_id, current_stars, "Live subscription opened");
        Ok(Box::new(LiveSubscription {
            repository_id,
            cancelled,
            task: Mutex::new(Some(task)),
        }))
    }
}

/// Subscription handle backed by a tokio task
pub struct LiveSubscription {
    repository_id: u64,
    cancelled: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for LiveSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveSubscription")
            .field("repository_id", &self.repository_id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl Subscription for LiveSubscription {
    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(task) = self.task.lock().ok().and_then(|mut task| task.take()) {
            task.abort();
        }
        debug!(repository_id = self.repository_id, "Live subscription cancelled");
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Drop for LiveSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
