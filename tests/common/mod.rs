#![allow(dead_code)]

use live_stars::actors::{
    CoordinatorConfig, CoordinatorMessage, RefreshCoordinator, RefreshCoordinatorArgs,
};
use live_stars::error::{LiveStarsError, Result};
use live_stars::github::RepositorySource;
use live_stars::live_server::{LiveServer, Subscription, UpdateCallback};
use live_stars::models::{FeedStats, RefreshOutcome, RepositoryDetail, RepositorySummary};
use live_stars::presenter::{Presenter, RowUpdate};
use live_stars::store::StarStore;
use ractor::ActorRef;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn repo(id: u64, name: &str, stars: u32) -> RepositorySummary {
    RepositorySummary {
        id,
        name: name.to_string(),
        description: Some(format!("{} description", name)),
        star_count: stars,
    }
}

/// One scripted answer of the fake REST source
pub struct ScriptedFetch {
    pub delay: Duration,
    pub result: Result<Vec<RepositorySummary>>,
}

impl ScriptedFetch {
    pub fn ok(repositories: Vec<RepositorySummary>) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(repositories),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(LiveStarsError::ApiError(message.to_string())),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// REST source answering fetches from a script, in call order
#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<ScriptedFetch>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<ScriptedFetch>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[ractor::async_trait]
impl RepositorySource for ScriptedSource {
    async fn fetch_repositories(&self, organisation: &str) -> Result<Vec<RepositorySummary>> {
        self.calls.lock().unwrap().push(organisation.to_string());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(fetch) => {
                tokio::time::sleep(fetch.delay).await;
                fetch.result
            }
            None => Err(LiveStarsError::ApiError("script exhausted".to_string())),
        }
    }

    async fn fetch_detail(&self, repository_id: u64) -> Result<RepositoryDetail> {
        Err(LiveStarsError::NotFound(format!("repository {}", repository_id)))
    }
}

#[derive(Debug, Default)]
pub struct FakeSubscription {
    cancelled: AtomicBool,
    cancel_calls: Mutex<u32>,
}

impl FakeSubscription {
    pub fn cancel_calls(&self) -> u32 {
        *self.cancel_calls.lock().unwrap()
    }
}

/// Boxed handle sharing its state with the test
#[derive(Debug, Clone, Default)]
pub struct SharedHandle(pub Arc<FakeSubscription>);

impl Subscription for SharedHandle {
    fn cancel(&self) {
        *self.0.cancel_calls.lock().unwrap() += 1;
        self.0.cancelled.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }
}

/// A subscription the live server handed out, with its callback kept for
/// driving pushes by hand
#[derive(Clone)]
pub struct Registration {
    pub repository_id: u64,
    pub baseline: u32,
    pub on_update: UpdateCallback,
    pub handle: Arc<FakeSubscription>,
}

impl Registration {
    pub fn push(&self, stars: u32) {
        (self.on_update)(stars);
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.cancelled.load(Ordering::SeqCst)
    }
}

/// Live server that never pushes on its own
#[derive(Default)]
pub struct ControlledLiveServer {
    ack_delay: Mutex<Duration>,
    rejected: Mutex<HashSet<u64>>,
    initial_pushes: Mutex<HashMap<u64, u32>>,
    registrations: Mutex<Vec<Registration>>,
}

impl ControlledLiveServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ack_delay(&self, delay: Duration) {
        *self.ack_delay.lock().unwrap() = delay;
    }

    pub fn reject(&self, repository_id: u64) {
        self.rejected.lock().unwrap().insert(repository_id);
    }

    /// Deliver `stars` from inside `subscribe`, before the handle is returned
    pub fn push_on_subscribe(&self, repository_id: u64, stars: u32) {
        self.initial_pushes.lock().unwrap().insert(repository_id, stars);
    }

    pub fn registration_count(&self) -> usize {
        self.registrations.lock().unwrap().len()
    }

    pub fn registrations(&self, repository_id: u64) -> Vec<Registration> {
        self.registrations
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.repository_id == repository_id)
            .cloned()
            .collect()
    }

    /// The one registration for this repository that is still open
    pub fn active(&self, repository_id: u64) -> Registration {
        let open: Vec<Registration> = self
            .registrations(repository_id)
            .into_iter()
            .filter(|r| !r.is_cancelled())
            .collect();
        assert_eq!(open.len(), 1, "expected exactly one open feed for {}", repository_id);
        open.into_iter().next().unwrap()
    }

    pub fn push(&self, repository_id: u64, stars: u32) {
        self.active(repository_id).push(stars);
    }
}

#[ractor::async_trait]
impl LiveServer for ControlledLiveServer {
    async fn subscribe(
        &self,
        repository_id: u64,
        current_stars: u32,
        on_update: UpdateCallback,
    ) -> Result<Box<dyn Subscription>> {
        let delay = *self.ack_delay.lock().unwrap();
        tokio::time::sleep(delay).await;

        if self.rejected.lock().unwrap().contains(&repository_id) {
            return Err(LiveStarsError::SubscriptionError {
                repository_id,
                reason: "rejected".to_string(),
            });
        }

        let initial = self.initial_pushes.lock().unwrap().get(&repository_id).copied();
        if let Some(stars) = initial {
            on_update(stars);
        }

        let handle = Arc::new(FakeSubscription::default());
        self.registrations.lock().unwrap().push(Registration {
            repository_id,
            baseline: current_stars,
            on_update,
            handle: handle.clone(),
        });
        Ok(Box::new(SharedHandle(handle)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenterEvent {
    DirectoryReplaced(Vec<(u64, u32)>),
    RowUpdated(u64, u32),
    RefreshFinished(RefreshOutcome),
}

/// Presenter that records every notification
#[derive(Default)]
pub struct RecordingPresenter {
    events: Mutex<Vec<PresenterEvent>>,
    hidden: Mutex<HashSet<u64>>,
}

impl RecordingPresenter {
    pub fn events(&self) -> Vec<PresenterEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn hide(&self, repository_id: u64) {
        self.hidden.lock().unwrap().insert(repository_id);
    }

    pub fn finished(&self) -> Vec<RefreshOutcome> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                PresenterEvent::RefreshFinished(outcome) => Some(outcome),
                _ => None,
            })
            .collect()
    }

    pub fn row_updates(&self) -> Vec<(u64, u32)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                PresenterEvent::RowUpdated(id, stars) => Some((id, stars)),
                _ => None,
            })
            .collect()
    }

    pub fn redraws(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, PresenterEvent::DirectoryReplaced(_)))
            .count()
    }
}

impl Presenter for RecordingPresenter {
    fn on_directory_replaced(&self, store: &StarStore) {
        let rows = store.rows().into_iter().map(|r| (r.id, r.star_count)).collect();
        self.events.lock().unwrap().push(PresenterEvent::DirectoryReplaced(rows));
    }

    fn on_row_updated(&self, store: &StarStore, repository_id: u64) -> RowUpdate {
        if self.hidden.lock().unwrap().contains(&repository_id) {
            return RowUpdate::Unmapped;
        }
        let stars = store.current_star_count(repository_id).unwrap();
        self.events
            .lock()
            .unwrap()
            .push(PresenterEvent::RowUpdated(repository_id, stars));
        RowUpdate::Redrawn
    }

    fn on_refresh_finished(&self, outcome: RefreshOutcome) {
        self.events.lock().unwrap().push(PresenterEvent::RefreshFinished(outcome));
    }
}

pub struct TestFeed {
    pub coordinator: ActorRef<CoordinatorMessage>,
    pub handle: tokio::task::JoinHandle<()>,
    pub source: Arc<ScriptedSource>,
    pub live: Arc<ControlledLiveServer>,
    pub presenter: Arc<RecordingPresenter>,
}

impl TestFeed {
    pub async fn start(script: Vec<ScriptedFetch>) -> Self {
        Self::start_with(script, Arc::new(ControlledLiveServer::new())).await
    }

    pub async fn start_with(script: Vec<ScriptedFetch>, live: Arc<ControlledLiveServer>) -> Self {
        let config = CoordinatorConfig {
            subscribe_concurrency: 4,
            refresh_interval: None,
            refresh_on_start: false,
        };
        Self::start_with_config(script, live, config).await
    }

    pub async fn start_with_config(
        script: Vec<ScriptedFetch>,
        live: Arc<ControlledLiveServer>,
        config: CoordinatorConfig,
    ) -> Self {
        let source = Arc::new(ScriptedSource::new(script));
        let presenter = Arc::new(RecordingPresenter::default());

        let (coordinator, handle) = RefreshCoordinator::start(RefreshCoordinatorArgs {
            organisation: "swiftlang".to_string(),
            source: source.clone(),
            live_server: live.clone(),
            presenter: presenter.clone(),
            config,
        })
        .await
        .expect("Failed to spawn coordinator");

        Self {
            coordinator,
            handle,
            source,
            live,
            presenter,
        }
    }

    pub fn send(&self, message: CoordinatorMessage) {
        self.coordinator
            .send_message(message)
            .expect("Failed to send message to coordinator");
    }

    pub async fn stats(&self) -> FeedStats {
        match self
            .coordinator
            .call(CoordinatorMessage::GetStats, Some(Duration::from_secs(5)))
            .await
            .expect("Failed to call coordinator")
        {
            ractor::rpc::CallResult::Success(stats) => stats,
            _ => panic!("Expected success response"),
        }
    }

    pub async fn star_count(&self, repository_id: u64) -> Result<u32> {
        match self
            .coordinator
            .call(
                |reply| CoordinatorMessage::CurrentStarCount(repository_id, reply),
                Some(Duration::from_secs(5)),
            )
            .await
            .expect("Failed to call coordinator")
        {
            ractor::rpc::CallResult::Success(count) => count,
            _ => panic!("Expected success response"),
        }
    }

    pub async fn active_subscriptions(&self) -> Vec<u64> {
        match self
            .coordinator
            .call(CoordinatorMessage::ActiveSubscriptions, Some(Duration::from_secs(5)))
            .await
            .expect("Failed to call coordinator")
        {
            ractor::rpc::CallResult::Success(ids) => ids,
            _ => panic!("Expected success response"),
        }
    }

    /// Poll the coordinator's stats until `done` holds
    pub async fn wait_for(&self, what: &str, done: impl Fn(&FeedStats) -> bool) -> FeedStats {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let stats = self.stats().await;
            if done(&stats) {
                return stats;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("Timed out waiting for {}: {:?}", what, stats);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Refresh once and wait for its subscriptions to settle
    pub async fn refresh_and_settle(&self, expected_subscriptions: usize) -> FeedStats {
        let before = self.stats().await;
        let finished = before.refreshes_succeeded + before.refreshes_failed;
        self.send(CoordinatorMessage::Refresh);
        self.wait_for("refresh and subscriptions", |s| {
            s.refreshes_succeeded + s.refreshes_failed > finished
                && s.active_subscriptions + s.failed_subscriptions >= expected_subscriptions
        })
        .await
    }

    pub async fn shutdown(self) {
        self.send(CoordinatorMessage::Shutdown);
        let _ = tokio::time::timeout(Duration::from_secs(3), self.handle).await;
    }
}
