use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A repository as listed for an organisation, with its baseline star count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySummary {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub star_count: u32,
}

/// Full repository information, fetched on demand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryDetail {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub html_url: String,
    pub star_count: u32,
    pub forks_count: u32,
    pub open_issues_count: u32,
    pub language: Option<String>,
    pub created_at: DateTime<Utc>,
    pub pushed_at: Option<DateTime<Utc>>,
}

/// Most recent pushed star count for a subscribed repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveStarRecord {
    pub repository_id: u64,
    pub star_count: u32,
}

/// Effective view of one directory entry: baseline merged with any live value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRow {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub star_count: u32,
    pub live: bool,
}

/// Subscription set identifier, bumped on every teardown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// How a refresh ended, as reported to the presenter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOutcome {
    Succeeded,
    Failed,
    /// The feed was torn down before the fetch returned
    Abandoned,
}

/// Diagnostics for the live feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedStats {
    pub organisation: String,
    pub generation: Generation,
    pub directory_len: usize,
    pub active_subscriptions: usize,
    pub failed_subscriptions: usize,
    pub live_overrides: usize,
    pub stale_pushes_dropped: u64,
    pub refreshes_started: u64,
    pub refreshes_succeeded: u64,
    pub refreshes_failed: u64,
    pub refreshes_in_flight: usize,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub last_refresh_error: Option<String>,
}
