use crate::error::{LiveStarsError, Result};
use crate::models::{RepositoryDetail, RepositorySummary};
use crate::types::{GitHubRepo, GitHubRepoDetail};
use reqwest::{Client, Response};
use std::time::{Duration, SystemTime};
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const MAX_RETRIES: u32 = 3;

/// REST collaborator that produces the repository directory
#[ractor::async_trait]
pub trait RepositorySource: Send + Sync + 'static {
    async fn fetch_repositories(&self, organisation: &str) -> Result<Vec<RepositorySummary>>;

    async fn fetch_detail(&self, repository_id: u64) -> Result<RepositoryDetail>;
}

#[derive(Debug, Clone)]
pub struct GitHubClientConfig {
    pub api_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
    pub per_page: u32,
    pub max_pages: u32,
    pub retry_delay: Duration,
}

impl Default for GitHubClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            timeout: Duration::from_secs(30),
            per_page: 100,
            max_pages: 10,
            retry_delay: Duration::from_secs(2),
        }
    }
}

pub struct GitHubClient {
    client: Client,
    base: Url,
    config: GitHubClientConfig,
}

impl GitHubClient {
    pub fn new(config: GitHubClientConfig) -> Result<Self> {
        let base = Url::parse(&config.api_url)?;
        if base.cannot_be_a_base() {
            return Err(LiveStarsError::InvalidUrl(config.api_url.clone()));
        }

        let client = Client::builder()
            .user_agent(concat!("live-stars/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;

        Ok(GitHubClient { client, base, config })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| LiveStarsError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn make_request(&self, url: &Url) -> Result<Response> {
        let mut retries = 0;

        loop {
            let mut request = self
                .client
                .get(url.clone())
                .header("Accept", "application/vnd.github+json");
            if let Some(token) = &self.config.token {
                request = request.header("Authorization", format!("Bearer {}", token));
            }
            let response = request.send().await?;

            let rate_limit_remaining = response
                .headers()
                .get("X-RateLimit-Remaining")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u32>().ok());

            let rate_limit_reset = response
                .headers()
                .get("X-RateLimit-Reset")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(0);

            match response.status() {
                reqwest::StatusCode::OK => {
                    if let Some(remaining) = rate_limit_remaining.filter(|r| *r < 10) {
                        warn!(remaining, "GitHub rate limit running low");
                    }
                    return Ok(response);
                }
                reqwest::StatusCode::NOT_FOUND => {
                    return Err(LiveStarsError::NotFound(format!("Resource not found: {}", url)));
                }
                reqwest::StatusCode::FORBIDDEN | reqwest::StatusCode::TOO_MANY_REQUESTS
                    if rate_limit_remaining == Some(0) =>
                {
                    let reset_time = SystemTime::UNIX_EPOCH + Duration::from_secs(rate_limit_reset);
                    let wait_time = reset_time
                        .duration_since(SystemTime::now())
                        .unwrap_or(Duration::from_secs(0));

                    if wait_time > Duration::from_secs(60) || retries >= MAX_RETRIES {
                        return Err(LiveStarsError::RateLimitExceeded(format!(
                            "API rate limit exceeded, resets in {}s",
                            wait_time.as_secs()
                        )));
                    }
                    warn!(wait_secs = wait_time.as_secs() + 1, "Rate limit reached, waiting");
                    sleep(wait_time + Duration::from_secs(1)).await;
                    retries += 1;
                }
                status if status.is_server_error() && retries < MAX_RETRIES => {
                    warn!(%status, retry = retries + 1, "GitHub server error, retrying");
                    sleep(self.config.retry_delay).await;
                    retries += 1;
                }
                status => {
                    let error_text = response.text().await.unwrap_or_default();
                    return Err(LiveStarsError::ApiError(format!(
                        "API request failed with status {}: {}",
                        status, error_text
                    )));
                }
            }
        }
    }

    async fn fetch_repositories_page(&self, organisation: &str, page: u32) -> Result<Vec<GitHubRepo>> {
        let mut url = self.endpoint(&["orgs", organisation, "repos"])?;
        url.query_pairs_mut()
            .append_pair("per_page", &self.config.per_page.to_string())
            .append_pair("page", &page.to_string());

        let response = self.make_request(&url).await?;
        let body = response.bytes().await?;
        let repos: Vec<GitHubRepo> = serde_json::from_slice(&body)?;
        Ok(repos)
    }
}

#[ractor::async_trait]
impl RepositorySource for GitHubClient {
    /// Fetch every repository of an organisation, in API order, up to `max_pages` pages
    async fn fetch_repositories(&self, organisation: &str) -> Result<Vec<RepositorySummary>> {
        let mut repositories = Vec::new();
        let mut page = 1;

        loop {
            let repos = self.fetch_repositories_page(organisation, page).await?;
            let fetched = repos.len();
            debug!(organisation, page, fetched, "Fetched repository page");

            repositories.extend(repos.into_iter().map(RepositorySummary::from));

            if fetched < self.config.per_page as usize || page >= self.config.max_pages {
                break;
            }
            page += 1;
        }

        Ok(repositories)
    }

    async fn fetch_detail(&self, repository_id: u64) -> Result<RepositoryDetail> {
        let url = self.endpoint(&["repositories", &repository_id.to_string()])?;
        let response = self.make_request(&url).await?;
        let body = response.bytes().await?;
        let detail: GitHubRepoDetail = serde_json::from_slice(&body)?;
        Ok(detail.into())
    }
}
