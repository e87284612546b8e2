use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "live-stars")]
#[command(about = "Lists an organisation's GitHub repositories with live star counts")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// GitHub organisation to list
    #[arg(long, env = "GITHUB_ORG", default_value = "swiftlang")]
    pub org: String,

    /// GitHub API token (optional, raises the rate limit)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// GitHub API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = "https://api.github.com")]
    pub api_url: String,

    /// HTTP timeout for GitHub requests, in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Maximum number of repository pages to fetch (100 repositories per page)
    #[arg(long, env = "MAX_PAGES", default_value_t = 10)]
    pub max_pages: u32,

    /// Interval between simulated star pushes, in milliseconds
    #[arg(long, env = "PUSH_INTERVAL_MS", default_value_t = 2000, value_parser = clap::value_parser!(u64).range(1..))]
    pub push_interval_ms: u64,

    /// Largest star increment of a single simulated push
    #[arg(long, env = "PUSH_MAX_STEP", default_value_t = 3)]
    pub push_max_step: u32,

    /// Number of subscriptions opened concurrently
    #[arg(long, env = "SUBSCRIBE_CONCURRENCY", default_value_t = 8)]
    pub subscribe_concurrency: usize,

    /// Refresh the list periodically, in seconds
    #[arg(long, env = "REFRESH_INTERVAL_SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub refresh_interval_secs: Option<u64>,

    /// Number of rows shown by the terminal view
    #[arg(long, env = "VISIBLE_ROWS", default_value_t = 20)]
    pub visible_rows: usize,

    /// Serve health and stats over HTTP on this port
    #[arg(long, env = "STATUS_PORT")]
    pub status_port: Option<u16>,

    /// Print the detail of one repository and exit
    #[arg(long, value_name = "REPOSITORY_ID")]
    pub detail: Option<u64>,
}
