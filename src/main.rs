use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use live_stars::actors::{CoordinatorConfig, CoordinatorMessage, RefreshCoordinator, RefreshCoordinatorArgs};
use live_stars::cli::Cli;
use live_stars::github::{GitHubClient, GitHubClientConfig, RepositorySource};
use live_stars::live_server::{MockLiveServer, MockLiveServerConfig};
use live_stars::presenter::{format_count, TerminalPresenter};
use live_stars::status::{start_status_server, AppState};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let github = GitHubClient::new(GitHubClientConfig {
        api_url: cli.api_url.clone(),
        token: cli.token.clone(),
        timeout: Duration::from_secs(cli.http_timeout_secs),
        max_pages: cli.max_pages,
        ..Default::default()
    })
    .context("Failed to create GitHub client")?;

    if let Some(repository_id) = cli.detail {
        return print_detail(&github, repository_id).await;
    }

    let live_server = MockLiveServer::new(MockLiveServerConfig {
        push_interval: Duration::from_millis(cli.push_interval_ms),
        max_step: cli.push_max_step,
        ..Default::default()
    });

    let (coordinator, handle) = RefreshCoordinator::start(RefreshCoordinatorArgs {
        organisation: cli.org.clone(),
        source: Arc::new(github),
        live_server: Arc::new(live_server),
        presenter: Arc::new(TerminalPresenter::new(cli.org.clone(), cli.visible_rows)),
        config: CoordinatorConfig {
            subscribe_concurrency: cli.subscribe_concurrency,
            refresh_interval: cli.refresh_interval_secs.map(Duration::from_secs),
            refresh_on_start: true,
        },
    })
    .await
    .context("Failed to start refresh coordinator")?;

    if let Some(port) = cli.status_port {
        let app_state = AppState {
            coordinator: coordinator.clone(),
            start_time: std::time::Instant::now(),
        };
        tokio::spawn(async move {
            if let Err(e) = start_status_server(app_state, port).await {
                error!("Status server failed: {}", e);
            }
        });
    }

    println!("{}", "Live star counts for GitHub repositories".bold().green());
    println!("{}", "Type r + Enter to refresh, c to drop live values, q to quit (Ctrl+C also works)\n".dimmed());

    let mut commands = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = commands.next_line() => {
                match line {
                    Ok(Some(line)) => match line.trim() {
                        "r" | "refresh" => coordinator.send_message(CoordinatorMessage::Refresh)
                            .map_err(|e| anyhow::anyhow!("Failed to request refresh: {:?}", e))?,
                        "c" | "cancel" => coordinator.send_message(CoordinatorMessage::CancelAll)
                            .map_err(|e| anyhow::anyhow!("Failed to cancel subscriptions: {:?}", e))?,
                        "q" | "quit" => break,
                        "" => {}
                        other => println!("{}", format!("Unknown command: {}", other).yellow()),
                    },
                    // stdin closed; keep streaming until Ctrl+C
                    Ok(None) => {
                        tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;
                        break;
                    }
                    Err(e) => {
                        error!("Failed to read command: {}", e);
                        break;
                    }
                }
            }
        }
    }

    println!("\n🛑 Shutting down...");

    match coordinator
        .call(CoordinatorMessage::GetStats, Some(Duration::from_secs(5)))
        .await
    {
        Ok(ractor::rpc::CallResult::Success(stats)) => {
            println!("\n📊 Final Statistics:");
            println!("Repositories: {}", stats.directory_len);
            println!(
                "Refreshes: {} started, {} succeeded, {} failed",
                stats.refreshes_started, stats.refreshes_succeeded, stats.refreshes_failed
            );
            println!(
                "Subscriptions: {} active, {} failed, {} stale pushes dropped",
                stats.active_subscriptions, stats.failed_subscriptions, stats.stale_pushes_dropped
            );
        }
        Ok(ractor::rpc::CallResult::Timeout) => eprintln!("Timeout getting final statistics"),
        Ok(ractor::rpc::CallResult::SenderError) => eprintln!("Sender error getting final statistics"),
        Err(e) => eprintln!("Failed to get final statistics: {}", e),
    }

    coordinator
        .send_message(CoordinatorMessage::Shutdown)
        .map_err(|e| anyhow::anyhow!("Failed to shut down coordinator: {:?}", e))?;

    if tokio::time::timeout(Duration::from_secs(3), handle).await.is_err() {
        eprintln!("Coordinator did not stop in time");
    }

    println!("✅ Stopped");
    Ok(())
}

async fn print_detail(github: &GitHubClient, repository_id: u64) -> Result<()> {
    let detail = github
        .fetch_detail(repository_id)
        .await
        .with_context(|| format!("Failed to fetch repository {}", repository_id))?;

    println!("{}", detail.full_name.bold().green());
    if let Some(description) = &detail.description {
        println!("{}", description);
    }
    println!("{}", "=".repeat(50).dimmed());
    println!("★ Stars:        {}", format_count(detail.star_count));
    println!("Forks:          {}", format_count(detail.forks_count));
    println!("Open issues:    {}", format_count(detail.open_issues_count));
    println!("Language:       {}", detail.language.as_deref().unwrap_or("-"));
    println!("Created:        {}", detail.created_at.format("%Y-%m-%d"));
    if let Some(pushed_at) = detail.pushed_at {
        println!("Last push:      {}", pushed_at.format("%Y-%m-%d %H:%M UTC"));
    }
    println!("{}", detail.html_url.underline());
    Ok(())
}
