use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::{RepositoryDetail, RepositorySummary};

// GitHub API response structures
#[derive(Debug, Deserialize)]
pub struct GitHubRepo {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub stargazers_count: u32,
}

#[derive(Debug, Deserialize)]
pub struct GitHubRepoDetail {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub html_url: String,
    pub stargazers_count: u32,
    #[serde(default)]
    pub forks_count: u32,
    #[serde(default)]
    pub open_issues_count: u32,
    pub language: Option<String>,
    pub created_at: DateTime<Utc>,
    pub pushed_at: Option<DateTime<Utc>>,
}

impl From<GitHubRepo> for RepositorySummary {
    fn from(repo: GitHubRepo) -> Self {
        RepositorySummary {
            id: repo.id,
            name: repo.name,
            description: repo.description.filter(|d| !d.trim().is_empty()),
            star_count: repo.stargazers_count,
        }
    }
}

impl From<GitHubRepoDetail> for RepositoryDetail {
    fn from(repo: GitHubRepoDetail) -> Self {
        RepositoryDetail {
            id: repo.id,
            name: repo.name,
            full_name: repo.full_name,
            description: repo.description,
            html_url: repo.html_url,
            star_count: repo.stargazers_count,
            forks_count: repo.forks_count,
            open_issues_count: repo.open_issues_count,
            language: repo.language,
            created_at: repo.created_at,
            pushed_at: repo.pushed_at,
        }
    }
}
