//! Repository directory and the live star-count overrides layered on top of it.
//!
//! Both are owned by the refresh coordinator actor; readers get `&StarStore`
//! from within the actor, so a directory swap is never observed half-done.

use crate::error::{LiveStarsError, Result};
use crate::models::{LiveStarRecord, RepositoryRow, RepositorySummary};
use std::collections::HashMap;
use tracing::warn;

/// Ordered list of repositories currently shown
#[derive(Debug, Clone, Default)]
pub struct Directory {
    entries: Vec<RepositorySummary>,
    index: HashMap<u64, usize>,
}

impl Directory {
    /// Build a directory, keeping the first occurrence of any repeated id
    pub fn new(repositories: Vec<RepositorySummary>) -> Self {
        let mut index = HashMap::with_capacity(repositories.len());
        let mut entries = Vec::with_capacity(repositories.len());

        for repository in repositories {
            if index.contains_key(&repository.id) {
                warn!(repository_id = repository.id, name = %repository.name, "Dropping duplicate repository");
                continue;
            }
            index.insert(repository.id, entries.len());
            entries.push(repository);
        }

        Self { entries, index }
    }

    pub fn get(&self, repository_id: u64) -> Option<&RepositorySummary> {
        self.index.get(&repository_id).map(|&row| &self.entries[row])
    }

    pub fn row_index(&self, repository_id: u64) -> Option<usize> {
        self.index.get(&repository_id).copied()
    }

    pub fn contains(&self, repository_id: u64) -> bool {
        self.index.contains_key(&repository_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RepositorySummary> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct LiveValueStore {
    values: HashMap<u64, u32>,
}

impl LiveValueStore {
    /// Returns the previous live value, if any
    pub fn set(&mut self, repository_id: u64, star_count: u32) -> Option<u32> {
        self.values.insert(repository_id, star_count)
    }

    pub fn get(&self, repository_id: u64) -> Option<u32> {
        self.values.get(&repository_id).copied()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct StarStore {
    directory: Directory,
    live: LiveValueStore,
}

impl StarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live value if one was pushed, otherwise the directory baseline
    pub fn current_star_count(&self, repository_id: u64) -> Result<u32> {
        let repository = self.directory.get(repository_id).ok_or_else(|| {
            LiveStarsError::NotFound(format!("Repository {} is not in the directory", repository_id))
        })?;
        Ok(self.live.get(repository_id).unwrap_or(repository.star_count))
    }

    pub fn replace_directory(&mut self, repositories: Vec<RepositorySummary>) {
        self.directory = Directory::new(repositories);
    }

    pub fn clear_live(&mut self) {
        self.live.clear();
    }

    /// Record a pushed value. Returns whether the effective count changed.
    pub fn set_live(&mut self, repository_id: u64, star_count: u32) -> Result<bool> {
        let previous = self.current_star_count(repository_id)?;
        self.live.set(repository_id, star_count);
        Ok(previous != star_count)
    }

    pub fn live_record(&self, repository_id: u64) -> Option<LiveStarRecord> {
        self.live.get(repository_id).map(|star_count| LiveStarRecord {
            repository_id,
            star_count,
        })
    }

    pub fn row_index(&self, repository_id: u64) -> Option<usize> {
        self.directory.row_index(repository_id)
    }

    pub fn row(&self, repository_id: u64) -> Option<RepositoryRow> {
        self.directory.get(repository_id).map(|repository| self.to_row(repository))
    }

    pub fn rows(&self) -> Vec<RepositoryRow> {
        self.directory.iter().map(|repository| self.to_row(repository)).collect()
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn live_len(&self) -> usize {
        self.live.len()
    }

    fn to_row(&self, repository: &RepositorySummary) -> RepositoryRow {
        let live = self.live.get(repository.id);
        RepositoryRow {
            id: repository.id,
            name: repository.name.clone(),
            description: repository.description.clone(),
            star_count: live.unwrap_or(repository.star_count),
            live: live.is_some(),
        }
    }
}
