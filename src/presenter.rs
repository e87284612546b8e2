use crate::models::RefreshOutcome;
use crate::store::StarStore;
use colored::*;

/// Result of asking the presenter to redraw a single row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowUpdate {
    Redrawn,
    /// Row exists but is scrolled out of view; nothing to draw
    NotVisible,
    /// Presenter has no row for this id; the coordinator falls back to a full redraw
    Unmapped,
}

/// Presentation adapter notified by the refresh coordinator.
///
/// Every call is made from the coordinator actor, with read access to the
/// store that triggered it.
pub trait Presenter: Send + Sync + 'static {
    fn on_directory_replaced(&self, store: &StarStore);

    fn on_row_updated(&self, store: &StarStore, repository_id: u64) -> RowUpdate;

    fn on_refresh_finished(&self, outcome: RefreshOutcome);
}

/// Prints the repository list to stdout
pub struct TerminalPresenter {
    title: String,
    visible_rows: usize,
}

impl TerminalPresenter {
    pub fn new(title: impl Into<String>, visible_rows: usize) -> Self {
        Self {
            title: title.into(),
            visible_rows,
        }
    }

    fn is_visible(&self, row: usize) -> bool {
        row < self.visible_rows
    }
}

impl Presenter for TerminalPresenter {
    fn on_directory_replaced(&self, store: &StarStore) {
        println!("\n{}", self.title.bold().green());
        println!("{}", "=".repeat(50).dimmed());

        let rows = store.rows();
        for row in rows.iter().take(self.visible_rows) {
            println!(
                "{:<32} {} {}",
                row.name.bold(),
                "★".yellow(),
                format_count(row.star_count)
            );
            if let Some(description) = &row.description {
                println!("    {}", description.dimmed());
            }
        }
        if rows.len() > self.visible_rows {
            println!("{}", format!("… {} more", rows.len() - self.visible_rows).dimmed());
        }
    }

    fn on_row_updated(&self, store: &StarStore, repository_id: u64) -> RowUpdate {
        let (Some(index), Some(row)) = (store.row_index(repository_id), store.row(repository_id)) else {
            return RowUpdate::Unmapped;
        };
        if !self.is_visible(index) {
            return RowUpdate::NotVisible;
        }

        println!(
            "{} {:<32} {} {}",
            format!("#{:<3}", index + 1).dimmed(),
            row.name,
            "★".yellow(),
            format_count(row.star_count).cyan()
        );
        RowUpdate::Redrawn
    }

    fn on_refresh_finished(&self, outcome: RefreshOutcome) {
        match outcome {
            RefreshOutcome::Succeeded => println!("{}", "✅ Refresh finished".dimmed()),
            RefreshOutcome::Failed => println!("{}", "⚠️ Refresh failed, showing last known list".yellow()),
            RefreshOutcome::Abandoned => {}
        }
    }
}

/// Format a star count with thousands separators, e.g. `12,345`
pub fn format_count(count: u32) -> String {
    let digits = count.to_string();
    let mut formatted = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            formatted.push(',');
        }
        formatted.push(digit);
    }
    formatted
}
