//! Terminal output for the command-line tool.
//!
//! Progress bars driven by [`ProgressEvent`]s and tables for fetched records
//! and download outcomes.

use comfy_table::{Attribute, Cell, Table};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;

use crate::models::{DownloadReport, PaperDetail};
use crate::utils::ProgressEvent;

/// Check if stdout is a terminal.
pub fn is_terminal() -> bool {
    std::io::stdout().is_terminal()
}

/// Progress bar mirroring a spawned [`ProgressMonitor`](crate::ProgressMonitor)
pub struct BatchProgress {
    pb: ProgressBar,
}

impl BatchProgress {
    /// Create a bar for `total` items; hidden when `visible` is false
    pub fn new(total: usize, msg: &str, visible: bool) -> Self {
        let pb = if visible {
            ProgressBar::new(total as u64)
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::with_template("{msg}: {bar:40.cyan/blue} {pos}/{len} ({percent}%)")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        pb.set_message(msg.to_string());

        Self { pb }
    }

    /// Apply one monitor event; returns true once the batch has ended
    pub fn apply(&self, event: ProgressEvent) -> bool {
        match event {
            ProgressEvent::Update(progress) => {
                self.pb.set_length(progress.total as u64);
                self.pb.set_position(progress.completed as u64);
                false
            }
            ProgressEvent::Finished(progress) => {
                self.pb.set_position(progress.completed as u64);
                self.pb.finish();
                true
            }
            ProgressEvent::Stalled(progress) => {
                self.pb.abandon_with_message(format!(
                    "Stalled at {}/{}",
                    progress.completed, progress.total
                ));
                true
            }
        }
    }
}

/// Truncate text to at most `max_chars` characters, marking the cut with "..."
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars <= 3 {
        return "...".to_string();
    }

    let truncated: String = text.chars().take(max_chars - 3).collect();
    format!("{}...", truncated.trim_end())
}

/// Table of fetched records, one row per rank
pub fn records_table(records: &[PaperDetail]) -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["#", "Title", "Authors", "Date", "Publication", "DOI"]);

    for (rank, record) in records.iter().enumerate() {
        table.add_row(vec![
            Cell::new(rank + 1),
            Cell::new(truncate_with_ellipsis(&record.title, 50)).add_attribute(Attribute::Bold),
            Cell::new(truncate_with_ellipsis(&record.authors, 30)),
            Cell::new(&record.date),
            Cell::new(truncate_with_ellipsis(&record.publication, 25)),
            Cell::new(&record.doi),
        ]);
    }
    table
}

/// Table of download outcomes in rank order
pub fn outcomes_table(report: &DownloadReport) -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["#", "Status", "DOI", "File"]);

    for outcome in &report.outcomes {
        let file = outcome
            .saved_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let status = Cell::new(outcome.status.to_string());
        let status = if outcome.status.is_success() {
            status
        } else {
            status.add_attribute(Attribute::Bold)
        };

        table.add_row(vec![
            Cell::new(outcome.rank + 1),
            status,
            Cell::new(&outcome.doi),
            Cell::new(truncate_with_ellipsis(&file, 60)),
        ]);
    }
    table
}
