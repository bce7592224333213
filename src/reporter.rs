use duped::ProgressReporter;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";
const STEADY_TICK: Duration = Duration::from_millis(80);

/// CLI progress reporter using indicatif progress bars.
///
/// - Discovery: spinner (total unknown while walking)
/// - Hashing and deletion: progress bars (totals known up front)
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.take() {
                old.finish_and_clear();
            }
            *guard = Some(pb);
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }

    fn new_bar(total: usize, label: &str) -> ProgressBar {
        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::with_template(&format!(
            "  {{spinner:.cyan}} {} [{{bar:30.cyan/dim}}] {{pos}}/{{len}} files ({{eta}} remaining)",
            label
        )) {
            pb.set_style(style.progress_chars("━╸─").tick_chars(TICK_CHARS));
        }
        pb.enable_steady_tick(STEADY_TICK);
        pb
    }
}

impl ProgressReporter for CliReporter {
    fn on_discover_start(&self) {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            pb.set_style(style.tick_chars(TICK_CHARS));
        }
        pb.set_message("Building file list...");
        pb.enable_steady_tick(STEADY_TICK);
        self.set_bar(pb);
    }

    fn on_discover_progress(&self, files_found: usize) {
        self.with_bar(|pb| {
            pb.set_message(format!("Building file list... {} files found", files_found))
        });
    }

    fn on_discover_complete(&self, total_files: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m File list complete: {} files in {:.2}s",
            total_files, duration_secs
        );
    }

    fn on_hash_start(&self, total_files: usize) {
        self.set_bar(Self::new_bar(total_files, "Hashing"));
    }

    fn on_hash_progress(&self, files_hashed: usize, _total_files: usize) {
        self.with_bar(|pb| pb.set_position(files_hashed as u64));
    }

    fn on_hash_complete(&self, errors: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Hash complete: {} unreadable files in {:.2}s",
            errors, duration_secs
        );
    }

    fn on_delete_start(&self, total_files: usize) {
        self.set_bar(Self::new_bar(total_files, "Deleting"));
    }

    fn on_delete_progress(&self, files_done: usize, _total_files: usize) {
        self.with_bar(|pb| pb.set_position(files_done as u64));
    }

    fn on_delete_complete(&self, removed: usize, failed: usize) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Delete complete: {} removed, {} failed",
            removed, failed
        );
    }
}
