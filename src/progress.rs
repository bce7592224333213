/// Trait for reporting phase progress.
///
/// The CLI implements it with indicatif bars. All methods have default no-op
/// implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_discover_start(&self) {}
    fn on_discover_progress(&self, _files_found: usize) {}
    fn on_discover_complete(&self, _total_files: usize, _duration_secs: f64) {}
    fn on_hash_start(&self, _total_files: usize) {}
    fn on_hash_progress(&self, _files_hashed: usize, _total_files: usize) {}
    fn on_hash_complete(&self, _errors: usize, _duration_secs: f64) {}
    fn on_delete_start(&self, _total_files: usize) {}
    fn on_delete_progress(&self, _files_done: usize, _total_files: usize) {}
    fn on_delete_complete(&self, _removed: usize, _failed: usize) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
