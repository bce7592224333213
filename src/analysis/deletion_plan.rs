use crate::progress::ProgressReporter;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeletionReport {
    pub removed: usize,
    /// Already gone when their turn came.
    pub missing: usize,
    pub failed: Vec<PathBuf>,
}

/// Total size of the files still present in `paths`.
pub fn reclaimable_bytes(paths: &[PathBuf]) -> u64 {
    paths
        .iter()
        .filter_map(|path| fs::symlink_metadata(path).ok())
        .filter(|metadata| metadata.is_file())
        .map(|metadata| metadata.len())
        .sum()
}

/// Remove every path in the plan. A failed removal is logged and the rest go ahead.
pub fn execute_deletion_plan(paths: &[PathBuf], reporter: &dyn ProgressReporter) -> DeletionReport {
    let mut report = DeletionReport::default();
    reporter.on_delete_start(paths.len());

    for (done, path) in paths.iter().enumerate() {
        match fs::remove_file(path) {
            Ok(()) => {
                debug!("removed: {}", path.display());
                report.removed += 1;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("File '{}' no longer exists, skipping", path.display());
                report.missing += 1;
            }
            Err(e) => {
                error!("Failed to remove '{}': {}", path.display(), e);
                report.failed.push(path.clone());
            }
        }
        reporter.on_delete_progress(done + 1, paths.len());
    }

    info!(
        "Deletion plan executed: {} removed, {} already missing, {} failed",
        report.removed,
        report.missing,
        report.failed.len()
    );
    reporter.on_delete_complete(report.removed, report.failed.len());
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentReporter;
    use tempfile::tempdir;

    #[test]
    fn test_failures_do_not_stop_removals() {
        let tmp = tempdir().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        let gone = tmp.path().join("gone");
        let dir = tmp.path().join("dir");
        fs::write(&a, "1").unwrap();
        fs::write(&b, "2").unwrap();
        fs::create_dir(&dir).unwrap();

        let plan = vec![a.clone(), gone, dir.clone(), b.clone()];
        assert_eq!(reclaimable_bytes(&plan), 2);

        let report = execute_deletion_plan(&plan, &SilentReporter);
        assert_eq!(report.removed, 2);
        assert_eq!(report.missing, 1);
        assert_eq!(report.failed, vec![dir.clone()]);
        assert!(!a.exists());
        assert!(!b.exists());
        assert!(dir.exists());
    }
}
