use crate::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

pub const INDEX_DIR: &str = "hash";
pub const KEEP_FILE: &str = "keep";
pub const DELETE_FILE: &str = "delete";
pub const ERROR_FILE: &str = "error";
pub const HASH_TABLE_FILE: &str = "hashes.csv";
pub const COMMANDLINE_FILE: &str = "commandline";

/// Directory owning one build's hash index and every artifact derived from it.
#[derive(Debug, Clone)]
pub struct WorkSession {
    dir: PathBuf,
}

impl WorkSession {
    /// Create a new session directory under `work_root`, named after the current
    /// time and process id.
    pub fn create(work_root: &Path) -> Result<Self, Error> {
        Self::create_named(work_root, &session_name())
    }

    /// Create `work_root/name`. The directory must not exist yet.
    pub fn create_named(work_root: &Path, name: &str) -> Result<Self, Error> {
        let metadata = fs::metadata(work_root)?;
        if !metadata.is_dir() || metadata.permissions().readonly() {
            return Err(Error::NotWritable(work_root.to_path_buf()));
        }

        let dir = work_root.join(name);
        match fs::create_dir(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(Error::SessionExists(dir));
            }
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                return Err(Error::NotWritable(work_root.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        }

        let dir = fs::canonicalize(&dir)?;
        info!("Work directory: {}", dir.display());
        Ok(WorkSession { dir })
    }

    /// Reference the session written by an earlier build.
    pub fn open(dir: &Path) -> Result<Self, Error> {
        if !dir.join(INDEX_DIR).is_dir() {
            return Err(Error::SessionMissing(dir.to_path_buf()));
        }
        Ok(WorkSession {
            dir: fs::canonicalize(dir)?,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_DIR)
    }

    pub fn artifact(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

pub fn session_name() -> String {
    format!(
        "duped-{}-{}",
        chrono::Local::now().format("%Y%m%dT%H%M%S"),
        std::process::id()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_session_name_carries_pid() {
        let name = session_name();
        assert!(name.starts_with("duped-"));
        assert!(name.ends_with(&format!("-{}", std::process::id())));
    }

    #[test]
    fn test_create_is_exclusive() {
        let tmp = tempdir().unwrap();
        let session = WorkSession::create_named(tmp.path(), "run").unwrap();
        assert!(session.dir().is_dir());
        assert!(session.dir().is_absolute());

        match WorkSession::create_named(tmp.path(), "run") {
            Err(Error::SessionExists(dir)) => assert_eq!(dir, tmp.path().join("run")),
            other => panic!("expected SessionExists, got {:?}", other),
        }
    }

    #[test]
    fn test_create_under_missing_root_fails() {
        let tmp = tempdir().unwrap();
        assert!(WorkSession::create(&tmp.path().join("missing")).is_err());
    }

    #[test]
    fn test_open_requires_index() {
        let tmp = tempdir().unwrap();
        assert!(matches!(
            WorkSession::open(tmp.path()),
            Err(Error::SessionMissing(_))
        ));

        fs::create_dir(tmp.path().join(INDEX_DIR)).unwrap();
        let session = WorkSession::open(tmp.path()).unwrap();
        assert_eq!(session.artifact(KEEP_FILE), session.dir().join("keep"));
    }
}
