use ahash::AHashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::vec;
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    /// Directory basenames to prune, matched case-sensitively at any depth.
    pub skip_dirs: Vec<String>,
    /// Leave out zero-byte files.
    pub skip_empty: bool,
}

/// A directory or entry the walk could not read. The walk carries on without it.
#[derive(Debug, Clone)]
pub struct TraversalError {
    pub path: Option<PathBuf>,
    pub message: String,
}

impl fmt::Display for TraversalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}: {}", path.display(), self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl From<walkdir::Error> for TraversalError {
    fn from(err: walkdir::Error) -> Self {
        TraversalError {
            path: err.path().map(Path::to_path_buf),
            message: err
                .io_error()
                .map(|e| e.to_string())
                .unwrap_or_else(|| err.to_string()),
        }
    }
}

/// Lazily walk `roots` and yield every regular file once, as a canonical path.
///
/// Symlinks are neither followed nor yielded. Errors go to `on_error` and are
/// logged; they never end the walk.
pub fn discover<F>(roots: &[PathBuf], options: &DiscoveryOptions, on_error: F) -> FileDiscovery<F>
where
    F: FnMut(TraversalError),
{
    FileDiscovery {
        roots: roots.to_vec().into_iter(),
        current: None,
        skip_dirs: options.skip_dirs.iter().cloned().collect(),
        skip_empty: options.skip_empty,
        seen: AHashSet::new(),
        on_error,
    }
}

pub struct FileDiscovery<F> {
    roots: vec::IntoIter<PathBuf>,
    current: Option<walkdir::IntoIter>,
    skip_dirs: AHashSet<String>,
    skip_empty: bool,
    seen: AHashSet<PathBuf>,
    on_error: F,
}

impl<F> FileDiscovery<F>
where
    F: FnMut(TraversalError),
{
    fn report(&mut self, err: TraversalError) {
        warn!("Skipping unreadable path {}", err);
        (self.on_error)(err);
    }

    fn next_root(&mut self) -> Option<walkdir::IntoIter> {
        for root in self.roots.by_ref() {
            match fs::canonicalize(&root) {
                Ok(canonical) => {
                    return Some(WalkDir::new(canonical).follow_links(false).into_iter());
                }
                Err(e) => {
                    let err = TraversalError {
                        path: Some(root),
                        message: e.to_string(),
                    };
                    warn!("Skipping unreadable path {}", err);
                    (self.on_error)(err);
                }
            }
        }
        None
    }

    fn is_pruned(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.skip_dirs.contains(name))
    }

    /// Whether a non-directory entry belongs in the output.
    fn accept_file(&mut self, entry: &DirEntry) -> bool {
        if !entry.file_type().is_file() {
            return false;
        }
        if self.skip_empty {
            match entry.metadata() {
                Ok(metadata) if metadata.len() == 0 => return false,
                Ok(_) => {}
                Err(e) => {
                    self.report(e.into());
                    return false;
                }
            }
        }
        true
    }
}

impl<F> Iterator for FileDiscovery<F>
where
    F: FnMut(TraversalError),
{
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            if self.current.is_none() {
                self.current = Some(self.next_root()?);
            }
            let Some(walker) = self.current.as_mut() else {
                continue;
            };

            let entry = match walker.next() {
                None => {
                    self.current = None;
                    continue;
                }
                Some(Err(e)) => {
                    self.report(e.into());
                    continue;
                }
                Some(Ok(entry)) => entry,
            };

            if entry.file_type().is_dir() {
                if self.is_pruned(&entry) {
                    if let Some(walker) = self.current.as_mut() {
                        walker.skip_current_dir();
                    }
                }
                continue;
            }

            if self.accept_file(&entry) {
                let path = entry.into_path();
                if self.seen.insert(path.clone()) {
                    return Some(path);
                }
            }
        }
    }
}
