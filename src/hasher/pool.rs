use super::digest::{self, Digest, HashAlgorithm};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread;
use tracing::{debug, error, trace};

/// One less than the available parallelism, so the index writer keeps a core.
pub fn default_workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

/// Result of hashing one path. `digest` is `None` when the file could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashOutcome {
    pub path: PathBuf,
    pub digest: Option<Digest>,
}

pub struct HashWorkerPool {
    pool: ThreadPool,
    algorithm: HashAlgorithm,
    buffer_size: usize,
    channel_capacity: usize,
}

impl HashWorkerPool {
    pub fn new(
        workers: usize,
        algorithm: HashAlgorithm,
        buffer_size: usize,
    ) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("duped-hash-{}", i))
            .build()?;
        Ok(Self {
            pool,
            algorithm,
            buffer_size,
            channel_capacity: 1024,
        })
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Hash every path on the pool. Outcomes are delivered in completion order;
    /// workers block once `channel_capacity` outcomes are waiting to be consumed.
    /// Dropping the stream stops the run: files already being hashed finish,
    /// no new ones are opened.
    pub fn hash_paths(&self, paths: Vec<PathBuf>) -> HashStream {
        let algorithm = self.algorithm;
        let buffer_size = self.buffer_size;
        self.run(paths, move |path| hash_one(path, algorithm, buffer_size))
    }

    fn run<F>(&self, paths: Vec<PathBuf>, hash: F) -> HashStream
    where
        F: Fn(PathBuf) -> HashOutcome + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(self.channel_capacity);

        self.pool.spawn(move || {
            let finished = paths.into_par_iter().try_for_each_with(
                tx,
                |tx: &mut SyncSender<HashOutcome>, path| tx.send(hash(path)).map_err(|_| ()),
            );
            if finished.is_err() {
                debug!("Hash stream dropped; remaining files skipped");
            }
        });

        HashStream { rx }
    }
}

fn hash_one(path: PathBuf, algorithm: HashAlgorithm, buffer_size: usize) -> HashOutcome {
    match digest::hash_file(&path, algorithm, buffer_size) {
        Ok(digest) => {
            trace!("{} {}", digest, path.display());
            HashOutcome {
                path,
                digest: Some(digest),
            }
        }
        Err(e) => {
            log_failure(&path, &e);
            HashOutcome { path, digest: None }
        }
    }
}

fn log_failure(path: &std::path::Path, e: &io::Error) {
    match e.kind() {
        io::ErrorKind::PermissionDenied | io::ErrorKind::NotFound => {
            debug!("Cannot read '{}': {}", path.display(), e);
        }
        _ => {
            error!("Error hashing file '{}': {}", path.display(), e);
        }
    }
}

/// Completion-ordered outcomes of a [`HashWorkerPool::hash_paths`] run.
pub struct HashStream {
    rx: Receiver<HashOutcome>,
}

impl Iterator for HashStream {
    type Item = HashOutcome;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_workers_at_least_one() {
        assert!(default_workers() >= 1);
    }

    #[test]
    fn test_every_path_yields_one_outcome() {
        let dir = tempdir().unwrap();
        let mut paths = Vec::new();
        for i in 0..50 {
            let path = dir.path().join(format!("f{}", i));
            fs::write(&path, format!("content {}", i % 5)).unwrap();
            paths.push(path);
        }

        let pool = HashWorkerPool::new(4, HashAlgorithm::Blake3, 8)
            .unwrap()
            .with_channel_capacity(2);
        let mut outcomes: Vec<HashOutcome> = pool.hash_paths(paths.clone()).collect();
        outcomes.sort_by(|a, b| a.path.cmp(&b.path));
        paths.sort();

        assert_eq!(outcomes.len(), 50);
        for (outcome, path) in outcomes.iter().zip(&paths) {
            assert_eq!(&outcome.path, path);
            assert!(outcome.digest.is_some());
        }
    }

    #[test]
    fn test_unreadable_paths_do_not_stop_others() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.txt");
        fs::write(&good, "fine").unwrap();
        let missing = dir.path().join("missing.txt");
        // Opening a directory succeeds on unix but reading it fails.
        let subdir = dir.path().join("sub");
        fs::create_dir(&subdir).unwrap();

        let pool = HashWorkerPool::new(2, HashAlgorithm::Xxh64, 1024).unwrap();
        let outcomes: Vec<HashOutcome> = pool
            .hash_paths(vec![missing.clone(), subdir.clone(), good.clone()])
            .collect();

        assert_eq!(outcomes.len(), 3);
        for outcome in outcomes {
            if outcome.path == good {
                assert!(outcome.digest.is_some());
            } else {
                assert!(outcome.digest.is_none(), "{:?}", outcome.path);
            }
        }
    }

    #[test]
    fn test_dropping_stream_stops_hashing() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;
        use std::time::{Duration, Instant};

        let paths: Vec<PathBuf> = (0..200).map(|i| PathBuf::from(format!("/f{}", i))).collect();
        let hashed = Arc::new(AtomicUsize::new(0));

        let pool = HashWorkerPool::new(2, HashAlgorithm::Blake3, 64)
            .unwrap()
            .with_channel_capacity(1);
        let counter = Arc::clone(&hashed);
        let stream = pool.run(paths, move |path| {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(2));
            HashOutcome { path, digest: None }
        });
        let first: Vec<HashOutcome> = stream.take(3).collect();
        assert_eq!(first.len(), 3);

        // The job owns the only other handle on the counter until it returns.
        let deadline = Instant::now() + Duration::from_secs(10);
        while Arc::strong_count(&hashed) > 1 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(Arc::strong_count(&hashed), 1);
        // Taken, buffered, and at most one in flight per worker.
        assert!(hashed.load(Ordering::SeqCst) <= 8, "{}", hashed.load(Ordering::SeqCst));
    }
}
