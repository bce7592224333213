use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Index store error: {0}")]
    Store(#[from] rocksdb::Error),

    #[error("Index record encoding error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invocation record error: {0}")]
    Record(#[from] toml::ser::Error),

    #[error("Worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Work directory already exists: {}", .0.display())]
    SessionExists(PathBuf),

    #[error("No write access to {}", .0.display())]
    NotWritable(PathBuf),

    #[error("Work directory {} does not hold a hash index", .0.display())]
    SessionMissing(PathBuf),

    #[error("Hash index is open read-only")]
    ReadOnlyIndex,

    #[error("Corrupt index record: {0}")]
    CorruptIndex(String),
}
