//! Content hashing. [`digest`] turns one file into a [`Digest`] by streaming it
//! through the configured algorithm; [`pool`] runs that over many files on a
//! dedicated thread pool and hands results back as they complete.

pub mod digest;
pub mod pool;

pub use digest::{hash_file, Digest, HashAlgorithm, DEFAULT_READ_BUFFER_SIZE};
pub use pool::{default_workers, HashOutcome, HashStream, HashWorkerPool};
