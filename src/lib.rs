pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod session;
pub mod store;

pub use config::AppConfig;
pub use engine::{BuildResult, DedupeEngine, DeleteResult, ProcessResult};
pub use error::Error;
pub use hasher::{Digest, HashAlgorithm};
pub use progress::{ProgressReporter, SilentReporter};
