use crate::error::Error;
use crate::hasher::{self, HashAlgorithm};
use config::{Config, Environment, File as ConfigFile};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "Config.toml";

/// Settings shared by all phases. Values come from an optional `Config.toml`
/// and `DUPED_*` environment variables (`DUPED_LOG__FILE` for nested keys);
/// command-line flags are layered on top by the binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory basenames pruned anywhere in the walked trees.
    pub skip_dirs: Vec<String>,
    /// Leave zero-byte files out of the index.
    pub no_empty: bool,
    /// Hashing worker threads.
    pub procs: usize,
    pub algorithm: HashAlgorithm,
    /// Parent directory for new work sessions.
    pub work_root: PathBuf,
    /// fsync every index write instead of relying on the write-ahead log alone.
    pub sync_writes: bool,
    pub read_buffer_size: usize,
    /// Completed hashes buffered between the workers and the index writer.
    pub channel_capacity: usize,
    pub log: LogSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Plain-text copy of everything logged.
    pub file: PathBuf,
    /// Filter directive used unless `TRACING_LEVEL` or `--verbose` says otherwise.
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            file: PathBuf::from("logs/duped.log"),
            level: "info".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            skip_dirs: Vec::new(),
            no_empty: false,
            procs: hasher::default_workers(),
            algorithm: HashAlgorithm::default(),
            work_root: PathBuf::from("."),
            sync_writes: false,
            read_buffer_size: hasher::DEFAULT_READ_BUFFER_SIZE,
            channel_capacity: 1024,
            log: LogSettings::default(),
        }
    }
}

pub fn load_configuration() -> Result<AppConfig, Error> {
    load_configuration_from(Path::new(CONFIG_FILE))
}

/// Like [`load_configuration`], reading `file` (if it exists) instead of `Config.toml`.
pub fn load_configuration_from(file: &Path) -> Result<AppConfig, Error> {
    let builder = Config::builder()
        .add_source(ConfigFile::from(file).required(false))
        .add_source(
            Environment::with_prefix("DUPED")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("skip_dirs"),
        )
        .build()?;
    Ok(builder.try_deserialize::<AppConfig>()?)
}
