use super::escape::escape_posix;
use crate::error::Error;
use crate::hasher::HashAlgorithm;
use crate::session::{WorkSession, COMMANDLINE_FILE, ERROR_FILE, HASH_TABLE_FILE};
use crate::store::HashIndex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Parameters of one build, process or delete run, appended to the session's
/// `commandline` file as a `[[invocation]]` TOML table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub command: String,
    pub started_at: String,
    pub pid: u32,
    pub argv: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roots: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip_dirs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_empty: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<HashAlgorithm>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delete_prefixes: Vec<String>,
}

impl Invocation {
    pub fn new(command: &str, argv: &[String]) -> Self {
        Invocation {
            command: command.to_string(),
            started_at: chrono::Local::now().to_rfc3339(),
            pid: std::process::id(),
            argv: argv.to_vec(),
            roots: Vec::new(),
            skip_dirs: Vec::new(),
            skip_empty: None,
            workers: None,
            algorithm: None,
            delete_prefixes: Vec::new(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct InvocationLog {
    invocation: Vec<Invocation>,
}

/// Invocation records are TOML, so paths in them are stored lossily.
pub fn lossy_strings(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect()
}

/// Writes the line-oriented artifacts of a work session.
pub struct ResultWriter<'a> {
    session: &'a WorkSession,
}

impl<'a> ResultWriter<'a> {
    pub fn new(session: &'a WorkSession) -> Self {
        Self { session }
    }

    /// Replace artifact `name` with one shell-escaped path per line.
    pub fn write_paths(&self, name: &str, paths: &[PathBuf]) -> Result<PathBuf, Error> {
        let target = self.session.artifact(name);
        write_path_lines(&target, paths)?;
        debug!("Wrote {} paths to {}", paths.len(), target.display());
        Ok(target)
    }

    /// Write the index's error list to the `error` artifact.
    pub fn write_errors(&self, index: &HashIndex) -> Result<Vec<PathBuf>, Error> {
        let errors = index.errors().collect::<Result<Vec<_>, _>>()?;
        self.write_paths(ERROR_FILE, &errors)?;
        Ok(errors)
    }

    /// Export every `(digest, path)` pair of the index to `hashes.csv`.
    pub fn write_hash_table(&self, index: &HashIndex) -> Result<usize, Error> {
        let target = self.session.artifact(HASH_TABLE_FILE);
        let mut writer = csv::Writer::from_path(&target)?;
        writer.write_record(["digest", "path"])?;
        let mut rows = 0;
        for group in index.groups() {
            let group = group?;
            let digest = group.digest.to_hex();
            for path in &group.paths {
                // Raw path bytes, so non-UTF-8 names are not replaced.
                writer.write_record([digest.as_bytes(), path.as_os_str().as_encoded_bytes()])?;
                rows += 1;
            }
        }
        writer.flush()?;
        debug!("Wrote {} rows to {}", rows, target.display());
        Ok(rows)
    }

    pub fn record_invocation(&self, invocation: &Invocation) -> Result<(), Error> {
        let record = toml::to_string(&InvocationLog {
            invocation: vec![invocation.clone()],
        })?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.session.artifact(COMMANDLINE_FILE))?;
        writeln!(file, "{}", record)?;
        Ok(())
    }
}

fn write_path_lines(target: &Path, paths: &[PathBuf]) -> Result<(), Error> {
    let mut out = BufWriter::new(File::create(target)?);
    for path in paths {
        out.write_all(&escape_posix(path))?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}
