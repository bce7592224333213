use crate::analysis::{self, Decision, DeletionReport};
use crate::config::AppConfig;
use crate::error::Error;
use crate::hasher::HashWorkerPool;
use crate::output::{lossy_strings, Invocation, ResultWriter};
use crate::progress::ProgressReporter;
use crate::scanner::{self, DiscoveryOptions, TraversalError};
use crate::session::{WorkSession, DELETE_FILE, KEEP_FILE};
use crate::store::HashIndex;
use std::fs;
use std::path::{self, Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const DISCOVER_PROGRESS_INTERVAL: usize = 1000;

pub struct DedupeEngine {
    config: AppConfig,
    argv: Vec<String>,
}

#[derive(Debug)]
pub struct BuildResult {
    pub session_dir: PathBuf,
    pub discover_duration: Duration,
    pub hash_duration: Duration,
    pub files_discovered: usize,
    pub files_hashed: usize,
    pub hash_errors: Vec<PathBuf>,
    pub traversal_errors: Vec<TraversalError>,
    pub groups: usize,
    pub duplicate_groups: usize,
    /// Members of groups with more than one file.
    pub duplicate_files: usize,
}

#[derive(Debug)]
pub struct ProcessResult {
    pub session_dir: PathBuf,
    pub decision: Decision,
    pub hash_errors: Vec<PathBuf>,
    pub reclaimable_bytes: u64,
    /// False when the build that wrote the index stopped early.
    pub index_complete: bool,
}

#[derive(Debug)]
pub struct DeleteResult {
    pub process: ProcessResult,
    pub report: DeletionReport,
}

impl DedupeEngine {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            argv: Vec::new(),
        }
    }

    /// Command line recorded in the session's `commandline` file.
    pub fn with_invocation(mut self, argv: Vec<String>) -> Self {
        self.argv = argv;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run the build phase:
    /// 1. Create the work session (fails before any work if it cannot)
    /// 2. Walk the roots into a deduplicated path list
    /// 3. Hash on the worker pool, appending every result to the index as it arrives
    /// 4. Write the error list and the digest table
    pub fn build(
        &self,
        roots: &[PathBuf],
        reporter: &dyn ProgressReporter,
    ) -> Result<BuildResult, Error> {
        let session = WorkSession::create(&self.config.work_root)?;
        let writer = ResultWriter::new(&session);

        let mut invocation = Invocation::new("build", &self.argv);
        invocation.roots = lossy_strings(roots);
        invocation.skip_dirs = self.config.skip_dirs.clone();
        invocation.skip_empty = Some(self.config.no_empty);
        invocation.workers = Some(self.config.procs);
        invocation.algorithm = Some(self.config.algorithm);
        writer.record_invocation(&invocation)?;

        let mut index = HashIndex::create(
            &session.index_path(),
            self.config.algorithm,
            self.config.sync_writes,
        )?;

        // Phase 1: Discover
        info!("Building file list...");
        reporter.on_discover_start();
        let discover_start = Instant::now();
        let options = DiscoveryOptions {
            skip_dirs: self.config.skip_dirs.clone(),
            skip_empty: self.config.no_empty,
        };
        let mut traversal_errors = Vec::new();
        let mut paths = Vec::new();
        for path in scanner::discover(roots, &options, |err| traversal_errors.push(err)) {
            paths.push(path);
            if paths.len() % DISCOVER_PROGRESS_INTERVAL == 0 {
                reporter.on_discover_progress(paths.len());
            }
        }
        let discover_duration = discover_start.elapsed();
        let files_discovered = paths.len();
        reporter.on_discover_complete(files_discovered, discover_duration.as_secs_f64());
        debug!(
            "Discovery completed in {:.2}s: {} files, {} unreadable paths",
            discover_duration.as_secs_f64(),
            files_discovered,
            traversal_errors.len(),
        );

        // Phase 2: Hash
        let pool = HashWorkerPool::new(
            self.config.procs,
            self.config.algorithm,
            self.config.read_buffer_size,
        )?
        .with_channel_capacity(self.config.channel_capacity);
        info!(
            "Hashing {} files on {} workers...",
            files_discovered,
            pool.workers()
        );
        reporter.on_hash_start(files_discovered);
        let hash_start = Instant::now();

        let mut failed = 0usize;
        for (done, outcome) in pool.hash_paths(paths).enumerate() {
            index.add(outcome.digest.as_ref(), &outcome.path)?;
            if outcome.digest.is_none() {
                failed += 1;
            }
            reporter.on_hash_progress(done + 1, files_discovered);
        }
        index.finish()?;
        let hash_duration = hash_start.elapsed();
        reporter.on_hash_complete(failed, hash_duration.as_secs_f64());
        debug!(
            "Hashing completed in {:.2}s: {} errors",
            hash_duration.as_secs_f64(),
            failed,
        );

        // Phase 3: Artifacts
        let hash_errors = writer.write_errors(&index)?;
        writer.write_hash_table(&index)?;

        let mut groups = 0;
        let mut duplicate_groups = 0;
        let mut duplicate_files = 0;
        for group in index.groups() {
            let group = group?;
            groups += 1;
            if group.paths.len() > 1 {
                duplicate_groups += 1;
                duplicate_files += group.paths.len();
            }
        }

        Ok(BuildResult {
            session_dir: session.dir().to_path_buf(),
            discover_duration,
            hash_duration,
            files_discovered,
            files_hashed: files_discovered - failed,
            hash_errors,
            traversal_errors,
            groups,
            duplicate_groups,
            duplicate_files,
        })
    }

    /// Classify the session's index and write the `keep`, `delete` and `error` lists.
    pub fn process(
        &self,
        session_dir: &Path,
        prefixes: &[PathBuf],
    ) -> Result<ProcessResult, Error> {
        self.classify("process", session_dir, prefixes)
    }

    /// Classify like [`DedupeEngine::process`], then remove every file in the delete list.
    pub fn delete(
        &self,
        session_dir: &Path,
        prefixes: &[PathBuf],
        reporter: &dyn ProgressReporter,
    ) -> Result<DeleteResult, Error> {
        let plan = self.plan_delete(session_dir, prefixes)?;
        Ok(self.execute_delete(plan, reporter))
    }

    /// First half of [`DedupeEngine::delete`]: classify and write the lists,
    /// recorded as a `delete` invocation. Nothing is removed yet.
    pub fn plan_delete(
        &self,
        session_dir: &Path,
        prefixes: &[PathBuf],
    ) -> Result<ProcessResult, Error> {
        self.classify("delete", session_dir, prefixes)
    }

    /// Remove every file in a plan from [`DedupeEngine::plan_delete`].
    pub fn execute_delete(
        &self,
        plan: ProcessResult,
        reporter: &dyn ProgressReporter,
    ) -> DeleteResult {
        info!("Deleting {} files...", plan.decision.delete.len());
        let report = analysis::execute_deletion_plan(&plan.decision.delete, reporter);
        DeleteResult {
            process: plan,
            report,
        }
    }

    fn classify(
        &self,
        command: &str,
        session_dir: &Path,
        prefixes: &[PathBuf],
    ) -> Result<ProcessResult, Error> {
        let session = WorkSession::open(session_dir)?;
        let index = HashIndex::open_read_only(&session.index_path())?;
        let writer = ResultWriter::new(&session);

        let prefixes = resolve_prefixes(prefixes);
        let mut invocation = Invocation::new(command, &self.argv);
        invocation.delete_prefixes = lossy_strings(&prefixes);
        writer.record_invocation(&invocation)?;

        info!("Deciding over {} with prefixes {:?}", session.dir().display(), prefixes);
        let decision = analysis::decide_index(&index, &prefixes)?;
        writer.write_paths(KEEP_FILE, &decision.keep)?;
        writer.write_paths(DELETE_FILE, &decision.delete)?;
        let hash_errors = writer.write_errors(&index)?;
        let reclaimable_bytes = analysis::reclaimable_bytes(&decision.delete);
        debug!(
            "{} groups ({} with duplicates): keep {}, delete {}",
            decision.groups,
            decision.duplicate_groups,
            decision.keep.len(),
            decision.delete.len(),
        );

        Ok(ProcessResult {
            session_dir: session.dir().to_path_buf(),
            decision,
            hash_errors,
            reclaimable_bytes,
            index_complete: index.meta().completed,
        })
    }
}

/// Bring prefixes into the same form as indexed paths: canonical when they
/// exist, absolute otherwise. A trailing separator given by the user is kept so
/// that `/data/old/` does not also match `/data/older`.
pub fn resolve_prefixes(prefixes: &[PathBuf]) -> Vec<PathBuf> {
    prefixes
        .iter()
        .map(|prefix| {
            let trailing = prefix
                .to_string_lossy()
                .chars()
                .last()
                .is_some_and(path::is_separator);
            let resolved = fs::canonicalize(prefix)
                .or_else(|_| path::absolute(prefix))
                .unwrap_or_else(|_| prefix.clone());
            if trailing {
                resolved.join("")
            } else {
                resolved
            }
        })
        .collect()
}
