use clap::builder::RangedU64ValueParser;
use clap::{Args, Parser, Subcommand};
use duped::HashAlgorithm;
use std::path::PathBuf;

#[derive(Debug, Parser)] // requires `derive` feature
#[command(name = "duped")]
#[command(about = "Find duplicate files and sweep them out by directory prefix", long_about = None)]
pub struct Cli {
    /// Log at debug level
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Discover and hash files into a new work directory
    Build(BuildArgs),
    /// Decide which duplicates to keep and which to delete
    Process(ClassifyArgs),
    /// Decide, then remove every file in the delete list
    Delete(DeleteArgs),
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Directories to search for duplicates
    #[arg(required = true)]
    pub directories: Vec<PathBuf>,

    /// Skip empty files
    #[arg(long)]
    pub no_empty: bool,

    /// Directory name to ignore wherever it appears (repeatable)
    #[arg(long = "skip", value_name = "NAME")]
    pub skip: Vec<String>,

    /// Number of hashing workers
    #[arg(long, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub procs: Option<usize>,

    /// Content hash to use
    #[arg(long, value_parser = parse_algorithm)]
    pub algorithm: Option<HashAlgorithm>,

    /// Where to create the work directory
    #[arg(long, value_name = "DIR")]
    pub work_root: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ClassifyArgs {
    /// Work directory written by `build`
    #[arg(long = "work_dir", visible_alias = "work-dir", value_name = "DIR")]
    pub work_dir: PathBuf,

    /// Directories to automatically delete duplicates from
    #[arg(value_name = "DELETE_PREFIX")]
    pub prefixes: Vec<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub classify: ClassifyArgs,

    /// Delete without asking for confirmation
    #[arg(long, short)]
    pub yes: bool,
}

fn parse_algorithm(value: &str) -> Result<HashAlgorithm, String> {
    match value.to_ascii_lowercase().as_str() {
        "blake3" => Ok(HashAlgorithm::Blake3),
        "xxh64" | "xxhash" => Ok(HashAlgorithm::Xxh64),
        other => Err(format!("unknown algorithm '{}' (expected blake3 or xxh64)", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_flags() {
        let cli = Cli::parse_from([
            "duped", "build", "/a", "/b", "--no-empty", "--skip=.git", "--skip", "target",
            "--procs=3",
        ]);
        match cli.command {
            Some(Commands::Build(args)) => {
                assert_eq!(args.directories, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
                assert!(args.no_empty);
                assert_eq!(args.skip, vec![".git", "target"]);
                assert_eq!(args.procs, Some(3));
                assert_eq!(args.algorithm, None);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_process_work_dir_spelling() {
        let cli = Cli::parse_from(["duped", "process", "--work_dir=/w", "/old", "/older"]);
        match cli.command {
            Some(Commands::Process(args)) => {
                assert_eq!(args.work_dir, PathBuf::from("/w"));
                assert_eq!(args.prefixes, vec![PathBuf::from("/old"), PathBuf::from("/older")]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_zero_procs_rejected() {
        assert!(Cli::try_parse_from(["duped", "build", "/a", "--procs=0"]).is_err());
        assert!(Cli::try_parse_from(["duped", "build"]).is_err());
    }

    #[test]
    fn test_delete_yes_and_algorithm() {
        let cli = Cli::parse_from(["duped", "--verbose", "delete", "--work_dir", "/w", "-y"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Some(Commands::Delete(ref a)) if a.yes));
        assert_eq!(parse_algorithm("XXH64"), Ok(HashAlgorithm::Xxh64));
        assert!(parse_algorithm("md5").is_err());
    }
}
