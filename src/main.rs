mod cli;
mod logging;
mod reporter;

use std::env;
use std::io::{self, Write};
use std::process;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use cli::{BuildArgs, ClassifyArgs, Cli, Commands, DeleteArgs};
use colored::*;
use dotenv::dotenv;
use duped::config::LogSettings;
use duped::session::DELETE_FILE;
use duped::{AppConfig, DedupeEngine, ProcessResult};
use reporter::CliReporter;
use tracing::{error, info, warn};

fn main() {
    dotenv().ok();

    let args = Cli::parse();

    let loaded = duped::config::load_configuration();
    let log_settings = match &loaded {
        Ok(config) => config.log.clone(),
        Err(_) => LogSettings::default(),
    };
    let guard = logging::init_logger(args.verbose, &log_settings);

    let config = match loaded {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            drop(guard);
            process::exit(1);
        }
    };
    let argv: Vec<String> = env::args_os()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();

    let result = match args.command {
        Some(Commands::Build(build)) => run_build(config, build, argv),
        Some(Commands::Process(classify)) => run_process(config, classify, argv),
        Some(Commands::Delete(delete)) => run_delete(config, delete, argv),
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:#?}", config);
            Ok(())
        }
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = result {
        error!("Error: {:#}", err);
        drop(guard);
        process::exit(1);
    }
}

fn run_build(mut config: AppConfig, args: BuildArgs, argv: Vec<String>) -> anyhow::Result<()> {
    config.skip_dirs.extend(args.skip);
    config.no_empty |= args.no_empty;
    if let Some(procs) = args.procs {
        config.procs = procs;
    }
    if let Some(algorithm) = args.algorithm {
        config.algorithm = algorithm;
    }
    if let Some(work_root) = args.work_root {
        config.work_root = work_root;
    }

    let engine = DedupeEngine::new(config).with_invocation(argv);
    let reporter = CliReporter::new();
    let result = engine
        .build(&args.directories, &reporter)
        .context("build failed")?;

    for err in &result.traversal_errors {
        warn!("Not searched: {}", err);
    }
    for path in &result.hash_errors {
        warn!("Could not hash: {}", path.display());
    }

    println!();
    info!(
        "Discover: {}, Hash: {}",
        format!("{:.2}s", result.discover_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.hash_duration.as_secs_f64()).green(),
    );
    info!(
        "{} files hashed, {} errors, {} duplicate groups holding {} files",
        format!("{}", result.files_hashed).green(),
        format!("{}", result.hash_errors.len()).red(),
        format!("{}", result.duplicate_groups).red(),
        format!("{}", result.duplicate_files).red(),
    );
    println!("{}", result.session_dir.display());

    Ok(())
}

fn run_process(config: AppConfig, args: ClassifyArgs, argv: Vec<String>) -> anyhow::Result<()> {
    let engine = DedupeEngine::new(config).with_invocation(argv);
    let result = engine
        .process(&args.work_dir, &args.prefixes)
        .with_context(|| format!("process failed for {}", args.work_dir.display()))?;
    print_decision(&result);
    Ok(())
}

fn run_delete(config: AppConfig, args: DeleteArgs, argv: Vec<String>) -> anyhow::Result<()> {
    let engine = DedupeEngine::new(config).with_invocation(argv);
    let classify = args.classify;

    let plan = engine
        .plan_delete(&classify.work_dir, &classify.prefixes)
        .with_context(|| format!("delete failed for {}", classify.work_dir.display()))?;
    print_decision(&plan);
    if plan.decision.delete.is_empty() {
        return Ok(());
    }
    if !args.yes {
        let prompt = format!(
            "Remove the {} files listed in {}?",
            plan.decision.delete.len(),
            plan.session_dir.join(DELETE_FILE).display()
        );
        if !prompt_confirm(&prompt, Some(false))? {
            info!("Nothing deleted");
            return Ok(());
        }
    }

    let reporter = CliReporter::new();
    let result = engine.execute_delete(plan, &reporter);

    for path in &result.report.failed {
        warn!("Not removed: {}", path.display());
    }
    info!(
        "{} removed, {} already gone, {} failed",
        format!("{}", result.report.removed).green(),
        format!("{}", result.report.missing).yellow(),
        format!("{}", result.report.failed.len()).red(),
    );
    Ok(())
}

fn print_decision(result: &ProcessResult) {
    if !result.index_complete {
        warn!("The build for this work directory did not finish; results are partial");
    }
    info!(
        "{} groups ({} with duplicates): keep {}, delete {} ({} bytes), {} errors",
        result.decision.groups,
        format!("{}", result.decision.duplicate_groups).red(),
        format!("{}", result.decision.keep.len()).green(),
        format!("{}", result.decision.delete.len()).red(),
        format!("{}", result.reclaimable_bytes).cyan(),
        format!("{}", result.hash_errors.len()).yellow(),
    );
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(default.unwrap_or(false));
        }

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
