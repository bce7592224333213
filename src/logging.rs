use duped::config::LogSettings;
use std::env;
use std::path::Path;
use tracing::debug;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_NAME: &str = "duped.log";

/// `TRACING_LEVEL` wins, then `--verbose`, then the configured level.
fn filter_directive(from_env: Option<String>, verbose: bool, configured: &str) -> String {
    match from_env {
        Some(directive) if !directive.trim().is_empty() => directive,
        _ if verbose => "debug".to_string(),
        _ => configured.to_string(),
    }
}

/// Split the configured log file into the directory and file name the appender wants.
fn appender_target(file: &Path) -> (&Path, &Path) {
    let dir = match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let name = file
        .file_name()
        .map(Path::new)
        .unwrap_or(Path::new(DEFAULT_LOG_NAME));
    (dir, name)
}

/// Install stdout and file logging. Keep the returned guard alive until exit so
/// the file writer drains.
pub fn init_logger(verbose: bool, settings: &LogSettings) -> impl Drop {
    let directive = filter_directive(env::var("TRACING_LEVEL").ok(), verbose, &settings.level);
    let filter_layer = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let (dir, name) = appender_target(&settings.file);
    let (non_blocking, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_target(false)
                .without_time()
                .with_ansi(true),
        )
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_thread_names(true)
                .with_ansi(false),
        )
        .with(filter_layer)
        .init();

    debug!(
        "Logging at '{}' to stdout and {}",
        directive,
        settings.file.display()
    );

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_precedence() {
        assert_eq!(filter_directive(Some("trace".into()), true, "warn"), "trace");
        assert_eq!(filter_directive(Some(" ".into()), true, "warn"), "debug");
        assert_eq!(filter_directive(None, true, "warn"), "debug");
        assert_eq!(filter_directive(None, false, "warn"), "warn");
    }

    #[test]
    fn test_appender_target() {
        assert_eq!(
            appender_target(Path::new("logs/duped.log")),
            (Path::new("logs"), Path::new("duped.log"))
        );
        assert_eq!(
            appender_target(Path::new("run.log")),
            (Path::new("."), Path::new("run.log"))
        );
        assert_eq!(
            appender_target(Path::new("/var/log/duped.log")),
            (Path::new("/var/log"), Path::new("duped.log"))
        );
    }
}
