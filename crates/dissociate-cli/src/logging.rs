use crate::error::Result;
use std::fs::File;
use std::path::PathBuf;
use tracing::Subscriber;
use tracing_subscriber::{
    Layer,
    filter::{LevelFilter, Targets},
    fmt,
    prelude::*,
    registry::LookupSpan,
};

/// Target prefix shared by the library and the binary.
const CRATE_TARGET: &str = "dissociate";

fn level_filter(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::OFF;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Our own events at `level`; dependencies never below warnings.
fn crate_filter(level: LevelFilter) -> Targets {
    Targets::new()
        .with_target(CRATE_TARGET, level)
        .with_default(level.min(LevelFilter::WARN))
}

/// Plain-text layer for `--log-file`. It records at least debug events so that a
/// requested log file is useful even for a quiet console.
fn file_layer<S>(file: File, console_level: LevelFilter) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_target(true)
        .with_filter(crate_filter(console_level.max(LevelFilter::DEBUG)))
}

pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<PathBuf>) -> Result<()> {
    let level = level_filter(verbosity, quiet);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact()
        .with_filter(crate_filter(level));

    let log_file_layer = match log_file {
        Some(path) => Some(file_layer(File::create(&path)?, level)),
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(log_file_layer)
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use serial_test::serial;
    use std::sync::Once;
    use tracing::{Level, debug, error, info, trace, warn};

    static INIT: Once = Once::new();

    fn ensure_global_logger_is_set() {
        INIT.call_once(|| {
            setup_logging(3, false, None).expect("Failed to set up global logger for tests");
        });
    }

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(level_filter(0, false), LevelFilter::WARN);
        assert_eq!(level_filter(1, false), LevelFilter::INFO);
        assert_eq!(level_filter(2, false), LevelFilter::DEBUG);
        assert_eq!(level_filter(7, false), LevelFilter::TRACE);
        assert_eq!(level_filter(2, true), LevelFilter::OFF);
    }

    #[test]
    fn dependencies_are_capped_at_warnings() {
        let filter = crate_filter(LevelFilter::DEBUG);
        assert!(filter.would_enable("dissociate::engine::extractor", &Level::DEBUG));
        assert!(!filter.would_enable("dissociate::engine::extractor", &Level::TRACE));
        assert!(!filter.would_enable("rayon_core::registry", &Level::INFO));
        assert!(filter.would_enable("rayon_core::registry", &Level::WARN));

        let quiet = crate_filter(LevelFilter::OFF);
        assert!(!quiet.would_enable("dissociate", &Level::ERROR));
        assert!(!quiet.would_enable("rayon_core", &Level::ERROR));
    }

    #[test]
    #[serial]
    fn initialization_and_macros_work() {
        ensure_global_logger_is_set();

        error!("This is an error");
        warn!("This is a warning");
        info!("This is info");
        debug!("This is debug");
        trace!("This is trace");
    }

    #[test]
    #[serial]
    fn log_file_records_debug_events_of_this_crate_only() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("test.log");

        let file = File::create(&log_path).unwrap();
        let subscriber = tracing_subscriber::registry().with(file_layer(file, LevelFilter::OFF));

        tracing::subscriber::with_default(subscriber, || {
            debug!(target: "dissociate::workflows::extract", "Loaded 5 molecules.");
            info!(target: "rayon_core", "Worker thread started.");
        });

        let content = std::fs::read_to_string(log_path).unwrap();
        assert!(content.contains("Loaded 5 molecules."));
        assert!(content.contains("DEBUG"));
        assert!(content.contains("ThreadId"));
        assert!(!content.contains("Worker thread started."));
    }

    #[test]
    #[serial]
    fn invalid_log_file_path_propagates_error() {
        let invalid_path = PathBuf::from("/");

        if cfg!(unix) && invalid_path.is_dir() {
            let result = setup_logging(0, false, Some(invalid_path));
            assert!(matches!(result, Err(CliError::Io(_))));
        }
    }
}
