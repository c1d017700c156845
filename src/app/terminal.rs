//! Terminal detection and tracing setup.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Filter for the diagnostic log file; independent of `-v`/`-q` and `RUST_LOG`.
const DETAILED_LOG_DIRECTIVES: &str = "warn,exporter=debug,exporter_core=debug";

pub(crate) fn no_color_env_requested() -> bool {
    std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty())
}

pub(crate) fn is_dumb_terminal() -> bool {
    std::env::var("TERM")
        .map(|value| value.eq_ignore_ascii_case("dumb"))
        .unwrap_or(false)
}

pub(crate) fn should_use_progress(stderr_is_terminal: bool, quiet: bool, dumb_terminal: bool) -> bool {
    stderr_is_terminal && !quiet && !dumb_terminal
}

/// Console log level for the given flags.
///
/// While the progress UI owns the terminal only warnings are printed by
/// default; activity lines are shown in the UI's log pane instead.
pub(crate) fn console_level(verbose: u8, quiet: bool, progress_ui: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 if progress_ui => "warn",
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Installs the console layer and, when the file can be created, the
/// diagnostic file layer.
///
/// `detailed_log` is truncated first. `RUST_LOG` overrides the console level
/// only.
pub(crate) fn init_tracing(console_level: &str, no_color: bool, detailed_log: &Path) {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(console_level));
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_target(false)
        .with_filter(console_filter);

    let detailed = match File::create(detailed_log) {
        Ok(file) => Some(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_filter(EnvFilter::new(DETAILED_LOG_DIRECTIVES)),
        ),
        Err(e) => {
            eprintln!(
                "warning: cannot write detailed log {}: {e}",
                detailed_log.display()
            );
            None
        }
    };

    let _ = tracing_subscriber::registry()
        .with(console)
        .with(detailed)
        .try_init();
}
