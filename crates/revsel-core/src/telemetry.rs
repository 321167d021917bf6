//! Tracing initialisation for revsel binaries.
//!
//! Call [`init_tracing`] once at program start. Later calls are ignored
//! because the global subscriber can only be set once per process.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::log::BUILD_LOG_TARGET;

/// Filter directives used when `RUST_LOG` is not set.
///
/// Build-log lines (ignored commits, the all-excluded warning) stay at
/// `info` when `level` is quieter than that.
pub fn default_directives(level: Level) -> String {
    let base = level.as_str().to_ascii_lowercase();
    if level < Level::INFO {
        format!("{base},{BUILD_LOG_TARGET}=info")
    } else {
        base
    }
}

/// Install the global subscriber.
///
/// * `json` emits newline-delimited JSON instead of human-readable lines.
/// * `level` is the default verbosity when `RUST_LOG` is not set.
///
/// Output goes to stderr so command output on stdout stays parseable.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init()
            .ok();
    }
}
