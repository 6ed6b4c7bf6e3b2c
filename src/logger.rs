//! Logging initialisation via tracing-subscriber.
//!
//! A bare level such as `"debug"` applies to this crate and the HTTP layer
//! only; dependencies (hyper, reqwest, rusqlite) stay at `warn` so request
//! tracing is not drowned in connection-pool chatter.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Crates whose events follow the configured level.
const SCOPED_TARGETS: [&str; 2] = ["greenweb", "tower_http"];

/// Turn `level` into an `EnvFilter` directive string.
///
/// A bare level is scoped to [`SCOPED_TARGETS`] over a `warn` baseline.
/// Anything else (`"greenweb=trace,hyper=debug"`) is passed through as-is.
pub fn directive(level: &str) -> String {
    let level = level.trim();
    match level.parse::<LevelFilter>() {
        Ok(filter) if !level.is_empty() => {
            let scoped: Vec<String> = SCOPED_TARGETS.iter().map(|t| format!("{t}={filter}")).collect();
            let baseline = LevelFilter::WARN.min(filter);
            format!("{baseline},{}", scoped.join(","))
        }
        _ => level.to_string(),
    }
}

/// Install the global subscriber, writing to stderr.
///
/// When `level` came from the command line (`prefer_level`), it wins over
/// `RUST_LOG`; otherwise `RUST_LOG` wins and `level` is the fallback.
pub fn init(level: &str, prefer_level: bool) -> Result<(), AppError> {
    let from_level = || {
        EnvFilter::try_new(directive(level))
            .map_err(|e| AppError::Logger(format!("invalid log level '{level}': {e}")))
    };
    let filter = if prefer_level {
        from_level()?
    } else {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => from_level()?,
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_level_is_scoped() {
        assert_eq!(directive("debug"), "warn,greenweb=debug,tower_http=debug");
        assert_eq!(directive(" info "), "warn,greenweb=info,tower_http=info");
    }

    #[test]
    fn quiet_level_lowers_baseline() {
        assert_eq!(directive("error"), "error,greenweb=error,tower_http=error");
    }

    #[test]
    fn full_directive_passes_through() {
        assert_eq!(directive("greenweb=trace,hyper=debug"), "greenweb=trace,hyper=debug");
    }

    #[test]
    fn invalid_level_errors() {
        assert!(matches!(init("greenweb=notalevel", true), Err(AppError::Logger(_))));
    }

    #[test]
    fn init_info_succeeds_or_already_init() {
        // May already be set by another test in the same process.
        match init("info", false) {
            Ok(()) => {}
            Err(AppError::Logger(msg)) if msg.contains("set subscriber") => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}
