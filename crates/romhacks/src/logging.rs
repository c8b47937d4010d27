//! Logging setup for the CLI and the server.
//!
//! `RUST_LOG` wins when set. Otherwise the verbosity flags choose the
//! directives: this crate logs at `info` by default, and the per-request
//! events from `tower_http` only show up from `-v` on. Log lines go to
//! stderr so that `--json` output on stdout stays parseable.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// This crate at info, everything else at warn.
    #[default]
    Normal,
    /// Debug output, including one line per HTTP request.
    Verbose,
    /// Trace output for this crate and the request layer.
    Trace,
}

impl Verbosity {
    /// Filter directives used when `RUST_LOG` is not set.
    #[must_use]
    pub fn directives(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn,romhacks=info",
            Self::Verbose => "warn,romhacks=debug,tower_http=debug",
            Self::Trace => "info,romhacks=trace,tower_http=trace",
        }
    }

    fn show_targets(self) -> bool {
        matches!(self, Self::Verbose | Self::Trace)
    }
}

fn env_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.directives()))
}

/// Install the global subscriber.
///
/// Returns `false` if a subscriber was already installed, in which case the
/// existing one is kept.
///
/// # Examples
///
/// ```no_run
/// use romhacks::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) -> bool {
    tracing_subscriber::registry()
        .with(env_filter(verbosity))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbosity.show_targets()),
        )
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Verbosity; 4] = [
        Verbosity::Quiet,
        Verbosity::Normal,
        Verbosity::Verbose,
        Verbosity::Trace,
    ];

    #[test]
    fn test_directives_parse() {
        for verbosity in ALL {
            assert!(
                EnvFilter::try_new(verbosity.directives()).is_ok(),
                "{verbosity:?}"
            );
        }
    }

    #[test]
    fn test_requests_logged_only_when_verbose() {
        assert!(!Verbosity::Quiet.directives().contains("tower_http"));
        assert!(!Verbosity::Normal.directives().contains("tower_http"));
        assert!(Verbosity::Verbose
            .directives()
            .contains("tower_http=debug"));
        assert!(Verbosity::Trace.directives().contains("tower_http=trace"));
    }

    #[test]
    fn test_targets_shown_when_verbose() {
        assert!(!Verbosity::Normal.show_targets());
        assert!(Verbosity::Verbose.show_targets());
        assert_eq!(Verbosity::default(), Verbosity::Normal);
    }

    #[test]
    fn test_second_init_keeps_first_subscriber() {
        init_logging(Verbosity::Quiet);
        assert!(!init_logging(Verbosity::Trace));
    }
}
