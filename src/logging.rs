//! Logging setup for the provider process.
//!
//! Logs go to **stderr**; stdout carries only the handshake line. Levels are
//! controlled through `RUST_LOG`:
//!
//! ```bash
//! # Default
//! RUST_LOG=info terraform-provider-instana
//!
//! # Trace the REST calls
//! RUST_LOG=terraform_provider_instana::restapi=debug terraform-provider-instana
//! ```

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn install(default_level: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(filter(default_level))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .try_init()
}

/// Initialize logging at `info` unless `RUST_LOG` says otherwise.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Initialize logging with a custom default level.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    if let Err(e) = install(default_level) {
        panic!("logging already initialized: {}", e);
    }
}

/// Try to initialize logging, returning false if a subscriber is already set.
pub fn try_init_logging() -> bool {
    install("info").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("terraform_provider_instana=debug").is_ok());
        assert!(EnvFilter::try_new("warn,terraform_provider_instana::restapi=debug").is_ok());
    }

    #[test]
    fn test_second_init_is_rejected() {
        let _ = try_init_logging();
        assert!(!try_init_logging());
    }
}
