//! stderr tracing for operators.
//!
//! Tracing carries progress and diagnostics only. The record of what was
//! changed lives in the journals (`io::journal`), which are written whatever
//! `RUST_LOG` says.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Used when `RUST_LOG` is unset or unparsable.
const DEFAULT_DIRECTIVES: &str = "labelsync=info";

/// Install the stderr subscriber, e.g.
/// `RUST_LOG=labelsync::io=debug labelsync run -e nb --dry-run`.
pub fn init() {
    let filter = env_filter(std::env::var("RUST_LOG").ok().as_deref());
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();
    // A second call keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init();
}

fn env_filter(directives: Option<&str>) -> EnvFilter {
    match directives.map(EnvFilter::try_new) {
        Some(Ok(filter)) => filter,
        Some(Err(_)) | None => EnvFilter::new(DEFAULT_DIRECTIVES),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_info_for_the_crate() {
        assert_eq!(env_filter(None).to_string(), DEFAULT_DIRECTIVES);
        assert_eq!(env_filter(Some("labelsync=loud")).to_string(), DEFAULT_DIRECTIVES);
    }

    #[test]
    fn honours_explicit_directives() {
        assert_eq!(env_filter(Some("labelsync=debug")).to_string(), "labelsync=debug");
    }

    #[test]
    fn repeated_init_is_harmless() {
        init();
        init();
    }
}
