//! Tracing subscriber setup for binaries and tests that embed this crate.
//!
//! The library itself only emits `tracing` events; nothing is printed unless
//! the host installs a subscriber, either its own or the one below.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "stampede_bulk=info";

/// Installs a global fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive`.
///
/// Returns `false` if a global subscriber was already set; calling this more
/// than once is harmless.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_level(true))
        .try_init()
        .is_ok();

    if !installed {
        tracing::debug!("Global tracing subscriber already initialized - keeping existing one");
    }

    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_harmless() {
        init_tracing(DEFAULT_DIRECTIVE);
        assert!(!init_tracing(DEFAULT_DIRECTIVE));
    }
}
