//! Logging initialization (C10), following the registry/`EnvFilter`
//! layering the teacher's service binaries use.

use std::sync::Once;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Installs a `tracing-subscriber` `EnvFilter` + fmt layer once per
/// process. Safe to call from every test module: subsequent calls are
/// no-ops.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "order_gateway=info,feed_common=info".into()),
            )
            .with(tracing_subscriber::fmt::layer())
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
