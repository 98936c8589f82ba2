// Tracing setup for embedding shells and tests

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Install the global fmt subscriber once. `RUST_LOG` wins over the configured filter.
pub fn init_tracing(config: &Config) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.logging.default_filter));

        // Another subscriber may already be installed by the host application
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    });
}
