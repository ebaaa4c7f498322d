pub mod service_definition;

use tracing_subscriber::EnvFilter;

/// Address the demo server listens on and the demo clients dial.
pub const DEMO_HOST: &str = "127.0.0.1";
pub const DEMO_PORT: u16 = 8889;

/// Installs a `tracing` subscriber honoring `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
