//! Tracing bootstrap.

use tracing_subscriber::EnvFilter;

/// Installs a global `fmt` subscriber writing to stderr.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` (e.g.
/// `"murmur=info"`) is used. Calling this more than once is harmless, the
/// first subscriber stays in place.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .is_err()
    {
        tracing::debug!("tracing subscriber already installed");
    }
}
