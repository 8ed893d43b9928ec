use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "scout_ratings=info";

/// Installs the fmt subscriber. `RUST_LOG` overrides the default filter.
/// Calling it twice is harmless; the second install is ignored.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
