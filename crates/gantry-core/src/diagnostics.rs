use tracing_subscriber::EnvFilter;

/// Installs the global fmt subscriber so embedding front ends can surface
/// the core's events. Filtering follows `RUST_LOG`, defaulting to `info`.
/// Safe to call more than once; later calls keep the first subscriber.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
