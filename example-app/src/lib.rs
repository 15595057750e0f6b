//! Items service built on oar's axum binder.

pub mod models;
pub mod routes;
pub mod store;

pub use routes::{app, AppState};

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// Respects `RUST_LOG`; falls back to `info,oar_core=debug`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,oar_core=debug")),
        )
        .init();
}
