use example_app::{app, init_tracing, AppState};
use oar::OarConfig;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_tracing();

    // Missing file is fine; OAR_* variables still apply.
    let config = OarConfig::load("oar.yaml").unwrap_or_else(|e| {
        tracing::warn!(error = %e, "invalid configuration, using defaults");
        OarConfig::default()
    });

    let api_key = std::env::var("ITEMS_API_KEY").unwrap_or_else(|_| "dev-key".to_string());
    let router = app(&config, AppState::new(&api_key)).map_err(std::io::Error::other)?;

    let addr = std::env::var("ITEMS_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, docs = "/doc", "items service listening");
    axum::serve(listener, router).await
}
