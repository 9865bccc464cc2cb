use std::sync::Arc;

use wallshare::baas::BaasClient;
use wallshare::config::AppConfig;
use wallshare::{routes, state};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env().expect("invalid configuration");
    let client = BaasClient::new(&config.backend).expect("backend client init failed");
    let port = config.port;
    let state = state::AppState::new(config, Arc::new(client));

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "wallshare listening");
    axum::serve(listener, app).await.expect("server failed");
}
