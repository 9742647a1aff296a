use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use volo_operator_backend::{build_app, types::Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "volo_operator_backend=info,volo_vault=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env());

    info!(port = config.port, "Starting Volo Operator Backend");
    info!(
        cors_origins = ?config.cors_origins,
        principal = %config.principal_asset,
        user_keys_configured = !config.api_keys.is_empty(),
        operator_keys_configured = !config.operator_api_keys.is_empty(),
        admin_keys_configured = !config.admin_api_keys.is_empty(),
        "Configuration loaded"
    );

    let app = build_app(config.clone())?;

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
