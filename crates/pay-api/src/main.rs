//! # checkout-relay
//!
//! Hosted-checkout backend with operator email alerts.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export STRIPE_SECRET_KEY=sk_test_...
//! export STRIPE_WEBHOOK_SECRET=whsec_...
//! export EMAIL_USER=alerts@example.com
//! export EMAIL_PASSWORD=...
//!
//! # Run the server
//! checkout-relay
//! ```

use pay_api::{routes, state::AppConfig, state::AppState};
use std::net::SocketAddr;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    // JSON logs in production, human-readable otherwise
    let is_prod = config.is_production();
    tracing_subscriber::registry()
        .with(is_prod.then(|| fmt::layer().json()))
        .with((!is_prod).then(|| fmt::layer()))
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    print_banner();

    let addr = config.socket_addr()?;
    let state = AppState::new(config)?;

    info!("Environment: {}", state.config.environment);
    info!("Payment provider: {}", state.gateway.provider_name());
    info!("Frontend: {}", state.config.frontend_url);
    match &state.config.rate_limit {
        Some(limits) => info!(
            "Rate limit: burst={}, replenish every {}s",
            limits.burst_size, limits.replenish_secs
        ),
        None => info!("Rate limit: disabled"),
    }

    let app = routes::create_router(state);

    info!("🚀 checkout-relay starting on http://{}", addr);

    if !is_prod {
        info!("📝 Health: http://{}/health", addr);
        info!("💳 Checkout: POST http://{}/checkout", addr);
        info!("🔔 Webhook: POST http://{}/webhook", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn print_banner() {
    println!(
        r#"
  checkout-relay
  ━━━━━━━━━━━━━━━━━━━━━━━
  Hosted checkout + payment alerts
  Version: {}
  
"#,
        env!("CARGO_PKG_VERSION")
    );
}
