//! # Routes
//!
//! Axum router configuration for the payment API.

use crate::context::REQUEST_ID_HEADER;
use crate::handlers;
use crate::state::{AppConfig, AppState};
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::warn;

/// Create the main application router
///
/// Routes:
///   - GET  /health                        - Health check
///   - POST /checkout                      - Create checkout session
///   - GET  /verify-payment/{session_id}   - Session status
///   - POST /webhook                       - Processor webhook (raw body)
///
/// `/checkout` and `/verify-payment` are rate limited per client IP when
/// `AppConfig::rate_limit` is set.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    let mut client_routes = Router::new()
        .route("/checkout", post(handlers::create_checkout))
        .route("/verify-payment/{session_id}", get(handlers::verify_payment));

    if let Some(limits) = &state.config.rate_limit {
        let governor = GovernorConfigBuilder::default()
            .per_second(limits.replenish_secs)
            .burst_size(limits.burst_size)
            .key_extractor(SmartIpKeyExtractor)
            .finish();

        match governor {
            Some(config) => {
                client_routes = client_routes
                    .layer(GovernorLayer::new(Arc::new(config)))
                    .layer(middleware::map_response(handlers::rate_limited_json));
            }
            None => warn!("Invalid rate limit settings {:?}; throttling disabled", limits),
        }
    }

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/health", get(handlers::health))
        .merge(client_routes)
        .route("/webhook", post(handlers::webhook))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(request_id))
                .layer(cors),
        )
        .with_state(state)
}

/// CORS restricted to the configured frontend origin
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origin = match HeaderValue::from_str(&config.frontend_url) {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(_) => {
            warn!(
                "FRONTEND_URL is not a valid origin: {}; cross-origin requests disabled",
                config.frontend_url
            );
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}
