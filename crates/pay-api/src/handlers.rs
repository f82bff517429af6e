//! # Request Handlers
//!
//! Axum request handlers for checkout creation, payment verification, and
//! the processor webhook.

use crate::context::RequestContext;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use pay_core::{
    CheckoutRequest, CustomerDetails, OrderRequest, PaymentDetails, PaymentError, WebhookEventType,
};
use pay_stripe::CheckoutCompletedData;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

pub const SIGNATURE_HEADER: &str = "stripe-signature";

// =============================================================================
// Request/Response Types
// =============================================================================

/// Create checkout response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutResponse {
    pub status: &'static str,
    /// Hosted checkout URL (redirect user here)
    pub url: String,
    pub session_id: String,
}

/// Verify payment response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentResponse {
    pub status: &'static str,
    pub payment_status: String,
    /// Major units, two decimals
    pub amount: String,
    pub customer_details: Option<CustomerDetails>,
    pub payment_details: Option<PaymentDetails>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn status_of(err: &PaymentError) -> StatusCode {
    StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Message safe to show a client for a 4xx error
fn client_message(err: &PaymentError) -> String {
    match err {
        PaymentError::InvalidRequest(msg)
        | PaymentError::WebhookVerificationFailed(msg)
        | PaymentError::WebhookParseError(msg) => msg.clone(),
        PaymentError::SessionNotFound { .. } => "Payment session not found".to_string(),
        other => other.to_string(),
    }
}

/// Render a `PaymentError`: client errors carry their own message, server
/// errors get `generic` plus details outside production.
fn payment_error_to_response(state: &AppState, err: &PaymentError, generic: &str) -> ApiError {
    let status = status_of(err);
    if err.is_client_error() {
        return (status, Json(ErrorResponse::new(client_message(err))));
    }

    let mut response = ErrorResponse::new(generic);
    if state.config.expose_error_details() {
        response = response.with_details(err.to_string());
    }
    (status, Json(response))
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

/// Create a hosted checkout session
#[instrument(skip_all, fields(request_id = %ctx.request_id))]
pub async fn create_checkout(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: Result<Json<OrderRequest>, JsonRejection>,
) -> Result<Json<CreateCheckoutResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| {
        warn!("Rejected checkout body: {}", e);
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Invalid request body")),
        )
    })?;

    let order = request.validate().map_err(|e| {
        info!("Checkout validation failed: {}", e);
        payment_error_to_response(&state, &e, "Invalid request")
    })?;

    info!(
        "Creating checkout: provider={}, username={}, amount={}, ip={}",
        order.server_provider,
        order.username,
        order.display_amount(),
        ctx.client_ip
    );

    let checkout = CheckoutRequest {
        order,
        request_id: ctx.request_id,
        idempotency_key: uuid::Uuid::new_v4().to_string(),
        client_ip: ctx.client_ip,
        success_url: state.urls.success_url(),
        cancel_url: state.urls.cancel_url(),
    };

    let session = state
        .gateway
        .create_checkout(&checkout)
        .await
        .map_err(|e| {
            error!("Failed to create checkout: {}", e);
            payment_error_to_response(&state, &e, "Failed to create checkout session")
        })?;

    info!("Created checkout session: {}", session.session_id);

    Ok(Json(CreateCheckoutResponse {
        status: "success",
        url: session.checkout_url,
        session_id: session.session_id,
    }))
}

/// Report the current state of a checkout session
#[instrument(skip(state))]
pub async fn verify_payment(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<VerifyPaymentResponse>, ApiError> {
    if !state.gateway.is_valid_session_id(&session_id) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Invalid session ID")),
        ));
    }

    let summary = state
        .gateway
        .retrieve_session(&session_id)
        .await
        .map_err(|e| {
            match &e {
                PaymentError::SessionNotFound { .. } => info!("Unknown session: {}", session_id),
                _ => error!("Failed to verify payment: {}", e),
            }
            payment_error_to_response(&state, &e, "Failed to verify payment")
        })?;

    info!(
        "Verified session {}: payment_status={}",
        session_id, summary.payment_status
    );

    Ok(Json(VerifyPaymentResponse {
        status: "success",
        amount: summary.display_amount(),
        payment_status: summary.payment_status,
        customer_details: summary.customer,
        payment_details: summary.payment,
    }))
}

/// Handle the processor webhook.
///
/// Once the signature verifies the reply is always 200: a failed operator
/// email is logged, not reported, so the processor does not redeliver.
#[instrument(skip_all)]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers.get(SIGNATURE_HEADER).ok_or_else(|| {
        warn!("Webhook without {} header", SIGNATURE_HEADER);
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Missing stripe-signature header")),
        )
    })?;
    let signature = signature.to_str().map_err(|_| {
        warn!("Webhook {} header is not visible ASCII", SIGNATURE_HEADER);
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Invalid stripe-signature header")),
        )
    })?;

    let event = state
        .gateway
        .verify_webhook(&body, signature)
        .await
        .map_err(|e| {
            warn!("Webhook verification failed: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(format!(
                    "Webhook Error: {}",
                    client_message(&e)
                ))),
            )
        })?;

    info!(
        "Received webhook: type={:?}, id={}",
        event.event_type, event.event_id
    );

    if event.is_paid_checkout() {
        match CheckoutCompletedData::from_event(&event) {
            Ok(data) => {
                let notification = data.to_notification();
                if !state.notifier.notify(&notification).await {
                    error!(
                        "Payment notification not delivered: session={}, payment={}",
                        data.session_id,
                        data.payment_id()
                    );
                }
            }
            Err(e) => error!("Unusable checkout.session.completed event: {}", e),
        }
    } else if event.event_type == WebhookEventType::CheckoutCompleted {
        info!(
            "Checkout completed without payment: session={:?}, payment_status={:?}",
            event.session_id, event.payment_status
        );
    } else {
        debug!("Ignoring webhook event: {:?}", event.event_type);
    }

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "received": true })),
    ))
}

/// Give throttled requests the same error body as every other failure.
///
/// Headers set by the limiter (`retry-after`, `x-ratelimit-*`) are kept.
pub async fn rate_limited_json(response: Response) -> Response {
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        return response;
    }

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_TYPE);
    parts.headers.remove(header::CONTENT_LENGTH);
    warn!("Rate limit exceeded");

    (
        parts,
        Json(ErrorResponse::new(
            "Too many requests, please try again later.",
        )),
    )
        .into_response()
}
