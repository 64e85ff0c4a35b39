//! Retell call lifecycle webhook endpoint

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::Instrument;

use super::error::WebhookError;
use super::retell::{signature, WebhookEvent};
use super::AppState;

/// Rate-limit key: first `x-forwarded-for` hop, else `x-real-ip`.
pub fn client_ip(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded.or(real_ip).unwrap_or("unknown").to_string()
}

pub async fn handle_retell_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = format!("{:08x}", rand::random::<u32>());
    let span = tracing::info_span!("retell_webhook", request_id = %request_id);

    process(&state, &headers, &body)
        .instrument(span)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn process(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<Response, WebhookError> {
    let ip = client_ip(headers);
    if state
        .rate_limiter
        .is_rate_limited(&ip, state.rate_limit, state.rate_window)
        .await
    {
        tracing::warn!("Rate limit exceeded for {}", ip);
        return Err(WebhookError::RateLimited);
    }

    let Some(secret) = state.webhook_secret.as_deref() else {
        return Err(WebhookError::NotConfigured);
    };

    let Some(signature_header) = headers.get(signature::SIGNATURE_HEADER) else {
        return Err(WebhookError::Unauthorized("Missing signature header"));
    };

    let valid = signature_header
        .to_str()
        .map(|sig| signature::verify(body, secret, sig))
        .unwrap_or(false);
    if !valid {
        return Err(WebhookError::Unauthorized("Invalid webhook signature"));
    }

    let payload: Value = serde_json::from_slice(body)
        .map_err(|e| WebhookError::BadRequest(format!("Invalid JSON payload: {}", e)))?;

    let event = WebhookEvent::parse(payload)?;
    tracing::info!("Received Retell webhook: {}", event.name());

    let lifecycle = &state.lifecycle;
    let outcome = match event {
        WebhookEvent::CallStarted(call) => lifecycle.on_call_started(call).await?,
        WebhookEvent::CallEnded(call) => lifecycle.on_call_ended(call).await?,
        WebhookEvent::CallAnalyzed(call) => lifecycle.on_call_analyzed(call).await?,
        WebhookEvent::Unhandled { event_type } => {
            tracing::info!("Ignoring event type {:?}", event_type);
            return Ok(Json(json!({
                "success": true,
                "message": "Event type not handled",
                "eventType": event_type,
            }))
            .into_response());
        }
    };

    Ok(Json(outcome).into_response())
}
