use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use flowgate_core::errors::{CryptoError, FlowError, InterfaceError};
use flowgate_core::{EncryptedEnvelope, FlowRequestHandler};
use tracing::warn;
use uuid::Uuid;

#[derive(Clone)]
pub struct WebhookState {
    handler: Arc<FlowRequestHandler>,
}

pub fn router(path: &str, handler: Arc<FlowRequestHandler>) -> Router {
    Router::new().route(path, post(flow_endpoint)).with_state(WebhookState { handler })
}

/// Body is parsed by hand so a malformed envelope answers 400 in plain text
/// instead of axum's JSON rejection.
pub async fn flow_endpoint(State(state): State<WebhookState>, body: Bytes) -> Response {
    let envelope = match serde_json::from_slice::<EncryptedEnvelope>(&body) {
        Ok(envelope) => envelope,
        Err(error) => {
            let correlation_id = Uuid::new_v4().to_string();
            warn!(
                event_name = "flow.request.invalid_envelope",
                correlation_id = %correlation_id,
                error = %error,
                "flow request body is not an encrypted envelope"
            );
            return error_response(
                FlowError::from(CryptoError::InvalidEnvelope(error.to_string()))
                    .into_interface(correlation_id),
            );
        }
    };

    match state.handler.handle(&envelope).await {
        Ok(encrypted) => plain_text(StatusCode::OK, encrypted),
        Err(error) => error_response(error),
    }
}

fn error_response(error: InterfaceError) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    plain_text(status, error.user_message().to_string())
}

fn plain_text(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "text/plain")], body).into_response()
}
