//! HTTP handlers: webhook, health and learner inspection

use axum::{
    extract::{rejection::FormRejection, Form, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::messaging::twilio::{twiml_empty, twiml_message, TwilioWebhook};
use crate::server::ServerState;
use crate::vocabulary::strip_markers;

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

fn xml(body: String) -> impl IntoResponse {
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/xml")], body)
}

/// Twilio webhook. Always answers 200 with TwiML so the platform does not
/// retry; payloads without a sender or text get an empty response.
pub async fn webhook_handler(
    State(state): State<ServerState>,
    payload: Result<Form<TwilioWebhook>, FormRejection>,
) -> impl IntoResponse {
    let payload = match payload {
        Ok(Form(payload)) => payload,
        Err(e) => {
            warn!("Unreadable webhook payload: {}", e);
            return xml(twiml_empty());
        }
    };

    let Some(inbound) = payload.into_inbound() else {
        warn!("Webhook without sender or message body, ignoring");
        return xml(twiml_empty());
    };

    info!("Message reçu de {}: {}", inbound.from, inbound.body);

    let reply = state.tutor.get_reply(&inbound.from, &inbound.body).await;
    xml(twiml_message(&strip_markers(&reply)))
}

/// Liveness probe
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "WhatsApp French Tutor is running!".to_string(),
    })
}

/// Every learner with a vocabulary record
pub async fn list_users_handler(State(state): State<ServerState>) -> impl IntoResponse {
    Json(state.tutor.vocabulary().get_all_users().await)
}

/// Summary for one learner
pub async fn user_stats_handler(
    State(state): State<ServerState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    match state.tutor.vocabulary().get_stats(&user_id).await {
        Some(stats) => (StatusCode::OK, Json(json!(stats))).into_response(),
        None => not_found(&user_id),
    }
}

/// Full vocabulary and corrections for one learner
pub async fn user_vocabulary_handler(
    State(state): State<ServerState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    match state.tutor.vocabulary().get_user_vocabulary(&user_id).await {
        Some(record) => (StatusCode::OK, Json(json!(record))).into_response(),
        None => not_found(&user_id),
    }
}

fn not_found(user_id: &str) -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Unknown user", "user": user_id })),
    )
        .into_response()
}
