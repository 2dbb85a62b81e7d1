use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::post;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::dispatch;
use crate::models::payment::{PaymentRecord, PaymentStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/payments/webhook", post(payment_webhook))
}

/// Completed-payment callback from the gateway.
#[derive(Deserialize)]
pub struct PaymentWebhook {
    pub session_id: String,
    pub intent_id: String,
    pub amount: u64,
    pub currency: String,
    pub method: String,
    pub status: String,
}

/// Webhooks are acknowledged no matter what: a business failure here is
/// handled internally (failed ride + refund) and must not make the
/// gateway retry forever.
async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PaymentWebhook>,
) -> Json<Value> {
    if payload.status != "paid" {
        info!(session_id = %payload.session_id, status = %payload.status, "ignoring non-success payment event");
        return Json(json!({ "received": true }));
    }

    let payment = PaymentRecord {
        id: Uuid::new_v4(),
        session_id: payload.session_id,
        intent_id: payload.intent_id,
        amount_minor: payload.amount,
        currency: payload.currency,
        method: payload.method,
        status: PaymentStatus::Paid,
        refund_id: None,
        created_at: Utc::now(),
    };

    let start = Instant::now();
    let result = dispatch::confirm_and_dispatch(&state, payment).await;

    let outcome_label = if result.is_ok() { "success" } else { "error" };
    state
        .metrics
        .dispatch_latency_seconds
        .with_label_values(&[outcome_label])
        .observe(start.elapsed().as_secs_f64());

    if let Err(err) = result {
        warn!(error = %err, "payment webhook could not be applied");
    }

    Json(json!({ "received": true }))
}
