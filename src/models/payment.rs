use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Refunded,
}

/// A completed payment as reported by the gateway's success callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub session_id: String,
    pub intent_id: String,
    /// Amount in minor currency units, as the gateway reports it.
    pub amount_minor: u64,
    pub currency: String,
    pub method: String,
    pub status: PaymentStatus,
    pub refund_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
