use dashmap::DashMap;
use uuid::Uuid;

use crate::models::payment::{PaymentRecord, PaymentStatus};

#[derive(Default)]
pub struct PaymentStore {
    payments: DashMap<Uuid, PaymentRecord>,
}

impl PaymentStore {
    pub fn new() -> Self {
        Self {
            payments: DashMap::new(),
        }
    }

    pub fn insert(&self, payment: PaymentRecord) {
        self.payments.insert(payment.id, payment);
    }

    pub fn get(&self, id: &Uuid) -> Option<PaymentRecord> {
        self.payments.get(id).map(|entry| entry.value().clone())
    }

    pub fn mark_refunded(&self, id: &Uuid, refund_id: Option<String>) -> Option<PaymentRecord> {
        let mut entry = self.payments.get_mut(id)?;
        let payment = entry.value_mut();
        payment.status = PaymentStatus::Refunded;
        payment.refund_id = refund_id;
        Some(payment.clone())
    }
}
