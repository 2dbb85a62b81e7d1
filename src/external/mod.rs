use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::payment::PaymentRecord;
use crate::models::ride::Ride;

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Checkout and refund operations on the payment provider. The success
/// callback arrives out-of-band through the webhook endpoint.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        reference: &str,
        amount_minor: u64,
        purpose: &str,
    ) -> Result<CheckoutSession, AppError>;

    /// Refunds a captured payment; returns the provider's refund id.
    async fn refund(&self, intent_id: &str) -> Result<String, AppError>;
}

/// Credits the driver's share when a ride completes.
#[async_trait]
pub trait EarningLedger: Send + Sync {
    async fn record_earning(&self, ride: &Ride) -> Result<u64, AppError>;
}

/// Receipt generation, fired on ride confirmation. Failures are logged by
/// the caller and never block dispatch.
#[async_trait]
pub trait InvoiceGenerator: Send + Sync {
    async fn generate(&self, ride: &Ride, payment: &PaymentRecord) -> Result<(), AppError>;
}

/// Email/SMS confirmation, same fire-and-forget contract as invoices.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_booking_confirmation(&self, ride: &Ride) -> Result<(), AppError>;
}

/// Development gateway: fabricates session handles and records every call
/// so callers (and tests) can inspect what was issued.
#[derive(Default)]
pub struct StubGateway {
    sessions: Mutex<Vec<CheckoutSession>>,
    refunds: Mutex<Vec<String>>,
}

impl StubGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refunds(&self) -> Vec<String> {
        self.refunds.lock().unwrap().clone()
    }

    pub fn sessions(&self) -> Vec<CheckoutSession> {
        self.sessions.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_checkout_session(
        &self,
        reference: &str,
        amount_minor: u64,
        purpose: &str,
    ) -> Result<CheckoutSession, AppError> {
        let session = CheckoutSession {
            id: format!("cs_{}", Uuid::new_v4().simple()),
            url: format!("https://checkout.invalid/pay/{reference}"),
        };

        info!(reference, amount_minor, purpose, session_id = %session.id, "checkout session created");
        self.sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }

    async fn refund(&self, intent_id: &str) -> Result<String, AppError> {
        info!(intent_id, "refund issued");
        self.refunds.lock().unwrap().push(intent_id.to_string());
        Ok(format!("re_{}", Uuid::new_v4().simple()))
    }
}

/// Development ledger: computes the driver's share from a fixed percentage
/// of the fare and keeps the entries in memory.
pub struct StubLedger {
    share_pct: u64,
    entries: Mutex<Vec<(Uuid, u64)>>,
}

impl StubLedger {
    pub fn new(share_pct: u64) -> Self {
        Self {
            share_pct,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn entries(&self) -> Vec<(Uuid, u64)> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl EarningLedger for StubLedger {
    async fn record_earning(&self, ride: &Ride) -> Result<u64, AppError> {
        let driver = ride
            .driver
            .ok_or_else(|| AppError::Internal("completed ride has no driver".to_string()))?;

        let share = ride.fare * self.share_pct / 100;
        info!(ride_id = %ride.id, %driver, share, "driver earning recorded");
        self.entries.lock().unwrap().push((driver, share));
        Ok(share)
    }
}

#[derive(Default)]
pub struct StubInvoices;

#[async_trait]
impl InvoiceGenerator for StubInvoices {
    async fn generate(&self, ride: &Ride, payment: &PaymentRecord) -> Result<(), AppError> {
        info!(ride_id = %ride.id, payment_id = %payment.id, "invoice generated");
        Ok(())
    }
}

#[derive(Default)]
pub struct StubMessenger;

#[async_trait]
impl Messenger for StubMessenger {
    async fn send_booking_confirmation(&self, ride: &Ride) -> Result<(), AppError> {
        info!(ride_id = %ride.id, rider = %ride.rider, "booking confirmation sent");
        Ok(())
    }
}
