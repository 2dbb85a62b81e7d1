use std::sync::Arc;

use crate::config::DispatchConfig;
use crate::external::{
    EarningLedger, InvoiceGenerator, Messenger, PaymentGateway, StubGateway, StubInvoices,
    StubLedger, StubMessenger,
};
use crate::notify::Notifier;
use crate::observability::metrics::Metrics;
use crate::store::drivers::DriverDirectory;
use crate::store::payments::PaymentStore;
use crate::store::rides::RideStore;
use crate::store::temp_rides::TempRideStore;

pub struct AppState {
    pub dispatch: DispatchConfig,
    pub rides: RideStore,
    pub temp_rides: TempRideStore,
    pub drivers: DriverDirectory,
    pub payments: PaymentStore,
    pub notifier: Notifier,
    pub gateway: Arc<dyn PaymentGateway>,
    pub earnings: Arc<dyn EarningLedger>,
    pub invoices: Arc<dyn InvoiceGenerator>,
    pub messenger: Arc<dyn Messenger>,
    pub metrics: Metrics,
}

impl AppState {
    /// State wired with the development stubs; the binary and most tests
    /// use this.
    pub fn new(dispatch: DispatchConfig, event_buffer_size: usize) -> Self {
        let share_pct = dispatch.driver_share_pct;

        Self::with_collaborators(
            dispatch,
            event_buffer_size,
            Arc::new(StubGateway::new()),
            Arc::new(StubLedger::new(share_pct)),
            Arc::new(StubInvoices),
            Arc::new(StubMessenger),
        )
    }

    pub fn with_collaborators(
        dispatch: DispatchConfig,
        event_buffer_size: usize,
        gateway: Arc<dyn PaymentGateway>,
        earnings: Arc<dyn EarningLedger>,
        invoices: Arc<dyn InvoiceGenerator>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        let metrics = Metrics::new();
        let temp_ride_ttl = dispatch.temp_ride_ttl;

        Self {
            dispatch,
            rides: RideStore::new(),
            temp_rides: TempRideStore::new(temp_ride_ttl),
            drivers: DriverDirectory::new(),
            payments: PaymentStore::new(),
            notifier: Notifier::new(event_buffer_size, metrics.clone()),
            gateway,
            earnings,
            invoices,
            messenger,
            metrics,
        }
    }
}
