use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub rides_total: IntCounterVec,
    pub dispatch_latency_seconds: HistogramVec,
    pub sweep_actions_total: IntCounterVec,
    pub refunds_total: IntCounter,
    pub notifications_dropped_total: IntCounter,
    pub connected_clients: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let rides_total = IntCounterVec::new(
            Opts::new("rides_total", "Ride lifecycle transitions by outcome"),
            &["outcome"],
        )
        .expect("valid rides_total metric");

        let dispatch_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "dispatch_latency_seconds",
                "Latency of dispatch operations in seconds",
            ),
            &["outcome"],
        )
        .expect("valid dispatch_latency_seconds metric");

        let sweep_actions_total = IntCounterVec::new(
            Opts::new("sweep_actions_total", "Stale-ride sweep actions by kind"),
            &["action"],
        )
        .expect("valid sweep_actions_total metric");

        let refunds_total = IntCounter::new("refunds_total", "Refunds issued to the gateway")
            .expect("valid refunds_total metric");

        let notifications_dropped_total = IntCounter::new(
            "notifications_dropped_total",
            "Events dropped because the recipient had no live connection",
        )
        .expect("valid notifications_dropped_total metric");

        let connected_clients =
            IntGauge::new("connected_clients", "Currently registered live connections")
                .expect("valid connected_clients metric");

        registry
            .register(Box::new(rides_total.clone()))
            .expect("register rides_total");
        registry
            .register(Box::new(dispatch_latency_seconds.clone()))
            .expect("register dispatch_latency_seconds");
        registry
            .register(Box::new(sweep_actions_total.clone()))
            .expect("register sweep_actions_total");
        registry
            .register(Box::new(refunds_total.clone()))
            .expect("register refunds_total");
        registry
            .register(Box::new(notifications_dropped_total.clone()))
            .expect("register notifications_dropped_total");
        registry
            .register(Box::new(connected_clients.clone()))
            .expect("register connected_clients");

        Self {
            registry,
            rides_total,
            dispatch_latency_seconds,
            sweep_actions_total,
            refunds_total,
            notifications_dropped_total,
            connected_clients,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
