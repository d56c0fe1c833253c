use prometheus::{
    Encoder, GaugeVec, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub settlements_total: IntCounterVec,
    pub manual_transactions_total: IntCounterVec,
    pub notifications_total: IntCounterVec,
    pub feed_unread: IntGauge,
    pub event_classify_latency_seconds: HistogramVec,
    pub driver_balance: GaugeVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let settlements_total = IntCounterVec::new(
            Opts::new("settlements_total", "Total trip settlements by outcome"),
            &["outcome"],
        )
        .expect("valid settlements_total metric");

        let manual_transactions_total = IntCounterVec::new(
            Opts::new(
                "manual_transactions_total",
                "Total manual ledger transactions by kind",
            ),
            &["kind"],
        )
        .expect("valid manual_transactions_total metric");

        let notifications_total = IntCounterVec::new(
            Opts::new(
                "notifications_total",
                "Classified notifications by kind and dedup outcome",
            ),
            &["kind", "outcome"],
        )
        .expect("valid notifications_total metric");

        let feed_unread = IntGauge::new("feed_unread", "Current unread notifications in the feed")
            .expect("valid feed_unread metric");

        let event_classify_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "event_classify_latency_seconds",
                "Latency of change event classification in seconds",
            ),
            &["outcome"],
        )
        .expect("valid event_classify_latency_seconds metric");

        let driver_balance = GaugeVec::new(
            Opts::new("driver_balance", "Current ledger balance per driver"),
            &["driver_id"],
        )
        .expect("valid driver_balance metric");

        registry
            .register(Box::new(settlements_total.clone()))
            .expect("register settlements_total");
        registry
            .register(Box::new(manual_transactions_total.clone()))
            .expect("register manual_transactions_total");
        registry
            .register(Box::new(notifications_total.clone()))
            .expect("register notifications_total");
        registry
            .register(Box::new(feed_unread.clone()))
            .expect("register feed_unread");
        registry
            .register(Box::new(event_classify_latency_seconds.clone()))
            .expect("register event_classify_latency_seconds");
        registry
            .register(Box::new(driver_balance.clone()))
            .expect("register driver_balance");

        Self {
            registry,
            settlements_total,
            manual_transactions_total,
            notifications_total,
            feed_unread,
            event_classify_latency_seconds,
            driver_balance,
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
