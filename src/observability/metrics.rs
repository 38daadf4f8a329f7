use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub nearby_lookups_total: IntCounterVec,
    pub payment_orders_total: IntCounterVec,
    pub payment_verifications_total: IntCounterVec,
    pub gateway_latency_seconds: HistogramVec,
    pub requests_created_total: IntCounter,
    pub available_technicians: IntGauge,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let nearby_lookups_total = IntCounterVec::new(
            Opts::new("nearby_lookups_total", "Nearby technician lookups by outcome"),
            &["outcome"],
        )
        .expect("valid nearby_lookups_total metric");

        let payment_orders_total = IntCounterVec::new(
            Opts::new("payment_orders_total", "Payment orders created by outcome"),
            &["outcome"],
        )
        .expect("valid payment_orders_total metric");

        let payment_verifications_total = IntCounterVec::new(
            Opts::new(
                "payment_verifications_total",
                "Payment signature verifications by outcome",
            ),
            &["outcome"],
        )
        .expect("valid payment_verifications_total metric");

        let gateway_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "gateway_latency_seconds",
                "Latency of payment gateway calls in seconds",
            ),
            &["outcome"],
        )
        .expect("valid gateway_latency_seconds metric");

        let requests_created_total =
            IntCounter::new("requests_created_total", "Service requests created")
                .expect("valid requests_created_total metric");

        let available_technicians = IntGauge::new(
            "available_technicians",
            "Technicians currently flagged available",
        )
        .expect("valid available_technicians metric");

        registry
            .register(Box::new(nearby_lookups_total.clone()))
            .expect("register nearby_lookups_total");
        registry
            .register(Box::new(payment_orders_total.clone()))
            .expect("register payment_orders_total");
        registry
            .register(Box::new(payment_verifications_total.clone()))
            .expect("register payment_verifications_total");
        registry
            .register(Box::new(gateway_latency_seconds.clone()))
            .expect("register gateway_latency_seconds");
        registry
            .register(Box::new(requests_created_total.clone()))
            .expect("register requests_created_total");
        registry
            .register(Box::new(available_technicians.clone()))
            .expect("register available_technicians");

        Self {
            registry,
            nearby_lookups_total,
            payment_orders_total,
            payment_verifications_total,
            gateway_latency_seconds,
            requests_created_total,
            available_technicians,
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
