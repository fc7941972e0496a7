use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use tracing::info;
use std::sync::{Arc, OnceLock};


// Declare the static OnceLock to hold the Metrics.
// Sync access: the credential store records persistence failures outside of async code.
static METRICS_INSTANCE: OnceLock<Arc<Metrics>> = OnceLock::new();

/// Gets a reference to the static `Metrics`, initializing it on first use.
pub fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE.get_or_init(|| {
        info!("Initializing Metrics ...");
        Metrics::new()
    })
}


#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Request metrics
    pub requests: IntCounterVec,
    pub request_duration: HistogramVec,
    pub authorization_failures: IntCounter,

    // Refresh metrics
    pub refreshes: IntCounterVec,
    pub refresh_coalesced: IntCounter,
    pub refresh_duration: HistogramVec,

    // Session / store metrics
    pub session_transitions: IntCounterVec,
    pub authenticated: IntGauge,
    pub persistence_failures: IntCounterVec,

    // Config
    pub config_parse_failures: IntCounter,
    pub config_validation_errors: IntCounter,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("sessionagent".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Requests
            requests: IntCounterVec::new(Opts::new("requests_total", "Authenticated requests by method and outcome"),&["method", "outcome"],).unwrap(),
            request_duration: HistogramVec::new(HistogramOpts::new("request_duration_seconds", "Request duration seconds, retry included").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),&["method"],).unwrap(),
            authorization_failures: IntCounter::new("authorization_failures_total", "401 responses received from the api").unwrap(),

            // Refresh
            refreshes: IntCounterVec::new(Opts::new("refreshes_total", "Refresh exchanges by outcome"),&["outcome"],).unwrap(),
            refresh_coalesced: IntCounter::new("refresh_coalesced_total", "Callers that joined an already running or completed refresh").unwrap(),
            refresh_duration: HistogramVec::new(HistogramOpts::new("refresh_duration_seconds", "Refresh exchange duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),&["outcome"],).unwrap(),

            // Session / store
            session_transitions: IntCounterVec::new(Opts::new("session_transitions_total", "Session state transitions"),&["state"],).unwrap(),
            authenticated: IntGauge::new("authenticated", "1 if a session is active").unwrap(),
            persistence_failures: IntCounterVec::new(Opts::new("persistence_failures_total", "Credential backend failures"),&["operation"],).unwrap(),

            // Config
            config_parse_failures: IntCounter::new("config_parse_failures_total", "Config files that could not be parsed").unwrap(),
            config_validation_errors: IntCounter::new("config_validation_errors_total","Validation errors during startup",).unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.requests.clone())).unwrap();
        reg.register(Box::new(metrics.request_duration.clone())).unwrap();
        reg.register(Box::new(metrics.authorization_failures.clone())).unwrap();
        reg.register(Box::new(metrics.refreshes.clone())).unwrap();
        reg.register(Box::new(metrics.refresh_coalesced.clone())).unwrap();
        reg.register(Box::new(metrics.refresh_duration.clone())).unwrap();
        reg.register(Box::new(metrics.session_transitions.clone())).unwrap();
        reg.register(Box::new(metrics.authenticated.clone())).unwrap();
        reg.register(Box::new(metrics.persistence_failures.clone())).unwrap();
        reg.register(Box::new(metrics.config_parse_failures.clone())).unwrap();
        reg.register(Box::new(metrics.config_validation_errors.clone())).unwrap();

        metrics
    }

    /// Text exposition format of the whole registry
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
