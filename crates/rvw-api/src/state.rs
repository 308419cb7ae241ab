//! Application state management

use std::sync::Arc;
use std::time::Instant;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use rvw_core::AppConfig;
use rvw_rag::ConversationalRag;
use tokio::sync::RwLock;

/// Prometheus collectors exposed on `/metrics`
pub struct Metrics {
    registry: Registry,

    /// Every request except health probes
    pub http_requests: IntCounter,

    /// Every chat request, valid or not
    pub rag_requests: IntCounter,

    pub requests_by_endpoint: IntCounterVec,
    pub request_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let http_requests = IntCounter::new("http_requests_total", "Total HTTP Requests")?;
        let rag_requests = IntCounter::new("rag_requests_total", "Total RAG Requests")?;
        let requests_by_endpoint = IntCounterVec::new(
            Opts::new(
                "http_requests_by_endpoint_total",
                "HTTP requests by endpoint and status",
            ),
            &["endpoint", "status"],
        )?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request latency")
                .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["endpoint"],
        )?;

        registry.register(Box::new(http_requests.clone()))?;
        registry.register(Box::new(rag_requests.clone()))?;
        registry.register(Box::new(requests_by_endpoint.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(Self {
            registry,
            http_requests,
            rag_requests,
            requests_by_endpoint,
            request_duration,
        })
    }

    /// Record a finished request
    pub fn record_request(&self, endpoint: &str, status: u16, latency_secs: f64) {
        let status = status.to_string();
        self.requests_by_endpoint
            .with_label_values(&[endpoint, status.as_str()])
            .inc();
        self.request_duration
            .with_label_values(&[endpoint])
            .observe(latency_secs);
    }

    /// Prometheus text exposition of all collectors
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Request metrics
    pub metrics: Metrics,
    /// RAG orchestrator, set once backends are wired
    pub rag: RwLock<Option<Arc<ConversationalRag>>>,
}

impl AppState {
    /// Create new application state with config
    pub fn new(config: AppConfig) -> prometheus::Result<Self> {
        Ok(Self {
            config,
            start_time: Instant::now(),
            metrics: Metrics::new()?,
            rag: RwLock::new(None),
        })
    }

    /// Create state with an orchestrator already in place
    pub fn with_rag(config: AppConfig, rag: ConversationalRag) -> prometheus::Result<Self> {
        let mut state = Self::new(config)?;
        state.rag = RwLock::new(Some(Arc::new(rag)));
        Ok(state)
    }

    /// Install the RAG orchestrator
    pub async fn initialize_rag(&self, rag: ConversationalRag) {
        *self.rag.write().await = Some(Arc::new(rag));
    }

    /// Get RAG orchestrator if initialized
    pub async fn get_rag(&self) -> Option<Arc<ConversationalRag>> {
        self.rag.read().await.clone()
    }

    /// Check if RAG is initialized
    pub async fn has_rag(&self) -> bool {
        self.rag.read().await.is_some()
    }

    /// Session used when a request names none
    pub fn default_session_id(&self) -> &str {
        &self.config.rag.default_session_id
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
