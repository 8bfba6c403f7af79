// Request metrics
// Counts every request and response, total processing time, and responses per status

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    requests_received: IntCounter,
    responses_sent: IntCounter,
    processing_time_us: IntCounter,
    responses_by_status: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_received =
            IntCounter::new("total_requests_received", "Requests received")?;
        let responses_sent = IntCounter::new("total_responses_sent", "Responses sent")?;
        let processing_time_us = IntCounter::new(
            "total_processing_time_microseconds",
            "Cumulative request processing time in microseconds",
        )?;
        let responses_by_status = IntCounterVec::new(
            Opts::new(
                "total_responses_sent_by_status",
                "Responses sent, partitioned by HTTP status",
            ),
            &["status"],
        )?;

        registry.register(Box::new(requests_received.clone()))?;
        registry.register(Box::new(responses_sent.clone()))?;
        registry.register(Box::new(processing_time_us.clone()))?;
        registry.register(Box::new(responses_by_status.clone()))?;

        Ok(Self {
            registry,
            requests_received,
            responses_sent,
            processing_time_us,
            responses_by_status,
        })
    }

    /// Prometheus text exposition of every registered metric
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn requests_received(&self) -> u64 {
        self.requests_received.get()
    }

    pub fn responses_sent(&self) -> u64 {
        self.responses_sent.get()
    }

    pub fn responses_with_status(&self, status: u16) -> u64 {
        let status = status.to_string();
        self.responses_by_status
            .with_label_values(&[status.as_str()])
            .get()
    }
}

pub async fn track_metrics(
    State(metrics): State<Arc<Metrics>>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    metrics.requests_received.inc();

    let response = next.run(request).await;

    metrics.responses_sent.inc();
    metrics
        .processing_time_us
        .inc_by(started.elapsed().as_micros() as u64);
    metrics
        .responses_by_status
        .with_label_values(&[response.status().as_str()])
        .inc();

    response
}
