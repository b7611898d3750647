//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref AUTHORIZE_REDIRECTS_TOTAL: IntCounter = IntCounter::new(
        "reddit_oauth_authorize_redirects_total",
        "Total number of redirects to the Reddit authorize page"
    ).expect("metric can be created");
    pub static ref TOKEN_EXCHANGES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("reddit_oauth_token_exchanges_total", "Total number of authorization code exchanges"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref TOKEN_EXCHANGE_DURATION_SECONDS: prometheus::Histogram = prometheus::Histogram::with_opts(
        HistogramOpts::new(
            "reddit_oauth_token_exchange_duration_seconds",
            "Token exchange duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("reddit_oauth_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; instruments are registered on the first call.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(AUTHORIZE_REDIRECTS_TOTAL.clone()))
            .expect("AUTHORIZE_REDIRECTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(TOKEN_EXCHANGES_TOTAL.clone()))
            .expect("TOKEN_EXCHANGES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(TOKEN_EXCHANGE_DURATION_SECONDS.clone()))
            .expect("TOKEN_EXCHANGE_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}
