//! Feed cache metrics
//!
//! Counters live outside any registry until [`FeedCacheMetrics::register`]
//! is called, so embedding the cache never fails on duplicate registration.

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use std::sync::OnceLock;

static METRICS: OnceLock<FeedCacheMetricsInner> = OnceLock::new();

struct FeedCacheMetricsInner {
    reads: IntCounterVec,
    invalidations: IntCounter,
}

impl FeedCacheMetricsInner {
    fn new() -> Self {
        Self {
            reads: IntCounterVec::new(
                Opts::new(
                    "feed_cache_reads_total",
                    "Feed reads by outcome (hit, partial, miss)",
                ),
                &["outcome"],
            )
            .expect("valid metric definition"),
            invalidations: IntCounter::new(
                "feed_cache_invalidations_total",
                "Feed invalidations after post creation",
            )
            .expect("valid metric definition"),
        }
    }
}

fn get_metrics() -> &'static FeedCacheMetricsInner {
    METRICS.get_or_init(FeedCacheMetricsInner::new)
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FeedCacheMetrics;

impl FeedCacheMetrics {
    pub fn register(registry: &Registry) -> Result<(), prometheus::Error> {
        let metrics = get_metrics();
        registry.register(Box::new(metrics.reads.clone()))?;
        registry.register(Box::new(metrics.invalidations.clone()))?;
        Ok(())
    }

    pub fn record_read(outcome: &str) {
        get_metrics().reads.with_label_values(&[outcome]).inc();
    }

    pub fn record_invalidation() {
        get_metrics().invalidations.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_exposes_counters() {
        let registry = Registry::new();
        FeedCacheMetrics::register(&registry).unwrap();
        FeedCacheMetrics::record_read("hit");
        FeedCacheMetrics::record_invalidation();

        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"feed_cache_reads_total".to_string()));
        assert!(names.contains(&"feed_cache_invalidations_total".to_string()));
    }
}
