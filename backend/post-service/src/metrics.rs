//! Prometheus metrics for post-service

use lazy_static::lazy_static;
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};
use prometheus::{Encoder, TextEncoder};

lazy_static! {
    /// Applied vote transitions, labelled cast / cancel / flip / duplicate
    static ref VOTES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "post_service_votes_total",
        "Total number of vote mutations by resulting transition",
        &["transition"]
    )
    .expect("Failed to register post_service_votes_total");

    static ref POSTS_CREATED: IntCounter = register_int_counter!(
        "post_service_posts_created_total",
        "Total number of posts created"
    )
    .expect("Failed to register post_service_posts_created_total");
}

pub fn record_vote(transition: &str) {
    VOTES_TOTAL.with_label_values(&[transition]).inc();
}

pub fn record_post_created() {
    POSTS_CREATED.inc();
}

/// Render the default registry in the text exposition format
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
