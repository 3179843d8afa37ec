// Prometheus metrics for the ingress path.

use lazy_static::lazy_static;
use prometheus::{register_int_counter, IntCounter, TextEncoder};

lazy_static! {
    pub static ref SUBMISSIONS_CREATED: IntCounter = register_int_counter!(
        "verdict_submissions_created_total",
        "Submissions accepted at the ingress"
    )
    .unwrap();
    pub static ref PUSH_EVENTS_DELIVERED: IntCounter = register_int_counter!(
        "verdict_push_events_delivered_total",
        "Progress events delivered to live sessions"
    )
    .unwrap();
}

pub fn render() -> String {
    let encoder = TextEncoder::new();
    encoder
        .encode_to_string(&prometheus::gather())
        .unwrap_or_default()
}
