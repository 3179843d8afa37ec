//! Push bridge from the worker to the channel endpoints.
//!
//! Workers never hold client sessions themselves; each event is POSTed
//! to every configured endpoint's `/internal/push` route and the
//! endpoint delivers to its locally connected sessions. The bridge is
//! best-effort: a failed push is logged and grading carries on, because
//! the persisted submission is the authoritative record.

use tracing::warn;
use verdict_common::types::{ProgressEvent, PushEnvelope};

pub struct ProgressEmitter {
    client: reqwest::Client,
    endpoints: Vec<String>,
}

impl ProgressEmitter {
    pub fn new(endpoints: Vec<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoints,
        }
    }

    pub async fn emit(&self, user_id: &str, event: &ProgressEvent) {
        let envelope = PushEnvelope {
            user_id: user_id.to_string(),
            submission_id: event.submission_id.clone(),
            data: event.clone(),
        };

        for endpoint in &self.endpoints {
            let url = format!("{}/internal/push", endpoint.trim_end_matches('/'));
            match self.client.post(&url).json(&envelope).send().await {
                Ok(response) if !response.status().is_success() => {
                    warn!(
                        endpoint = %endpoint,
                        status = %response.status(),
                        submission_id = %event.submission_id,
                        "progress push rejected"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        endpoint = %endpoint,
                        error = %e,
                        submission_id = %event.submission_id,
                        "progress push failed"
                    );
                }
            }
        }
    }
}
