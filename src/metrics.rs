//! Token and latency accounting for model calls.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Aggregated usage across the extraction calls made by one model client.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractionMetrics {
    pub calls: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub inference_time_ms: u64,
}

impl ExtractionMetrics {
    /// Record one completed call.
    pub fn record(&mut self, prompt_tokens: u64, completion_tokens: u64, elapsed: Duration) {
        self.calls += 1;
        self.prompt_tokens += prompt_tokens;
        self.completion_tokens += completion_tokens;
        self.inference_time_ms += u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    }

    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}
