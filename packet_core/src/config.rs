// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Timing knobs of the transaction flows
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Wait before re-reading a mined receipt that had no `PacketCreated` log
    #[serde(rename = "extraction_retry_delay_ms", deserialize_with = "millis")]
    pub extraction_retry_delay: Duration,
    /// Number of re-reads after the first extraction attempt
    pub extraction_retries: u32,
    /// Interval between two `eth_getTransactionReceipt` polls
    #[serde(rename = "receipt_poll_interval_ms", deserialize_with = "millis")]
    pub receipt_poll_interval: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            extraction_retry_delay: Duration::from_millis(3000),
            extraction_retries: 1,
            receipt_poll_interval: Duration::from_millis(1000),
        }
    }
}

impl FlowConfig {
    pub fn with_extraction_retry_delay(mut self, delay: Duration) -> Self {
        self.extraction_retry_delay = delay;
        self
    }

    pub fn with_extraction_retries(mut self, retries: u32) -> Self {
        self.extraction_retries = retries;
        self
    }

    pub fn with_receipt_poll_interval(mut self, interval: Duration) -> Self {
        self.receipt_poll_interval = interval;
        self
    }
}

fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

#[cfg(test)]
mod config_unit_test {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: FlowConfig = serde_json::from_str(r#"{"extraction_retries": 3}"#).unwrap();
        assert_eq!(config.extraction_retries, 3);
        assert_eq!(config.extraction_retry_delay, Duration::from_secs(3));
        assert_eq!(config.receipt_poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn durations_are_milliseconds() {
        let config: FlowConfig =
            serde_json::from_str(r#"{"extraction_retry_delay_ms": 250}"#).unwrap();
        assert_eq!(config.extraction_retry_delay, Duration::from_millis(250));
    }
}
