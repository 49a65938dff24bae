use std::time::Duration;

use crate::error::{SentinelError, SentinelResult};

/// Runtime parameters for the monitoring loop.
#[derive(Debug, Clone)]
pub struct SentinelConfig {
    pub tick_interval: Duration,
    /// Chance that a SCANNING tick starts a detection cycle.
    pub trigger_probability: f64,
    pub analysis_latency: Duration,
    pub execution_latency: Duration,
    /// Upper bound on a single signal source call.
    pub source_timeout: Duration,
    /// Candidates scoring strictly above this escalate to an action.
    pub auto_trigger_confidence: f64,
    pub detection_capacity: usize,
    pub action_capacity: usize,
    pub opening_performance: f64,
    pub opening_action_count: u64,
    pub seed: Option<u64>,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(4000),
            trigger_probability: 0.4,
            analysis_latency: Duration::from_millis(2000),
            execution_latency: Duration::from_millis(1000),
            source_timeout: Duration::from_millis(5000),
            auto_trigger_confidence: 85.0,
            detection_capacity: 10,
            action_capacity: 20,
            opening_performance: 0.0,
            opening_action_count: 0,
            seed: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

impl SentinelConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            tick_interval: env_parse("TICK_MS").map(Duration::from_millis).unwrap_or(d.tick_interval),
            trigger_probability: env_parse("TRIGGER_PROB").unwrap_or(d.trigger_probability),
            analysis_latency: env_parse("ANALYSIS_MS").map(Duration::from_millis).unwrap_or(d.analysis_latency),
            execution_latency: env_parse("EXECUTION_MS").map(Duration::from_millis).unwrap_or(d.execution_latency),
            source_timeout: env_parse("SOURCE_TIMEOUT_MS").map(Duration::from_millis).unwrap_or(d.source_timeout),
            auto_trigger_confidence: env_parse("AUTO_CONFIDENCE").unwrap_or(d.auto_trigger_confidence),
            detection_capacity: env_parse("DETECTION_CAP").unwrap_or(d.detection_capacity),
            action_capacity: env_parse("ACTION_CAP").unwrap_or(d.action_capacity),
            opening_performance: env_parse("OPENING_PERFORMANCE").unwrap_or(d.opening_performance),
            opening_action_count: env_parse("OPENING_ACTIONS").unwrap_or(d.opening_action_count),
            seed: env_parse("SEED"),
        }
    }

    pub fn validate(self) -> SentinelResult<Self> {
        if self.tick_interval.is_zero() {
            return Err(SentinelError::config("tick interval must be positive"));
        }
        if self.analysis_latency.is_zero() || self.execution_latency.is_zero() {
            return Err(SentinelError::config("cycle latencies must be positive"));
        }
        if self.source_timeout.is_zero() {
            return Err(SentinelError::config("source timeout must be positive"));
        }
        if !(self.trigger_probability > 0.0 && self.trigger_probability <= 1.0) {
            return Err(SentinelError::config(format!(
                "trigger probability {} outside (0, 1]",
                self.trigger_probability
            )));
        }
        if !(self.auto_trigger_confidence > 0.0 && self.auto_trigger_confidence <= 100.0) {
            return Err(SentinelError::config(format!(
                "auto-trigger confidence {} outside (0, 100]",
                self.auto_trigger_confidence
            )));
        }
        if self.detection_capacity == 0 || self.action_capacity == 0 {
            return Err(SentinelError::config("history capacities must be positive"));
        }
        if !self.opening_performance.is_finite() {
            return Err(SentinelError::config("opening performance must be finite"));
        }
        Ok(self)
    }
}
