//! Configuration surface: a JSON document for the `system`/`monitor`/
//! `adapters` sections plus a path to the YAML cache document. Deserialized
//! with `serde`, validated once at load time.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::PipelineError;
use crate::hours::TradingHoursValidator;
use crate::parser::ParseLimits;
use crate::ratelimit::RateLimiter;

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: u64,
    #[serde(default = "default_processing_timeout_seconds")]
    pub processing_timeout_seconds: u64,
}

fn default_queue_size() -> usize {
    10_000
}
fn default_retry_attempts() -> u32 {
    1
}
fn default_retry_delay_seconds() -> u64 {
    1
}
fn default_processing_timeout_seconds() -> u64 {
    30
}

impl SystemConfig {
    pub fn processing_timeout(&self) -> Duration {
        Duration::from_secs(self.processing_timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    pub log_path: PathBuf,
    #[serde(default = "default_target_filename")]
    pub target_filename: String,
    #[serde(flatten)]
    pub hours: TradingHoursValidator,
    pub min_qty: i64,
    pub max_qty: i64,
}

fn default_target_filename() -> String {
    "GridLog.csv".to_string()
}

impl MonitorConfig {
    pub fn parse_limits(&self) -> ParseLimits {
        ParseLimits {
            min_qty: self.min_qty,
            max_qty: self.max_qty,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdapterConfig {
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    pub rate_limit: u32,
    pub rate_limit_period_seconds: u64,
    #[serde(default)]
    pub rate_limiter_active: bool,
    #[serde(default)]
    pub order_delay_seconds: Option<u64>,
    #[serde(default)]
    pub grouping_enabled: bool,
    #[serde(default = "default_group_limit")]
    pub group_limit: usize,
    #[serde(default = "default_counter_size")]
    pub counter_size: u32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_timeout_seconds() -> u64 {
    10
}
fn default_group_limit() -> usize {
    50
}
fn default_counter_size() -> u32 {
    5
}
fn default_active() -> bool {
    true
}

impl AdapterConfig {
    pub fn order_delay(&self) -> Option<Duration> {
        self.order_delay_seconds.filter(|&s| s != 0).map(Duration::from_secs)
    }

    pub fn build_rate_limiter(&self, adapter_name: &str) -> Result<RateLimiter, PipelineError> {
        if !self.rate_limiter_active {
            return Ok(RateLimiter::disabled());
        }
        RateLimiter::new(self.rate_limit, Duration::from_secs(self.rate_limit_period_seconds)).map_err(|e| {
            PipelineError::InvalidRateLimiter {
                adapter: adapter_name.to_string(),
                reason: e.to_string(),
            }
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub daily_rotation: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            daily_rotation: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub watch_root: PathBuf,
    pub cache_path: PathBuf,
    pub system: SystemConfig,
    pub monitor: MonitorConfig,
    pub adapters: HashMap<String, AdapterConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&text)
            .with_context(|| format!("parsing config JSON {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (name, adapter) in &self.adapters {
            adapter
                .build_rate_limiter(name)
                .with_context(|| format!("adapter {name} has an invalid rate limiter configuration"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
    {
        "watch_root": "/tmp/logs",
        "cache_path": "/tmp/cache.yaml",
        "system": {},
        "monitor": {
            "log_path": "/tmp/out",
            "allowed_weekdays": [0, 1, 2, 3, 4],
            "trading_start": "09:15:00",
            "trading_end": "15:30:00",
            "min_qty": 1,
            "max_qty": 10000
        },
        "adapters": {
            "tradetron": {
                "base_url": "https://trigger.example/base",
                "rate_limit": 10,
                "rate_limit_period_seconds": 1,
                "rate_limiter_active": true,
                "grouping_enabled": true
            },
            "algotest": {
                "base_url": null,
                "rate_limit": 5,
                "rate_limit_period_seconds": 1,
                "order_delay_seconds": 0
            }
        }
    }
    "#;

    #[test]
    fn parses_full_config_document() {
        let config: Config = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(config.system.queue_size, 10_000);
        assert_eq!(config.monitor.target_filename, "GridLog.csv");
        assert!(config.adapters["tradetron"].grouping_enabled);
        assert_eq!(config.adapters["algotest"].order_delay_seconds, Some(0));
    }

    #[test]
    fn zero_order_delay_normalizes_to_none() {
        let config: Config = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(config.adapters["algotest"].order_delay(), None);
    }

    #[test]
    fn invalid_rate_limiter_fails_validation() {
        let mut config: Config = serde_json::from_str(SAMPLE).unwrap();
        config.adapters.get_mut("tradetron").unwrap().rate_limit = 0;
        assert!(config.validate().is_err());
    }
}
