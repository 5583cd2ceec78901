use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::backoff::BackoffStrategy;
use crate::classify::Rule;
use crate::strategy::{ConfigError, RetryStrategy};

/// Which strategy variant to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyVariant {
    #[default]
    Standard,
    Legacy,
    Adaptive,
}

/// Token-bucket sizing (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Maximum tokens in the bucket.
    pub capacity: u32,
    /// Tokens debited per admitted retry.
    pub retry_cost: u32,
    /// Tokens credited per successful operation.
    pub success_refill: u32,
}

/// Retry engine configuration loaded from `~/.config/redrive/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Strategy variant: "standard", "legacy", or "adaptive".
    #[serde(default)]
    pub variant: StrategyVariant,
    /// Maximum attempts per operation (including the first).
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_delay_ms: u64,
    /// Disable jitter for reproducible delays (default false).
    #[serde(default)]
    pub no_jitter: bool,
    /// Optional base delay for the throttling backoff (legacy/adaptive only).
    #[serde(default)]
    pub throttling_base_delay_ms: Option<u64>,
    /// Set false to disable the token-bucket circuit breaker.
    #[serde(default)]
    pub circuit_breaker: Option<bool>,
    /// Optional bucket sizing; built-in defaults are used when missing.
    #[serde(default)]
    pub bucket: Option<BucketConfig>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            variant: StrategyVariant::Standard,
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 20_000,
            no_jitter: false,
            throttling_base_delay_ms: None,
            circuit_breaker: None,
            bucket: None,
        }
    }
}

impl RetryConfig {
    fn backoff(&self) -> BackoffStrategy {
        let base = Duration::from_millis(self.base_delay_ms);
        let max = Duration::from_millis(self.max_delay_ms);
        if self.no_jitter {
            BackoffStrategy::ExponentialNoJitter { base, max }
        } else {
            BackoffStrategy::ExponentialJitter { base, max }
        }
    }

    fn throttling_backoff(&self) -> Option<BackoffStrategy> {
        let base = Duration::from_millis(self.throttling_base_delay_ms?);
        let max = Duration::from_millis(self.max_delay_ms);
        Some(if self.no_jitter {
            BackoffStrategy::ExponentialNoJitter { base, max }
        } else {
            BackoffStrategy::ExponentialJitter { base, max }
        })
    }

    /// Build a strategy from this config plus the caller's classification
    /// rules (error tables are the caller's domain, not config).
    pub fn build_strategy(&self, rules: Vec<Rule>) -> Result<RetryStrategy, ConfigError> {
        let breaker = self.circuit_breaker.unwrap_or(true);
        match self.variant {
            StrategyVariant::Standard => {
                let mut b = RetryStrategy::standard()
                    .max_attempts(self.max_attempts)
                    .backoff(self.backoff())
                    .circuit_breaker(breaker);
                if let Some(bucket) = &self.bucket {
                    b = b
                        .bucket_capacity(bucket.capacity)
                        .bucket_retry_cost(bucket.retry_cost)
                        .bucket_success_refill(bucket.success_refill);
                }
                for rule in rules {
                    b = b.classify_rule(rule);
                }
                b.build()
            }
            StrategyVariant::Legacy => {
                let mut b = RetryStrategy::legacy()
                    .max_attempts(self.max_attempts)
                    .backoff(self.backoff())
                    .circuit_breaker(breaker);
                if let Some(throttling) = self.throttling_backoff() {
                    b = b.throttling_backoff(throttling);
                }
                if let Some(bucket) = &self.bucket {
                    b = b
                        .bucket_capacity(bucket.capacity)
                        .bucket_retry_cost(bucket.retry_cost)
                        .bucket_success_refill(bucket.success_refill);
                }
                for rule in rules {
                    b = b.classify_rule(rule);
                }
                b.build()
            }
            StrategyVariant::Adaptive => {
                let mut b = RetryStrategy::adaptive()
                    .max_attempts(self.max_attempts)
                    .backoff(self.backoff())
                    .circuit_breaker(breaker);
                if let Some(throttling) = self.throttling_backoff() {
                    b = b.throttling_backoff(throttling);
                }
                if let Some(bucket) = &self.bucket {
                    b = b
                        .bucket_capacity(bucket.capacity)
                        .bucket_retry_cost(bucket.retry_cost)
                        .bucket_success_refill(bucket.success_refill);
                }
                for rule in rules {
                    b = b.classify_rule(rule);
                }
                b.build()
            }
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("redrive")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<RetryConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = RetryConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: RetryConfig = toml::from_str(&data)?;
    Ok(cfg)
}
