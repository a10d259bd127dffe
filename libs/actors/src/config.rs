//! Runtime Configuration
//!
//! Pool configuration for the actor runtime. The only required knob is the
//! maximum number of concurrent workers; `0` turns the runtime fully
//! synchronous (every submission runs on the caller's thread).
//!
//! Configuration is read from TOML and then overridden from the environment:
//!
//! ```toml
//! [pool]
//! strategy = "bounded"      # bounded | managed | inline
//! max_threads = 4
//! idle_timeout_ms = 5
//! thread_name = "actor-worker"
//! ```
//!
//! | Variable                       | Field                  |
//! |--------------------------------|------------------------|
//! | `ACTOR_POOL_MAX_THREADS`       | `pool.max_threads`     |
//! | `ACTOR_POOL_STRATEGY`          | `pool.strategy`        |
//! | `ACTOR_POOL_IDLE_TIMEOUT_MS`   | `pool.idle_timeout_ms` |

use crate::error::{ActorError, Result};
use crate::pool::{BoundedPool, InlinePool, ManagedPool, WorkerPool};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const ENV_MAX_THREADS: &str = "ACTOR_POOL_MAX_THREADS";
pub const ENV_STRATEGY: &str = "ACTOR_POOL_STRATEGY";
pub const ENV_IDLE_TIMEOUT_MS: &str = "ACTOR_POOL_IDLE_TIMEOUT_MS";

/// Worker pool strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PoolStrategy {
    /// Dedicated worker threads spawned on demand, retired when idle
    #[default]
    Bounded,
    /// Blocking pool of a tokio runtime with an explicit busy counter
    Managed,
    /// No threads at all: work runs on the submitting thread
    Inline,
}

impl PoolStrategy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bounded => "bounded",
            Self::Managed => "managed",
            Self::Inline => "inline",
        }
    }
}

impl fmt::Display for PoolStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PoolStrategy {
    type Err = ActorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bounded" => Ok(Self::Bounded),
            "managed" => Ok(Self::Managed),
            "inline" => Ok(Self::Inline),
            other => Err(ActorError::configuration(
                format!("Unknown pool strategy '{}'", other),
                Some("pool.strategy"),
            )),
        }
    }
}

/// Top-level runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub pool: PoolConfig,
}

/// Worker pool settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub strategy: PoolStrategy,
    /// Maximum concurrent workers; 0 selects synchronous execution
    pub max_threads: usize,
    /// How long an idle bounded-pool worker polls before retiring
    pub idle_timeout_ms: u64,
    /// Worker thread name prefix
    pub thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            strategy: PoolStrategy::Bounded,
            max_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            idle_timeout_ms: 5,
            thread_name: "actor-worker".to_string(),
        }
    }
}

impl PoolConfig {
    /// Bounded pool with the given worker limit and default settings
    pub fn bounded(max_threads: usize) -> Self {
        Self {
            strategy: PoolStrategy::Bounded,
            max_threads,
            ..Self::default()
        }
    }

    /// Managed-executor pool with the given worker limit
    pub fn managed(max_threads: usize) -> Self {
        Self {
            strategy: PoolStrategy::Managed,
            max_threads,
            ..Self::default()
        }
    }

    /// Synchronous pool
    pub fn inline() -> Self {
        Self {
            strategy: PoolStrategy::Inline,
            max_threads: 0,
            ..Self::default()
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Strategy that `build` will actually use
    pub fn effective_strategy(&self) -> PoolStrategy {
        if self.max_threads == 0 {
            PoolStrategy::Inline
        } else {
            self.strategy
        }
    }

    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        if self.effective_strategy() == PoolStrategy::Bounded && self.idle_timeout_ms == 0 {
            return Err(ActorError::configuration(
                "idle_timeout_ms must be greater than zero for the bounded pool",
                Some("pool.idle_timeout_ms"),
            ));
        }
        if self.thread_name.trim().is_empty() {
            return Err(ActorError::configuration(
                "thread_name must not be empty",
                Some("pool.thread_name"),
            ));
        }
        Ok(())
    }

    /// Build the configured pool
    pub fn build(&self) -> Result<Arc<dyn WorkerPool>> {
        self.validate()?;
        let strategy = self.effective_strategy();
        info!(
            strategy = %strategy,
            max_threads = self.max_threads,
            idle_timeout_ms = self.idle_timeout_ms,
            "Building worker pool"
        );
        let pool: Arc<dyn WorkerPool> = match strategy {
            PoolStrategy::Inline => Arc::new(InlinePool::new()),
            PoolStrategy::Bounded => Arc::new(BoundedPool::with_config(self)),
            PoolStrategy::Managed => Arc::new(ManagedPool::with_config(self)?),
        };
        Ok(pool)
    }

    /// Apply environment overrides through a lookup function
    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_MAX_THREADS) {
            self.max_threads = raw.trim().parse().map_err(|e| {
                ActorError::configuration(
                    format!("Invalid {}='{}': {}", ENV_MAX_THREADS, raw, e),
                    Some("pool.max_threads"),
                )
            })?;
            debug!(max_threads = self.max_threads, "Pool max_threads overridden from environment");
        }
        if let Some(raw) = lookup(ENV_STRATEGY) {
            self.strategy = raw.parse()?;
            debug!(strategy = %self.strategy, "Pool strategy overridden from environment");
        }
        if let Some(raw) = lookup(ENV_IDLE_TIMEOUT_MS) {
            self.idle_timeout_ms = raw.trim().parse().map_err(|e| {
                ActorError::configuration(
                    format!("Invalid {}='{}': {}", ENV_IDLE_TIMEOUT_MS, raw, e),
                    Some("pool.idle_timeout_ms"),
                )
            })?;
        }
        Ok(())
    }
}

impl RuntimeConfig {
    /// Parse configuration from a TOML string (no environment overrides)
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).map_err(|e| {
            ActorError::configuration(format!("Invalid runtime configuration: {}", e), None)
        })?;
        config.pool.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read runtime config {}", path.display()))?;
        let mut config: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse runtime config {}", path.display()))?;
        config
            .pool
            .apply_overrides(|key| std::env::var(key).ok())
            .context("Invalid environment override")?;
        config.pool.validate()?;
        info!(
            path = %path.display(),
            strategy = %config.pool.effective_strategy(),
            max_threads = config.pool.max_threads,
            "Loaded runtime configuration"
        );
        Ok(config)
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.pool.apply_overrides(|key| std::env::var(key).ok())?;
        config.pool.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert_eq!(config.pool.strategy, PoolStrategy::Bounded);
        assert!(config.pool.max_threads >= 1);
        assert_eq!(config.pool.idle_timeout_ms, 5);
        assert!(config.pool.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            [pool]
            strategy = "managed"
            max_threads = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.pool.strategy, PoolStrategy::Managed);
        assert_eq!(config.pool.max_threads, 3);
        // Unspecified fields keep their defaults
        assert_eq!(config.pool.thread_name, "actor-worker");
    }

    #[test]
    fn test_zero_threads_selects_inline() {
        let config = PoolConfig::bounded(0);
        assert_eq!(config.effective_strategy(), PoolStrategy::Inline);
        let pool = config.build().unwrap();
        assert_eq!(pool.stats().strategy, PoolStrategy::Inline);
        assert!(pool.is_saturated());
    }

    #[test]
    fn test_validation_rejects_zero_idle_timeout() {
        let config = PoolConfig {
            idle_timeout_ms: 0,
            ..PoolConfig::bounded(2)
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.category(), "configuration");
    }

    #[test]
    fn test_unknown_strategy() {
        let err = RuntimeConfig::from_toml_str("[pool]\nstrategy = \"fibers\"\n").unwrap_err();
        assert!(err.to_string().contains("Invalid runtime configuration"));
        assert!("Fibers".parse::<PoolStrategy>().is_err());
        assert_eq!(" Inline ".parse::<PoolStrategy>().unwrap(), PoolStrategy::Inline);
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_MAX_THREADS, "7"),
            (ENV_STRATEGY, "inline"),
            (ENV_IDLE_TIMEOUT_MS, "20"),
        ]
        .into_iter()
        .collect();

        let mut config = PoolConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.max_threads, 7);
        assert_eq!(config.strategy, PoolStrategy::Inline);
        assert_eq!(config.idle_timeout(), Duration::from_millis(20));

        let mut config = PoolConfig::default();
        let err = config
            .apply_overrides(|key| (key == ENV_MAX_THREADS).then(|| "many".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_MAX_THREADS));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[pool]\nstrategy = \"bounded\"\nmax_threads = 2\nidle_timeout_ms = 15").unwrap();

        let config = RuntimeConfig::load(file.path()).unwrap();
        assert_eq!(config.pool.effective_strategy(), PoolStrategy::Bounded);
        assert_eq!(config.pool.idle_timeout_ms, 15);

        let missing = RuntimeConfig::load(Path::new("/nonexistent/runtime.toml")).unwrap_err();
        assert!(format!("{:#}", missing).contains("Failed to read runtime config"));
    }
}
