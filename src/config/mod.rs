// src/config/mod.rs
// Process-wide worker settings, loaded from .env and the environment

use once_cell::sync::Lazy;
use serde::Serialize;
use std::str::FromStr;
use std::time::Duration;

/// Batch throughput settings shared by every processor
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceConfig {
    pub batch_size: usize,
    pub max_concurrent_searches: usize,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// Wall-clock budgets for downstream calls (milliseconds)
#[derive(Debug, Clone, Serialize)]
pub struct TimeoutConfig {
    pub database_rpc_ms: u64,
    pub embedding_generation_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerConfig {
    pub performance: PerformanceConfig,
    pub timeouts: TimeoutConfig,
    pub verbose: bool,
    pub log_level: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            performance: PerformanceConfig {
                batch_size: 10,
                max_concurrent_searches: 5,
                max_retries: 3,
                retry_delay_ms: 1000,
            },
            timeouts: TimeoutConfig {
                database_rpc_ms: 10_000,
                embedding_generation_ms: 30_000,
            },
            verbose: false,
            log_level: "info".to_string(),
        }
    }
}

// Values may carry trailing comments and whitespace ("5  # per wave").
fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(val) => {
            let clean_val = val.split('#').next().unwrap_or("").trim();
            match clean_val.parse::<T>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    // Logging isn't up yet when CONFIG is first touched
                    eprintln!("Config: {} = '{}' (parse failed, using default)", key, val);
                    default
                }
            }
        }
        Err(_) => default,
    }
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let defaults = Self::default();
        Self {
            performance: PerformanceConfig {
                batch_size: env_var_or("GRUENERATOR_BATCH_SIZE", defaults.performance.batch_size),
                max_concurrent_searches: env_var_or(
                    "GRUENERATOR_MAX_CONCURRENT_SEARCHES",
                    defaults.performance.max_concurrent_searches,
                ),
                max_retries: env_var_or("GRUENERATOR_MAX_RETRIES", defaults.performance.max_retries),
                retry_delay_ms: env_var_or(
                    "GRUENERATOR_RETRY_DELAY_MS",
                    defaults.performance.retry_delay_ms,
                ),
            },
            timeouts: TimeoutConfig {
                database_rpc_ms: env_var_or(
                    "GRUENERATOR_TIMEOUT_DATABASE_RPC_MS",
                    defaults.timeouts.database_rpc_ms,
                ),
                embedding_generation_ms: env_var_or(
                    "GRUENERATOR_TIMEOUT_EMBEDDING_MS",
                    defaults.timeouts.embedding_generation_ms,
                ),
            },
            verbose: env_var_or("GRUENERATOR_VERBOSE", defaults.verbose),
            log_level: env_var_or("GRUENERATOR_LOG_LEVEL", defaults.log_level),
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.performance.retry_delay_ms)
    }

    pub fn database_rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.database_rpc_ms)
    }

    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.embedding_generation_ms)
    }

    /// Check if debug logging is enabled
    pub fn is_debug(&self) -> bool {
        self.verbose || self.log_level.eq_ignore_ascii_case("debug")
    }

    /// Human-readable summary of the effective configuration
    pub fn summary(&self) -> String {
        format!(
            "Worker Config:\n\
            - Batch size: {}\n\
            - Max concurrent batches: {}\n\
            - Retries: {} (base delay {}ms)\n\
            - Database RPC timeout: {}ms\n\
            - Embedding timeout: {}ms\n\
            - Verbose: {}\n\
            - Log level: {}",
            self.performance.batch_size,
            self.performance.max_concurrent_searches,
            self.performance.max_retries,
            self.performance.retry_delay_ms,
            self.timeouts.database_rpc_ms,
            self.timeouts.embedding_generation_ms,
            if self.verbose { "ON" } else { "OFF" },
            self.log_level,
        )
    }
}

// Global config instance - loaded once at startup
pub static CONFIG: Lazy<WorkerConfig> = Lazy::new(WorkerConfig::from_env);
