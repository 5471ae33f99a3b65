//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Ledger engine configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Ledger engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Maximum number of store operations per committed batch.
    ///
    /// Consolidation backfills and bulk event replays are chunked to stay
    /// under the backing store's per-transaction operation limit.
    #[serde(default = "default_batch_ceiling")]
    pub batch_ceiling: usize,
    /// Maximum number of entries replayed on top of a snapshot before the
    /// snapshot is rebuilt in place.
    #[serde(default = "default_snapshot_rebuild_threshold")]
    pub snapshot_rebuild_threshold: u64,
}

fn default_batch_ceiling() -> usize {
    450
}

fn default_snapshot_rebuild_threshold() -> u64 {
    200
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            batch_ceiling: default_batch_ceiling(),
            snapshot_rebuild_threshold: default_snapshot_rebuild_threshold(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("REVLEDGER").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
