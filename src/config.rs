//! Node configuration.
//!
//! Defaults live here; every field can be overridden by an environment variable of the
//! same name (upper-cased, `UTXOCHAIN_` prefixed). There is no required config file --
//! this mirrors how the rest of the crate already reads individual `env::var` lookups
//! (`WALLET_FILE`, `TREE_DIR`, ...), just collected into one place and loaded once.

use crate::error::{BtcError, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "UTXOCHAIN";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Directory sled opens its database in.
    pub data_dir: String,
    /// Name of the sled tree that stores blocks and the chain tip.
    pub blocks_tree: String,
    /// Name of the sled tree that stores the UTXO index.
    pub utxo_tree: String,
    /// Path to the flat file wallets are persisted to.
    pub wallet_file: String,
    /// Coinbase reward paid to the miner of a block.
    pub block_reward: i64,
    /// Initial proof-of-work difficulty, used only for the genesis block.
    pub genesis_difficulty: i64,
    /// Difficulty is nudged by this amount after every block, up or down
    /// depending on how long mining took relative to `target_mine_millis`.
    pub difficulty_step: i64,
    /// Mining-time threshold (milliseconds) the difficulty adjustment is measured against.
    pub target_mine_millis: i64,
    /// Difficulty is never allowed to drop below this floor.
    pub min_difficulty: i64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: "data".to_string(),
            blocks_tree: "blocks".to_string(),
            utxo_tree: "chainstate".to_string(),
            wallet_file: "wallet.dat".to_string(),
            block_reward: 500,
            genesis_difficulty: 21955,
            difficulty_step: 1638,
            target_mine_millis: 50,
            min_difficulty: 1,
        }
    }
}

impl Config {
    pub fn load() -> Result<Config> {
        let defaults = Config::default();
        let builder = config::Config::builder()
            .set_default("data_dir", defaults.data_dir.clone())
            .map_err(|e| BtcError::ConfigError(e.to_string()))?
            .set_default("blocks_tree", defaults.blocks_tree.clone())
            .map_err(|e| BtcError::ConfigError(e.to_string()))?
            .set_default("utxo_tree", defaults.utxo_tree.clone())
            .map_err(|e| BtcError::ConfigError(e.to_string()))?
            .set_default("wallet_file", defaults.wallet_file.clone())
            .map_err(|e| BtcError::ConfigError(e.to_string()))?
            .set_default("block_reward", defaults.block_reward)
            .map_err(|e| BtcError::ConfigError(e.to_string()))?
            .set_default("genesis_difficulty", defaults.genesis_difficulty)
            .map_err(|e| BtcError::ConfigError(e.to_string()))?
            .set_default("difficulty_step", defaults.difficulty_step)
            .map_err(|e| BtcError::ConfigError(e.to_string()))?
            .set_default("target_mine_millis", defaults.target_mine_millis)
            .map_err(|e| BtcError::ConfigError(e.to_string()))?
            .set_default("min_difficulty", defaults.min_difficulty)
            .map_err(|e| BtcError::ConfigError(e.to_string()))?
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .separator("_"),
            )
            .build()
            .map_err(|e| BtcError::ConfigError(e.to_string()))?;

        builder
            .try_deserialize()
            .map_err(|e| BtcError::ConfigError(e.to_string()))
    }
}

/// Process-wide configuration, loaded lazily on first access and then reused for the
/// lifetime of the process. Falls back to `Config::default()` if loading fails, so a
/// malformed environment variable cannot bring the whole node down before it can log why.
pub static GLOBAL_CONFIG: Lazy<Config> = Lazy::new(|| {
    Config::load().unwrap_or_else(|e| {
        tracing::warn!("failed to load configuration, using defaults: {e}");
        Config::default()
    })
});
