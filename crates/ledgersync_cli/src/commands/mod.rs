//! CLI command implementations.

pub mod add;
pub mod budget;
pub mod edit;
pub mod list;
pub mod pull;
pub mod remove;
pub mod sync;

use chrono::NaiveDate;
use ledgersync_engine::{HttpRemoteStore, LocalCache, ReqwestClient, SyncConfig, SyncEngine};
use ledgersync_protocol::{parse_date, UserId};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Result type shared by the commands.
pub type CommandResult<T = ()> = Result<T, Box<dyn Error>>;

/// Engine talking to a real remote store.
pub type HttpEngine = SyncEngine<HttpRemoteStore<ReqwestClient>>;

/// Global options resolved from flags and environment.
#[derive(Debug, Clone)]
pub struct Context {
    /// Ledger cache file.
    pub cache_path: PathBuf,
    /// Remote store base URL.
    pub server_url: String,
    /// User given on the command line.
    pub user: Option<UserId>,
    /// Session token.
    pub token: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
}

impl Context {
    /// Loads the cache, creating an empty one when the file does not exist.
    ///
    /// A new ledger needs `--user`; an existing one must belong to it if given.
    pub fn load_cache(&self) -> CommandResult<LocalCache> {
        match self.user {
            Some(user_id) => {
                debug!("Opening ledger {:?} for user {}", self.cache_path, user_id);
                Ok(LocalCache::load_or_new(&self.cache_path, user_id)?)
            }
            None if self.cache_path.exists() => {
                debug!("Opening ledger {:?}", self.cache_path);
                Ok(LocalCache::load(&self.cache_path)?)
            }
            None => Err(format!(
                "no ledger at {}; pass --user to create one",
                self.cache_path.display()
            )
            .into()),
        }
    }

    /// Writes the cache back.
    pub fn save_cache(&self, cache: &LocalCache) -> CommandResult {
        cache.save(&self.cache_path)?;
        debug!("Saved {} expenses to {:?}", cache.expenses().len(), self.cache_path);
        Ok(())
    }

    /// Builds the sync configuration for `user_id`.
    pub fn sync_config(&self, user_id: UserId) -> SyncConfig {
        let config = SyncConfig::new(user_id, self.server_url.clone()).with_timeout(self.timeout);
        match &self.token {
            Some(token) => config.with_auth_token(token.clone()),
            None => config,
        }
    }

    /// Creates an engine over the HTTP gateway.
    pub fn engine(&self, config: SyncConfig) -> CommandResult<HttpEngine> {
        info!("Connecting to {}", config.server_url);
        let client = ReqwestClient::new(&config)?;
        let store = HttpRemoteStore::from_config(&config, client);
        Ok(SyncEngine::new(config, store))
    }
}

/// Parses a `YYYY-MM-DD` (or timestamp) argument.
pub fn parse_day(raw: &str) -> CommandResult<NaiveDate> {
    parse_date(raw).map_err(|e| format!("invalid date {raw:?}: {e}").into())
}

/// Checks a 0-based ledger index.
pub fn check_index(cache: &LocalCache, index: usize) -> CommandResult {
    if index < cache.expenses().len() {
        Ok(())
    } else {
        Err(format!(
            "no expense #{index} (ledger has {})",
            cache.expenses().len()
        )
        .into())
    }
}
