//! Pull command implementation.

use super::CommandResult;
use ledgersync_engine::{LocalCache, RemoteStore, SyncEngine, SyncError};
use tracing::info;

/// Replaces the cache with the remote ledger.
pub fn run<R: RemoteStore>(
    engine: &SyncEngine<R>,
    cache: &mut LocalCache,
    force: bool,
) -> CommandResult<usize> {
    info!("Pulling remote ledger of user {}", cache.user_id());
    match engine.pull(cache, force) {
        Ok(count) => {
            println!("Pulled {count} expenses");
            Ok(count)
        }
        Err(SyncError::UnsyncedChanges(detail)) => Err(format!(
            "refusing to pull over local changes ({detail}); sync first or pass --force"
        )
        .into()),
        Err(e) => Err(e.into()),
    }
}
