//! Main ledger server.

use crate::config::ServerConfig;
use crate::handler::{HandlerContext, RequestHandler};
use crate::routes::build_router;
use crate::store::LedgerStore;
use axum::Router;
use std::sync::Arc;

/// The ledger server.
///
/// Owns the authoritative expense and budget tables and exposes them
/// either as an axum [`Router`] or through [`LedgerServer::route`] for
/// in-process callers.
///
/// # Example
///
/// ```
/// use ledgersync_server::{LedgerServer, ServerConfig};
///
/// let server = LedgerServer::new(ServerConfig::default());
/// let (status, body) = server.route("GET", "/api/budget/1", b"");
/// assert_eq!(status, 200);
/// assert_eq!(body, b"null");
/// ```
pub struct LedgerServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl LedgerServer {
    /// Creates a server with empty tables.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_store(config, Arc::new(LedgerStore::new()))
    }

    /// Creates a server over an existing store.
    pub fn with_store(config: ServerConfig, store: Arc<LedgerStore>) -> Self {
        let context = Arc::new(HandlerContext::new(config, store));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self { handler, context }
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }

    /// Returns the request handler.
    pub fn handler(&self) -> &RequestHandler {
        &self.handler
    }

    /// Returns the backing store.
    pub fn store(&self) -> &Arc<LedgerStore> {
        &self.context.store
    }

    /// Dispatches a raw request. See [`RequestHandler::route`].
    pub fn route(&self, method: &str, path: &str, body: &[u8]) -> (u16, Vec<u8>) {
        self.handler.route(method, path, body)
    }

    /// Builds the HTTP router for this server.
    pub fn router(&self) -> Router {
        build_router(self.handler.clone())
    }

    /// Number of expense rows across all users.
    pub fn expense_count(&self) -> usize {
        self.context.store.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgersync_protocol::{Expense, UserId};

    #[test]
    fn server_lifecycle() {
        let server = LedgerServer::new(ServerConfig::default());
        assert_eq!(server.expense_count(), 0);
        assert_eq!(server.config().api_prefix, "/api");
    }

    #[test]
    fn shared_store_is_visible() {
        let store = Arc::new(LedgerStore::new());
        let server = LedgerServer::with_store(ServerConfig::default(), Arc::clone(&store));

        let body = br#"{"userId": 3, "expenses": [
            {"name": "Coffee", "cost": 4.5, "category": "Food", "date": "2024-03-01"}
        ]}"#;
        let (status, _) = server.route("POST", "/api/expenses/sync", body);
        assert_eq!(status, 200);
        assert_eq!(store.expenses_for(UserId::new(3)).len(), 1);

        let (_, body) = server.route("GET", "/api/expenses/3", b"");
        let rows: Vec<Expense> = serde_json::from_slice(&body).unwrap();
        assert_eq!(rows[0].name, "Coffee");
    }
}
