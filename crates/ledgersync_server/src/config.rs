//! Server configuration.

use std::net::SocketAddr;

/// Configuration for the ledger server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Path prefix the routes are mounted under (e.g. `/api`).
    pub api_prefix: String,
    /// Maximum number of records in one batch insert.
    pub max_insert_batch: usize,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            api_prefix: "/api".into(),
            max_insert_batch: 1000,
        }
    }

    /// Sets the route prefix. An empty prefix mounts routes at the root.
    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix: String = prefix.into();
        self.api_prefix = prefix.trim_end_matches('/').to_string();
        self
    }

    /// Sets the maximum batch insert size.
    pub fn with_max_insert_batch(mut self, size: usize) -> Self {
        self.max_insert_batch = size;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 8080)))
    }
}
