//! Per-server concurrency limits
//!
//! Each distinct server gets its own semaphore, so a slow or struggling host
//! never sees more than `per_server` requests at once while other servers
//! keep making progress.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Lazily created semaphores keyed by server short id
#[derive(Debug)]
pub struct ServerLimiter {
    per_server: usize,
    semaphores: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl ServerLimiter {
    /// Limiter allowing `per_server` in-flight requests per server (at least one)
    pub fn new(per_server: usize) -> Self {
        Self {
            per_server: per_server.max(1),
            semaphores: Mutex::new(HashMap::new()),
        }
    }

    /// Configured in-flight cap
    pub fn per_server(&self) -> usize {
        self.per_server
    }

    /// Semaphore for `server_id`, created on first use
    pub fn semaphore_for(&self, server_id: &str) -> Arc<Semaphore> {
        let mut semaphores = self
            .semaphores
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        semaphores
            .entry(server_id.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_server)))
            .clone()
    }
}
