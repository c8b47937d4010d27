//! Shared state handed to every request handler.

use std::sync::Arc;

use super::auth::SessionKey;
use super::rate_limit::RateLimiter;
use crate::config::Config;
use crate::privacy::Anonymizer;
use crate::storage::SharedStorage;
use crate::validation::Validator;

/// Everything the handlers need, cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Database handle.
    pub storage: SharedStorage,
    /// Loaded configuration.
    pub config: Arc<Config>,
    /// Hasher for client IPs and user agents.
    pub anonymizer: Arc<Anonymizer>,
    /// Submission and feedback checks.
    pub validator: Arc<Validator>,
    /// Write endpoint limiter.
    pub limiter: Arc<RateLimiter>,
    /// Admin session signing key.
    pub sessions: Arc<SessionKey>,
}

impl AppState {
    /// Build the state from storage and configuration.
    #[must_use]
    pub fn new(storage: SharedStorage, config: Config) -> Self {
        Self {
            anonymizer: Arc::new(Anonymizer::new(&config.privacy.hash_salt)),
            validator: Arc::new(Validator::new(&config.submissions)),
            limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
            sessions: Arc::new(SessionKey::from_config(&config)),
            config: Arc::new(config),
            storage,
        }
    }
}
