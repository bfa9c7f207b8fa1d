use crate::domain_model::OpaqueTokenValue;
use crate::domain_port::{DeferredTaskScheduler, OpaqueTokenStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Removes superseded refresh tokens only after `leeway`, so a sibling request
/// that read the old record just before rotation still finds it.
#[derive(Clone)]
pub struct DeferredDeletion {
    store: Arc<dyn OpaqueTokenStore>,
    scheduler: Arc<dyn DeferredTaskScheduler>,
    leeway: Duration,
}

impl DeferredDeletion {
    pub fn new(
        store: Arc<dyn OpaqueTokenStore>,
        scheduler: Arc<dyn DeferredTaskScheduler>,
        leeway: Duration,
    ) -> Self {
        Self {
            store,
            scheduler,
            leeway,
        }
    }

    pub fn leeway(&self) -> Duration {
        self.leeway
    }

    pub fn schedule(&self, token: OpaqueTokenValue) {
        let store = self.store.clone();
        let effect = async move {
            match store.delete(&token).await {
                Ok(()) => debug!(?token, "deleted superseded refresh token"),
                Err(e) => warn!(?token, error = %e, "failed to delete superseded refresh token"),
            }
        };
        self.scheduler.schedule(Box::pin(effect), self.leeway);
    }
}
