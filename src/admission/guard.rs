use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{Credential, Registry};

/// Everything shared between request workers and the console worker.
#[derive(Debug, Default)]
pub struct GuardedState {
    pub registry: Registry,
    pub credential: Credential,
}

/// Serializes every mutation of the registry and the credential.
///
/// Writers hold the write half for the whole read-check-persist-apply sequence, so readers
/// (which share the read half) never observe a half-applied change.
#[derive(Debug, Default)]
pub struct AccessGuard {
    state: RwLock<GuardedState>,
}

impl AccessGuard {
    #[must_use]
    pub fn new(registry: Registry, credential: Credential) -> Self {
        Self {
            state: RwLock::new(GuardedState {
                registry,
                credential,
            }),
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, GuardedState> {
        self.state.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, GuardedState> {
        self.state.write().await
    }
}
