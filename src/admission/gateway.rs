use secrecy::SecretString;
use std::{future::Future, sync::Arc};
use tracing::{debug, error, info, instrument, warn, Instrument};

use super::{
    validate_username, AccessGuard, AdmissionError, AdmissionRecord, Credential, Registry,
    Transition,
};
use crate::storage::{StorageError, Store};

/// Moderation operations shared by the HTTP API and the admin console.
///
/// One instance is built at start-up and handed to every collaborator behind an `Arc`.
/// Mutations run on their own task, so a caller that goes away (a disconnected HTTP client,
/// a timeout) cannot stop one between the durable write and the cache update.
#[derive(Debug)]
pub struct Gateway {
    core: Arc<Core>,
}

#[derive(Debug)]
struct Core {
    guard: AccessGuard,
    store: Arc<dyn Store>,
}

fn storage_failure(operation: &'static str, err: StorageError) -> AdmissionError {
    error!("Storage failure during {operation}: {err}");
    AdmissionError::StorageFailure(err)
}

impl Gateway {
    /// Loads the passkey and admission records from `store`, seeding `default_passkey` when the
    /// store has none yet.
    ///
    /// # Errors
    /// Returns `AdmissionError::StorageFailure` if the store cannot be read or seeded, or
    /// `AdmissionError::InvalidInput` if `default_passkey` is empty and must be seeded.
    pub async fn load(
        store: Arc<dyn Store>,
        default_passkey: SecretString,
    ) -> Result<Self, AdmissionError> {
        let passkey = match store
            .load_passkey()
            .await
            .map_err(|err| storage_failure("load", err))?
        {
            Some(passkey) => passkey,
            None => {
                Credential::check(&default_passkey)?;
                store
                    .save_passkey(&default_passkey)
                    .await
                    .map_err(|err| storage_failure("load", err))?;
                info!("Seeded default passkey");
                default_passkey
            }
        };

        let records = store
            .load_records()
            .await
            .map_err(|err| storage_failure("load", err))?;
        debug!("Loaded {} admission records", records.len());

        Ok(Self {
            core: Arc::new(Core {
                guard: AccessGuard::new(Registry::from_records(records), Credential::new(passkey)),
                store,
            }),
        })
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.core.store
    }

    /// Runs a mutation to completion on a spawned task and waits for its result.
    ///
    /// Dropping the returned future leaves the task running, so the store write and the cache
    /// update always happen together.
    async fn detached<F, Fut, T>(&self, operation: &'static str, run: F) -> Result<T, AdmissionError>
    where
        F: FnOnce(Arc<Core>) -> Fut,
        Fut: Future<Output = Result<T, AdmissionError>> + Send + 'static,
        T: Send + 'static,
    {
        tokio::spawn(run(Arc::clone(&self.core)).in_current_span())
            .await
            .map_err(|err| {
                storage_failure(
                    operation,
                    StorageError::Unavailable(format!("{operation} task failed: {err}")),
                )
            })?
    }

    /// Creates a pending record for `username`.
    ///
    /// # Errors
    /// `InvalidInput` for a malformed username, `AlreadyExists` if it is taken,
    /// `StorageFailure` if the write fails.
    pub async fn register(&self, username: &str) -> Result<AdmissionRecord, AdmissionError> {
        validate_username(username)?;

        let username = username.to_string();
        self.detached("register", move |core| async move {
            core.register(&username).await
        })
        .await
    }

    /// Pending → Approved.
    ///
    /// # Errors
    /// `NotFound`, `IllegalTransition` or `StorageFailure`.
    pub async fn approve(&self, username: &str) -> Result<AdmissionRecord, AdmissionError> {
        self.transition(username, Transition::Approve).await
    }

    /// Pending → Denied with a non-empty reason.
    ///
    /// # Errors
    /// `InvalidInput` for a blank reason, then as [`Gateway::approve`].
    pub async fn deny(
        &self,
        username: &str,
        reason: &str,
    ) -> Result<AdmissionRecord, AdmissionError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AdmissionError::InvalidInput(
                "deny requires a reason".to_string(),
            ));
        }

        self.transition(
            username,
            Transition::Deny {
                reason: reason.to_string(),
            },
        )
        .await
    }

    /// Approved → Banned. A blank reason falls back to the default ban text.
    ///
    /// # Errors
    /// As [`Gateway::approve`].
    pub async fn ban(
        &self,
        username: &str,
        reason: Option<&str>,
    ) -> Result<AdmissionRecord, AdmissionError> {
        let reason = reason
            .map(str::trim)
            .filter(|reason| !reason.is_empty())
            .map(ToString::to_string);

        self.transition(username, Transition::Ban { reason }).await
    }

    /// Banned → Approved.
    ///
    /// # Errors
    /// As [`Gateway::approve`].
    pub async fn unban(&self, username: &str) -> Result<AdmissionRecord, AdmissionError> {
        self.transition(username, Transition::Unban).await
    }

    async fn transition(
        &self,
        username: &str,
        transition: Transition,
    ) -> Result<AdmissionRecord, AdmissionError> {
        let username = username.to_string();
        self.detached(transition.operation(), move |core| async move {
            core.transition(&username, transition).await
        })
        .await
    }

    /// Moves the record for `old` to `new`, keeping its status and reason.
    ///
    /// # Errors
    /// `InvalidInput` for a malformed `new`, `NotFound` if `old` is absent, `AlreadyExists` if
    /// `new` is taken, `StorageFailure` if the write fails.
    pub async fn rename(&self, old: &str, new: &str) -> Result<AdmissionRecord, AdmissionError> {
        validate_username(new)?;

        let (old, new) = (old.to_string(), new.to_string());
        self.detached("rename", move |core| async move {
            core.rename(&old, &new).await
        })
        .await
    }

    /// Hard-deletes the record for `username`.
    ///
    /// # Errors
    /// `NotFound` if absent, `StorageFailure` if the delete fails.
    pub async fn remove(&self, username: &str) -> Result<AdmissionRecord, AdmissionError> {
        let username = username.to_string();
        self.detached("remove", move |core| async move {
            core.remove(&username).await
        })
        .await
    }

    /// Current record for `username`. Unknown usernames are `NotFound`, never treated as denied.
    ///
    /// # Errors
    /// `NotFound` if there is no record.
    pub async fn status(&self, username: &str) -> Result<AdmissionRecord, AdmissionError> {
        self.core
            .guard
            .read()
            .await
            .registry
            .get(username)
            .cloned()
            .ok_or_else(|| AdmissionError::NotFound(username.to_string()))
    }

    pub async fn list(&self) -> Vec<AdmissionRecord> {
        self.core.guard.read().await.registry.list()
    }

    /// Checks `candidate` against the current passkey.
    ///
    /// # Errors
    /// `CredentialMismatch` if it does not match.
    pub async fn verify_passkey(&self, candidate: &str) -> Result<(), AdmissionError> {
        if self.core.guard.read().await.credential.verify(candidate) {
            Ok(())
        } else {
            warn!("Passkey verification failed");
            Err(AdmissionError::CredentialMismatch)
        }
    }

    /// Replaces the passkey.
    ///
    /// # Errors
    /// `InvalidInput` for an empty passkey, `StorageFailure` if the write fails.
    pub async fn rotate_passkey(&self, passkey: SecretString) -> Result<(), AdmissionError> {
        Credential::check(&passkey)?;

        self.detached("rotate", move |core| async move {
            core.rotate_passkey(passkey).await
        })
        .await
    }

    /// Copy of the current passkey, for the opt-in read endpoint.
    pub async fn current_passkey(&self) -> SecretString {
        self.core.guard.read().await.credential.secret().clone()
    }
}

// Each method holds the write half from the registry check through the cache update.
impl Core {
    #[instrument(skip(self))]
    async fn register(&self, username: &str) -> Result<AdmissionRecord, AdmissionError> {
        let mut state = self.guard.write().await;
        if state.registry.contains(username) {
            return Err(AdmissionError::AlreadyExists(username.to_string()));
        }

        let record = AdmissionRecord::pending(username);
        self.store
            .insert_record(&record)
            .await
            .map_err(|err| storage_failure("register", err))?;
        let record = state.registry.create(username)?.clone();

        info!("Registered {username}");
        Ok(record)
    }

    #[instrument(skip(self), fields(operation = transition.operation()))]
    async fn transition(
        &self,
        username: &str,
        transition: Transition,
    ) -> Result<AdmissionRecord, AdmissionError> {
        let mut state = self.guard.write().await;

        let current = state
            .registry
            .get(username)
            .ok_or_else(|| AdmissionError::NotFound(username.to_string()))?;
        let next = transition.apply(current).inspect_err(|err| {
            debug!("Rejected transition: {err}");
        })?;

        self.store
            .update_record(&next)
            .await
            .map_err(|err| storage_failure(transition.operation(), err))?;
        let record = state
            .registry
            .set_status(username, next.status, next.reason)?
            .clone();

        info!("{username} is now {}", record.status);
        Ok(record)
    }

    #[instrument(skip(self))]
    async fn rename(&self, old: &str, new: &str) -> Result<AdmissionRecord, AdmissionError> {
        let mut state = self.guard.write().await;
        if !state.registry.contains(old) {
            return Err(AdmissionError::NotFound(old.to_string()));
        }
        if state.registry.contains(new) {
            return Err(AdmissionError::AlreadyExists(new.to_string()));
        }

        self.store
            .rename_record(old, new)
            .await
            .map_err(|err| storage_failure("rename", err))?;
        let record = state.registry.rename(old, new)?.clone();

        info!("Renamed {old} to {new}");
        Ok(record)
    }

    #[instrument(skip(self))]
    async fn remove(&self, username: &str) -> Result<AdmissionRecord, AdmissionError> {
        let mut state = self.guard.write().await;
        if !state.registry.contains(username) {
            return Err(AdmissionError::NotFound(username.to_string()));
        }

        self.store
            .delete_record(username)
            .await
            .map_err(|err| storage_failure("remove", err))?;
        let record = state.registry.remove(username)?;

        info!("Removed {username}");
        Ok(record)
    }

    #[instrument(skip_all)]
    async fn rotate_passkey(&self, passkey: SecretString) -> Result<(), AdmissionError> {
        let mut state = self.guard.write().await;
        self.store
            .save_passkey(&passkey)
            .await
            .map_err(|err| storage_failure("rotate", err))?;
        state.credential.rotate(passkey)?;

        info!("Passkey rotated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::{Status, DEFAULT_BAN_REASON, DEFAULT_PASSKEY};
    use crate::storage::MemoryStore;
    use secrecy::ExposeSecret;

    async fn gateway() -> Gateway {
        Gateway::load(
            Arc::new(MemoryStore::new()),
            SecretString::from(DEFAULT_PASSKEY),
        )
        .await
        .expect("gateway")
    }

    #[tokio::test]
    async fn load_seeds_default_passkey_once() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let gateway = Gateway::load(Arc::clone(&store), SecretString::from("first"))
            .await
            .expect("first load");
        gateway.verify_passkey("first").await.expect("seeded");

        // A second load must keep the stored passkey, not the new default.
        let gateway = Gateway::load(store, SecretString::from("second"))
            .await
            .expect("second load");
        gateway.verify_passkey("first").await.expect("kept");
        assert!(gateway.verify_passkey("second").await.is_err());
    }

    #[tokio::test]
    async fn load_rejects_empty_default_on_empty_store() {
        let result = Gateway::load(Arc::new(MemoryStore::new()), SecretString::from("")).await;
        assert!(matches!(result, Err(AdmissionError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn register_then_status_is_pending() {
        let gateway = gateway().await;
        gateway.register("alice").await.expect("register");

        let record = gateway.status("alice").await.expect("status");
        assert_eq!(record.status, Status::Pending);
        assert_eq!(record.reason, None);
    }

    #[tokio::test]
    async fn register_validates_username() {
        let gateway = gateway().await;
        for username in ["", "has space", "sixteen_chars_xx"] {
            assert!(matches!(
                gateway.register(username).await,
                Err(AdmissionError::InvalidInput(_))
            ));
        }
        assert!(gateway.list().await.is_empty());
    }

    #[tokio::test]
    async fn deny_requires_reason() {
        let gateway = gateway().await;
        gateway.register("alice").await.expect("register");

        assert!(matches!(
            gateway.deny("alice", "   ").await,
            Err(AdmissionError::InvalidInput(_))
        ));
        assert_eq!(
            gateway.status("alice").await.expect("status").status,
            Status::Pending
        );
    }

    #[tokio::test]
    async fn ban_blank_reason_uses_default() {
        let gateway = gateway().await;
        gateway.register("alice").await.expect("register");
        gateway.approve("alice").await.expect("approve");

        let record = gateway.ban("alice", Some("  ")).await.expect("ban");
        assert_eq!(record.reason.as_deref(), Some(DEFAULT_BAN_REASON));
    }

    #[tokio::test]
    async fn status_of_unknown_is_not_found() {
        let gateway = gateway().await;
        assert!(matches!(
            gateway.status("ghost").await,
            Err(AdmissionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn operations_on_unknown_are_not_found() {
        let gateway = gateway().await;
        assert!(matches!(
            gateway.approve("ghost").await,
            Err(AdmissionError::NotFound(_))
        ));
        assert!(matches!(
            gateway.deny("ghost", "spam").await,
            Err(AdmissionError::NotFound(_))
        ));
        assert!(matches!(
            gateway.ban("ghost", None).await,
            Err(AdmissionError::NotFound(_))
        ));
        assert!(matches!(
            gateway.unban("ghost").await,
            Err(AdmissionError::NotFound(_))
        ));
        assert!(matches!(
            gateway.remove("ghost").await,
            Err(AdmissionError::NotFound(_))
        ));
        assert!(matches!(
            gateway.rename("ghost", "bob").await,
            Err(AdmissionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn rename_validates_target() {
        let gateway = gateway().await;
        gateway.register("alice").await.expect("register");
        assert!(matches!(
            gateway.rename("alice", "bad name").await,
            Err(AdmissionError::InvalidInput(_))
        ));
        gateway.status("alice").await.expect("still there");
    }

    #[tokio::test]
    async fn remove_deletes_record() {
        let gateway = gateway().await;
        gateway.register("alice").await.expect("register");
        gateway.remove("alice").await.expect("remove");
        assert!(matches!(
            gateway.status("alice").await,
            Err(AdmissionError::NotFound(_))
        ));
        // The username is free again.
        gateway.register("alice").await.expect("register again");
    }

    #[tokio::test]
    async fn rotate_rejects_empty_passkey() {
        let gateway = gateway().await;
        assert!(matches!(
            gateway.rotate_passkey(SecretString::from("")).await,
            Err(AdmissionError::InvalidInput(_))
        ));
        gateway
            .verify_passkey(DEFAULT_PASSKEY)
            .await
            .expect("unchanged");
    }

    #[tokio::test]
    async fn rotate_is_persisted() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let gateway = Gateway::load(Arc::clone(&store), SecretString::from(DEFAULT_PASSKEY))
            .await
            .expect("gateway");
        gateway
            .rotate_passkey(SecretString::from("newsecret"))
            .await
            .expect("rotate");

        let stored = store.load_passkey().await.expect("load").expect("passkey");
        assert_eq!(stored.expose_secret(), "newsecret");
        assert_eq!(gateway.current_passkey().await.expose_secret(), "newsecret");
    }
}
