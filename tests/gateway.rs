use async_trait::async_trait;
use secrecy::SecretString;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use turnstile::{
    admission::{AdmissionError, AdmissionRecord, Gateway, Status, DEFAULT_PASSKEY},
    console,
    storage::{self, MemoryStore, StorageError, Store},
};
use ulid::Ulid;

/// Memory store whose writes can be switched off to simulate an outage.
#[derive(Debug, Default)]
struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
}

impl FlakyStore {
    fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("disk on fire".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for FlakyStore {
    fn backend(&self) -> &'static str {
        "flaky"
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.check()
    }

    async fn load_passkey(&self) -> Result<Option<SecretString>, StorageError> {
        self.inner.load_passkey().await
    }

    async fn save_passkey(&self, passkey: &SecretString) -> Result<(), StorageError> {
        self.check()?;
        self.inner.save_passkey(passkey).await
    }

    async fn load_records(&self) -> Result<Vec<AdmissionRecord>, StorageError> {
        self.inner.load_records().await
    }

    async fn insert_record(&self, record: &AdmissionRecord) -> Result<(), StorageError> {
        self.check()?;
        self.inner.insert_record(record).await
    }

    async fn update_record(&self, record: &AdmissionRecord) -> Result<(), StorageError> {
        self.check()?;
        self.inner.update_record(record).await
    }

    async fn rename_record(&self, old: &str, new: &str) -> Result<(), StorageError> {
        self.check()?;
        self.inner.rename_record(old, new).await
    }

    async fn delete_record(&self, username: &str) -> Result<(), StorageError> {
        self.check()?;
        self.inner.delete_record(username).await
    }
}

/// Memory store that commits each write and then stalls before returning.
#[derive(Debug, Default)]
struct SlowCommitStore {
    inner: MemoryStore,
}

const COMMIT_STALL: Duration = Duration::from_millis(50);

#[async_trait]
impl Store for SlowCommitStore {
    fn backend(&self) -> &'static str {
        "slow"
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.inner.ping().await
    }

    async fn load_passkey(&self) -> Result<Option<SecretString>, StorageError> {
        self.inner.load_passkey().await
    }

    async fn save_passkey(&self, passkey: &SecretString) -> Result<(), StorageError> {
        self.inner.save_passkey(passkey).await?;
        tokio::time::sleep(COMMIT_STALL).await;
        Ok(())
    }

    async fn load_records(&self) -> Result<Vec<AdmissionRecord>, StorageError> {
        self.inner.load_records().await
    }

    async fn insert_record(&self, record: &AdmissionRecord) -> Result<(), StorageError> {
        self.inner.insert_record(record).await?;
        tokio::time::sleep(COMMIT_STALL).await;
        Ok(())
    }

    async fn update_record(&self, record: &AdmissionRecord) -> Result<(), StorageError> {
        self.inner.update_record(record).await?;
        tokio::time::sleep(COMMIT_STALL).await;
        Ok(())
    }

    async fn rename_record(&self, old: &str, new: &str) -> Result<(), StorageError> {
        self.inner.rename_record(old, new).await?;
        tokio::time::sleep(COMMIT_STALL).await;
        Ok(())
    }

    async fn delete_record(&self, username: &str) -> Result<(), StorageError> {
        self.inner.delete_record(username).await?;
        tokio::time::sleep(COMMIT_STALL).await;
        Ok(())
    }
}

async fn memory_gateway() -> Arc<Gateway> {
    Arc::new(
        Gateway::load(
            Arc::new(MemoryStore::new()),
            SecretString::from(DEFAULT_PASSKEY),
        )
        .await
        .expect("gateway"),
    )
}

#[tokio::test]
async fn full_lifecycle() {
    let gateway = memory_gateway().await;

    gateway.register("alice").await.expect("register");
    gateway.approve("alice").await.expect("approve");
    let banned = gateway.ban("alice", Some("spam")).await.expect("ban");
    assert_eq!(banned.status, Status::Banned);
    assert_eq!(banned.reason.as_deref(), Some("spam"));

    let unbanned = gateway.unban("alice").await.expect("unban");
    assert_eq!(unbanned.status, Status::Approved);
    assert_eq!(unbanned.reason, None);
}

#[tokio::test]
async fn illegal_transitions_leave_record_untouched() {
    let gateway = memory_gateway().await;
    gateway.register("bob").await.expect("register");

    let err = gateway.ban("bob", None).await.unwrap_err();
    assert!(matches!(
        err,
        AdmissionError::IllegalTransition {
            from: Status::Pending,
            ..
        }
    ));
    assert!(matches!(
        gateway.unban("bob").await,
        Err(AdmissionError::IllegalTransition { .. })
    ));

    gateway.deny("bob", "no").await.expect("deny");
    assert!(matches!(
        gateway.approve("bob").await,
        Err(AdmissionError::IllegalTransition {
            from: Status::Denied,
            ..
        })
    ));

    let record = gateway.status("bob").await.expect("status");
    assert_eq!(record.status, Status::Denied);
    assert_eq!(record.reason.as_deref(), Some("no"));
}

#[tokio::test]
async fn concurrent_registers_admit_exactly_one() {
    let gateway = memory_gateway().await;

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let gateway = Arc::clone(&gateway);
            tokio::spawn(async move { gateway.register("racer").await })
        })
        .collect();

    let mut created = 0;
    let mut conflicts = 0;
    for task in tasks {
        match task.await.expect("task") {
            Ok(_) => created += 1,
            Err(AdmissionError::AlreadyExists(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(conflicts, 15);
    assert_eq!(gateway.list().await.len(), 1);
}

#[tokio::test]
async fn concurrent_moderation_applies_one_transition() {
    let gateway = memory_gateway().await;
    gateway.register("carol").await.expect("register");

    let approve = {
        let gateway = Arc::clone(&gateway);
        tokio::spawn(async move { gateway.approve("carol").await })
    };
    let deny = {
        let gateway = Arc::clone(&gateway);
        tokio::spawn(async move { gateway.deny("carol", "late").await })
    };

    let approved = approve.await.expect("task");
    let denied = deny.await.expect("task");
    assert!(approved.is_ok() ^ denied.is_ok());

    let record = gateway.status("carol").await.expect("status");
    if approved.is_ok() {
        assert_eq!(record.status, Status::Approved);
    } else {
        assert_eq!(record.status, Status::Denied);
    }
}

#[tokio::test]
async fn storage_failure_keeps_cache_unchanged() {
    let store = Arc::new(FlakyStore::default());
    let gateway = Gateway::load(
        Arc::clone(&store) as Arc<dyn Store>,
        SecretString::from(DEFAULT_PASSKEY),
    )
    .await
    .expect("gateway");
    gateway.register("dave").await.expect("register");

    store.fail(true);

    let err = gateway.approve("dave").await.unwrap_err();
    assert!(matches!(err, AdmissionError::StorageFailure(_)));
    assert!(err.is_retryable());
    assert_eq!(
        gateway.status("dave").await.expect("status").status,
        Status::Pending
    );

    assert!(matches!(
        gateway.register("erin").await,
        Err(AdmissionError::StorageFailure(_))
    ));
    assert!(matches!(
        gateway.status("erin").await,
        Err(AdmissionError::NotFound(_))
    ));

    assert!(matches!(
        gateway.rotate_passkey(SecretString::from("next")).await,
        Err(AdmissionError::StorageFailure(_))
    ));
    gateway
        .verify_passkey(DEFAULT_PASSKEY)
        .await
        .expect("old passkey still valid");

    assert!(matches!(
        gateway.remove("dave").await,
        Err(AdmissionError::StorageFailure(_))
    ));
    assert!(gateway.status("dave").await.is_ok());

    store.fail(false);
    gateway.approve("dave").await.expect("approve after recovery");
}

#[tokio::test]
async fn state_survives_restart() {
    let path = std::env::temp_dir().join(format!("turnstile-{}.db", Ulid::new()));
    let dsn = format!("sqlite://{}", path.display());

    {
        let store = storage::connect(Some(&dsn)).await.expect("connect");
        let gateway = Gateway::load(store, SecretString::from(DEFAULT_PASSKEY))
            .await
            .expect("gateway");
        gateway.register("frank").await.expect("register");
        gateway.approve("frank").await.expect("approve");
        gateway.ban("frank", None).await.expect("ban");
        gateway.register("grace").await.expect("register");
        gateway.deny("grace", "duplicate").await.expect("deny");
        gateway
            .rotate_passkey(SecretString::from("rotated"))
            .await
            .expect("rotate");
    }

    let store = storage::connect(Some(&dsn)).await.expect("reconnect");
    let gateway = Gateway::load(store, SecretString::from("ignored-default"))
        .await
        .expect("gateway");

    let frank = gateway.status("frank").await.expect("frank");
    assert_eq!(frank.status, Status::Banned);
    assert!(frank.reason.is_some());

    let grace = gateway.status("grace").await.expect("grace");
    assert_eq!(grace.status, Status::Denied);
    assert_eq!(grace.reason.as_deref(), Some("duplicate"));

    gateway.verify_passkey("rotated").await.expect("rotated");
    assert!(matches!(
        gateway.verify_passkey(DEFAULT_PASSKEY).await,
        Err(AdmissionError::CredentialMismatch)
    ));

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn console_and_gateway_share_state() {
    let gateway = memory_gateway().await;
    let (handle, _worker) = console::spawn(Arc::clone(&gateway));

    gateway.register("heidi").await.expect("register");
    assert_eq!(
        handle.submit("/accept heidi").await.as_deref(),
        Some("heidi: approved")
    );

    // Same illegal move, same error kind on both surfaces.
    let direct = gateway.approve("heidi").await.unwrap_err();
    let reply = handle.submit("/accept heidi").await.expect("reply");
    assert!(reply.starts_with(&format!("error ({})", direct.kind())), "{reply}");

    assert_eq!(
        handle.submit("/rename heidi ivan").await.as_deref(),
        Some("ivan: approved")
    );
    assert!(matches!(
        gateway.status("heidi").await,
        Err(AdmissionError::NotFound(_))
    ));
    assert_eq!(
        gateway.status("ivan").await.expect("ivan").status,
        Status::Approved
    );
}

#[tokio::test]
async fn abandoned_calls_still_update_the_cache() {
    let store = Arc::new(SlowCommitStore::default());
    let gateway = Gateway::load(
        Arc::clone(&store) as Arc<dyn Store>,
        SecretString::from(DEFAULT_PASSKEY),
    )
    .await
    .expect("gateway");
    let short = Duration::from_millis(10);

    // The caller gives up after the row is written but before the call returns.
    assert!(tokio::time::timeout(short, gateway.register("alice"))
        .await
        .is_err());

    // Readers wait on the guard until the detached write has reached the cache.
    let record = gateway.status("alice").await.expect("cache matches store");
    assert_eq!(record.status, Status::Pending);
    assert_eq!(store.load_records().await.expect("rows"), vec![record]);
    assert!(matches!(
        gateway.register("alice").await,
        Err(AdmissionError::AlreadyExists(_))
    ));

    assert!(tokio::time::timeout(short, gateway.approve("alice"))
        .await
        .is_err());
    assert_eq!(
        gateway.status("alice").await.expect("status").status,
        Status::Approved
    );

    assert!(tokio::time::timeout(short, gateway.rename("alice", "bob"))
        .await
        .is_err());
    gateway.status("bob").await.expect("renamed in cache");

    assert!(tokio::time::timeout(short, gateway.remove("bob"))
        .await
        .is_err());
    assert!(matches!(
        gateway.status("bob").await,
        Err(AdmissionError::NotFound(_))
    ));
    assert!(store.load_records().await.expect("rows").is_empty());

    assert!(
        tokio::time::timeout(short, gateway.rotate_passkey(SecretString::from("rotated")))
            .await
            .is_err()
    );
    gateway.verify_passkey("rotated").await.expect("rotated in cache");
}
