//! Actor-based concurrency for the ledger
//!
//! Every mutation goes through one writer task:
//! - The precondition guard and the write run back to back, with no other
//!   mutation in between, so check-then-mutate is atomic
//! - Competing writes to the same key are applied in mailbox order (last
//!   commit wins)
//! - Bounded mailbox gives backpressure to callers
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │               WriterHandle (Clone)                    │
//! │      Sends validated mutations to actor mailbox       │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              WriterActor (Single Task)                │
//! │   RoleResolver guard  →  Storage::put_*  → oneshot    │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! Reads do not pass through the actor; a write is committed before its
//! reply is sent, so a caller that awaited a mutation observes it on the
//! next read.

use crate::metrics::Metrics;
use crate::roles::RoleResolver;
use crate::types::{AttendanceRecord, DayKey, Identity, MarkSource, Participant};
use crate::{Error, Result, Storage};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

/// Message sent to the writer actor
#[derive(Debug)]
pub enum WriterMessage {
    /// Self-registration
    Register {
        identity: Identity,
        display_name: String,
        response: oneshot::Sender<Result<Participant>>,
    },

    /// Participant marks own attendance
    MarkOwn {
        identity: Identity,
        day: DayKey,
        response: oneshot::Sender<Result<AttendanceRecord>>,
    },

    /// Administrator override
    Modify {
        admin: Identity,
        target: Identity,
        day: DayKey,
        present: bool,
        response: oneshot::Sender<Result<AttendanceRecord>>,
    },

    /// Administrator eviction
    Evict {
        admin: Identity,
        target: Identity,
        response: oneshot::Sender<Result<()>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that applies ledger mutations
#[derive(Debug)]
pub struct WriterActor {
    storage: Arc<Storage>,
    resolver: RoleResolver<Storage>,
    mailbox: mpsc::Receiver<WriterMessage>,
    metrics: Metrics,
}

impl WriterActor {
    /// Create new actor
    pub fn new(
        storage: Arc<Storage>,
        resolver: RoleResolver<Storage>,
        mailbox: mpsc::Receiver<WriterMessage>,
        metrics: Metrics,
    ) -> Self {
        Self {
            storage,
            resolver,
            mailbox,
            metrics,
        }
    }

    /// Run the actor event loop until shutdown or all handles are dropped
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            if let WriterMessage::Shutdown = msg {
                tracing::info!("Writer actor shutting down");
                break;
            }
            self.handle_message(msg);
        }
    }

    fn handle_message(&mut self, msg: WriterMessage) {
        let started = Instant::now();

        match msg {
            WriterMessage::Register {
                identity,
                display_name,
                response,
            } => {
                let result = self.register(identity, display_name);
                self.observe(&result, &self.metrics.registrations_total, started);
                let _ = response.send(result);
            }

            WriterMessage::MarkOwn {
                identity,
                day,
                response,
            } => {
                let result = self.mark_own(identity, day);
                self.observe(&result, &self.metrics.marks_total, started);
                let _ = response.send(result);
            }

            WriterMessage::Modify {
                admin,
                target,
                day,
                present,
                response,
            } => {
                let result = self.modify(&admin, target, day, present);
                self.observe(&result, &self.metrics.overrides_total, started);
                let _ = response.send(result);
            }

            WriterMessage::Evict {
                admin,
                target,
                response,
            } => {
                let result = self.evict(&admin, &target);
                self.observe(&result, &self.metrics.evictions_total, started);
                let _ = response.send(result);
            }

            WriterMessage::Shutdown => {
                // Handled in run loop
            }
        }
    }

    fn observe<T>(&self, result: &Result<T>, success: &prometheus::IntCounter, started: Instant) {
        match result {
            Ok(_) => success.inc(),
            Err(e) => {
                if e.is_domain() {
                    tracing::warn!(reason = e.code(), "Mutation rejected: {}", e);
                } else {
                    tracing::error!("Mutation failed: {}", e);
                }
                self.metrics.record_rejection(e.code());
            }
        }
        self.metrics
            .record_duration(started.elapsed().as_secs_f64());
    }

    fn register(&self, identity: Identity, display_name: String) -> Result<Participant> {
        if let Some(existing) = self.storage.get_participant(&identity)? {
            if existing.registered {
                return Err(Error::AlreadyRegistered(identity.to_string()));
            }
            tracing::info!(identity = %identity, "Re-registering evicted participant");
        }

        let participant = Participant::new(identity, display_name);
        self.storage.put_participant(&participant)?;

        tracing::info!(identity = %participant.identity, "Participant registered");
        Ok(participant)
    }

    fn mark_own(&self, identity: Identity, day: DayKey) -> Result<AttendanceRecord> {
        if !self.resolver.is_registered(&identity)? {
            return Err(Error::NotRegistered(identity.to_string()));
        }

        let record = AttendanceRecord::new(identity, day, true, MarkSource::SelfMarked);
        self.storage.put_attendance(&record)?;
        Ok(record)
    }

    fn modify(
        &self,
        admin: &Identity,
        target: Identity,
        day: DayKey,
        present: bool,
    ) -> Result<AttendanceRecord> {
        if !self.resolver.is_admin(admin) {
            return Err(Error::NotAuthorized(admin.to_string()));
        }

        let record = AttendanceRecord::new(target, day, present, MarkSource::AdminOverride);
        self.storage.put_attendance(&record)?;

        tracing::info!(
            target_identity = %record.identity,
            day = %record.day,
            present,
            "Attendance overridden by administrator"
        );
        Ok(record)
    }

    fn evict(&self, admin: &Identity, target: &Identity) -> Result<()> {
        if !self.resolver.is_admin(admin) {
            return Err(Error::NotAuthorized(admin.to_string()));
        }

        // Unknown or already evicted targets are accepted silently
        if let Some(mut participant) = self.storage.get_participant(target)? {
            if participant.registered {
                participant.evict();
                self.storage.put_participant(&participant)?;
                tracing::info!(target_identity = %target, "Participant evicted");
            }
        }

        Ok(())
    }
}

/// Handle for sending mutations to the actor
#[derive(Clone, Debug)]
pub struct WriterHandle {
    sender: mpsc::Sender<WriterMessage>,
}

impl WriterHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<WriterMessage>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> WriterMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("Writer mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Register a participant
    pub async fn register(&self, identity: Identity, display_name: String) -> Result<Participant> {
        self.request(|response| WriterMessage::Register {
            identity,
            display_name,
            response,
        })
        .await
    }

    /// Mark own attendance
    pub async fn mark_own(&self, identity: Identity, day: DayKey) -> Result<AttendanceRecord> {
        self.request(|response| WriterMessage::MarkOwn {
            identity,
            day,
            response,
        })
        .await
    }

    /// Administrator override
    pub async fn modify(
        &self,
        admin: Identity,
        target: Identity,
        day: DayKey,
        present: bool,
    ) -> Result<AttendanceRecord> {
        self.request(|response| WriterMessage::Modify {
            admin,
            target,
            day,
            present,
            response,
        })
        .await
    }

    /// Administrator eviction
    pub async fn evict(&self, admin: Identity, target: Identity) -> Result<()> {
        self.request(|response| WriterMessage::Evict {
            admin,
            target,
            response,
        })
        .await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(WriterMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Writer mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the writer actor
pub fn spawn_writer_actor(
    storage: Arc<Storage>,
    resolver: RoleResolver<Storage>,
    metrics: Metrics,
    mailbox_capacity: usize,
) -> WriterHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity);
    let actor = WriterActor::new(storage, resolver, rx, metrics);

    tokio::spawn(async move {
        actor.run().await;
    });

    WriterHandle::new(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use tempfile::TempDir;

    fn id(raw: &str) -> Identity {
        Identity::parse(raw).unwrap()
    }

    fn spawn_test_actor() -> (WriterHandle, Arc<Storage>, Metrics, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::new("0xa", temp_dir.path());
        let storage = Arc::new(Storage::open(&config).unwrap());
        let resolver = RoleResolver::new(id("0xa"), Arc::clone(&storage));
        let metrics = Metrics::new().unwrap();
        let handle = spawn_writer_actor(Arc::clone(&storage), resolver, metrics.clone(), 16);
        (handle, storage, metrics, temp_dir)
    }

    #[tokio::test]
    async fn test_actor_spawn_and_shutdown() {
        let (handle, _storage, _metrics, _temp) = spawn_test_actor();
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_mutations_after_shutdown_fail() {
        let (handle, _storage, _metrics, _temp) = spawn_test_actor();
        handle.shutdown().await.unwrap();

        // give the actor a chance to drop its receiver
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let result = handle.register(id("0xb"), "Bob".into()).await;
        assert!(matches!(result, Err(Error::Concurrency(_))));
    }

    #[tokio::test]
    async fn test_register_guard() {
        let (handle, storage, metrics, _temp) = spawn_test_actor();

        handle.register(id("0xb"), "Bob".into()).await.unwrap();
        let second = handle.register(id("0xB"), "Robert".into()).await;
        assert!(matches!(second, Err(Error::AlreadyRegistered(_))));

        let stored = storage.get_participant(&id("0xb")).unwrap().unwrap();
        assert_eq!(stored.display_name, "Bob");
        assert_eq!(metrics.registrations_total.get(), 1);
        assert_eq!(
            metrics
                .rejections_total
                .with_label_values(&["already_registered"])
                .get(),
            1
        );

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_registration_single_winner() {
        let (handle, _storage, metrics, _temp) = spawn_test_actor();

        let mut tasks = Vec::new();
        for i in 0..8 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                handle.register(id("0xb"), format!("Bob {}", i)).await
            }));
        }

        let mut successes = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => successes += 1,
                Err(Error::AlreadyRegistered(_)) => {}
                Err(e) => panic!("unexpected error: {}", e),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(metrics.registrations_total.get(), 1);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_evict_unknown_target_is_noop() {
        let (handle, storage, metrics, _temp) = spawn_test_actor();

        handle.evict(id("0xa"), id("0xnobody")).await.unwrap();
        assert!(storage.get_participant(&id("0xnobody")).unwrap().is_none());
        assert_eq!(metrics.evictions_total.get(), 1);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_non_admin_rejected() {
        let (handle, _storage, metrics, _temp) = spawn_test_actor();
        let day = DayKey::from_timestamp(0);

        let modify = handle.modify(id("0xc"), id("0xb"), day, true).await;
        assert!(matches!(modify, Err(Error::NotAuthorized(_))));

        let evict = handle.evict(id("0xc"), id("0xb")).await;
        assert!(matches!(evict, Err(Error::NotAuthorized(_))));

        assert_eq!(
            metrics
                .rejections_total
                .with_label_values(&["not_authorized"])
                .get(),
            2
        );

        handle.shutdown().await.unwrap();
    }
}
