//! Main ledger orchestration layer
//!
//! This module ties together storage, role resolution and the writer actor
//! into the caller-facing attendance API. Raw caller input (identities,
//! names) is validated here, before anything reaches the writer; role and
//! state guards run inside the writer.
//!
//! # Example
//!
//! ```no_run
//! use attendance_ledger::{Config, Ledger};
//!
//! #[tokio::main]
//! async fn main() -> attendance_ledger::Result<()> {
//!     let ledger = Ledger::open(Config::new("0xA", "./data/attendance")).await?;
//!
//!     ledger.register_participant("0xB", "Bob").await?;
//!     ledger.mark_own_attendance("0xB", 1_700_000_000).await?;
//!     assert_eq!(ledger.check_attendance("0xB", 1_700_003_600)?, Some(true));
//!
//!     ledger.shutdown().await
//! }
//! ```

use crate::{
    actor::{spawn_writer_actor, WriterHandle},
    metrics::Metrics,
    roles::RoleResolver,
    storage::StorageStats,
    types::{
        normalize_display_name, AttendanceRecord, DayKey, Identity, Participant, Role, Timestamp,
    },
    Config, Error, Result, Storage,
};
use std::sync::Arc;

/// Attendance ledger
#[derive(Debug)]
pub struct Ledger {
    /// Writer actor handle for mutations
    handle: WriterHandle,

    /// Direct storage access (for reads)
    storage: Arc<Storage>,

    /// Role resolver over the same storage
    resolver: RoleResolver<Storage>,

    /// Metrics
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl Ledger {
    /// Open ledger with configuration
    ///
    /// The first open of a data directory fixes its administrator; later
    /// opens must name the same one.
    pub async fn open(config: Config) -> Result<Self> {
        let admin = config.validate()?;

        let storage = Arc::new(Storage::open(&config)?);
        storage.initialize_admin(&admin)?;

        let resolver = RoleResolver::new(admin, Arc::clone(&storage));
        let metrics =
            Metrics::new().map_err(|e| Error::Config(format!("Failed to create metrics: {}", e)))?;

        let handle = spawn_writer_actor(
            Arc::clone(&storage),
            resolver.clone(),
            metrics.clone(),
            config.mailbox_capacity,
        );

        tracing::info!(
            service = %config.service_name,
            admin = %resolver.admin(),
            "Attendance ledger opened"
        );

        Ok(Self {
            handle,
            storage,
            resolver,
            metrics,
            config,
        })
    }

    // Role predicates

    /// True iff `identity` is the administrator
    pub fn is_admin(&self, identity: &str) -> Result<bool> {
        self.resolver.is_admin_raw(identity)
    }

    /// True iff `identity` holds an active participant record
    pub fn is_registered(&self, identity: &str) -> Result<bool> {
        self.resolver.is_registered(&Identity::parse(identity)?)
    }

    /// Combined role of `identity`
    pub fn role(&self, identity: &str) -> Result<Role> {
        self.resolver.resolve(&Identity::parse(identity)?)
    }

    /// The fixed administrator identity
    pub fn admin(&self) -> &Identity {
        self.resolver.admin()
    }

    // Mutations

    /// Self-register `identity` under `display_name`
    ///
    /// Fails with `AlreadyRegistered` while an active record exists. An
    /// evicted identity gets a fresh record.
    pub async fn register_participant(
        &self,
        identity: &str,
        display_name: &str,
    ) -> Result<Participant> {
        let identity = Identity::parse(identity)?;
        let display_name = normalize_display_name(display_name)?;
        self.handle.register(identity, display_name).await
    }

    /// Mark the caller present for the day containing `timestamp`
    ///
    /// The caller must already be authenticated as `identity`.
    pub async fn mark_own_attendance(
        &self,
        identity: &str,
        timestamp: Timestamp,
    ) -> Result<AttendanceRecord> {
        let identity = Identity::parse(identity)?;
        self.handle
            .mark_own(identity, DayKey::from_timestamp(timestamp))
            .await
    }

    /// Administrator sets `target`'s attendance for the day containing `timestamp`
    pub async fn modify_attendance(
        &self,
        admin_identity: &str,
        target_identity: &str,
        timestamp: Timestamp,
        present: bool,
    ) -> Result<AttendanceRecord> {
        let admin = Identity::parse(admin_identity)?;
        let target = Identity::parse(target_identity)?;
        self.handle
            .modify(admin, target, DayKey::from_timestamp(timestamp), present)
            .await
    }

    /// Administrator deactivates `target`'s registration
    ///
    /// Succeeds identically whether or not `target` was ever registered.
    /// Attendance history is kept.
    pub async fn evict_user(&self, admin_identity: &str, target_identity: &str) -> Result<()> {
        let admin = Identity::parse(admin_identity)?;
        let target = Identity::parse(target_identity)?;
        self.handle.evict(admin, target).await
    }

    // Reads

    /// Recorded presence for the day containing `timestamp`
    ///
    /// `None` means nothing was ever written for that day; `Some(false)` is a
    /// recorded absence.
    pub fn check_attendance(&self, identity: &str, timestamp: Timestamp) -> Result<Option<bool>> {
        Ok(self
            .attendance_record(identity, timestamp)?
            .map(|record| record.present))
    }

    /// Full attendance record for the day containing `timestamp`
    pub fn attendance_record(
        &self,
        identity: &str,
        timestamp: Timestamp,
    ) -> Result<Option<AttendanceRecord>> {
        let identity = Identity::parse(identity)?;
        self.storage
            .get_attendance(&identity, DayKey::from_timestamp(timestamp))
    }

    /// Every recorded day for `identity`, oldest first
    pub fn attendance_history(&self, identity: &str) -> Result<Vec<AttendanceRecord>> {
        self.storage.attendance_history(&Identity::parse(identity)?)
    }

    /// Participant record, active or evicted
    pub fn participant(&self, identity: &str) -> Result<Option<Participant>> {
        self.storage.get_participant(&Identity::parse(identity)?)
    }

    /// Storage statistics
    pub fn stats(&self) -> Result<StorageStats> {
        self.storage.get_stats()
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration the ledger was opened with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shutdown ledger
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MarkSource, SECONDS_PER_DAY};
    use tempfile::TempDir;

    const T: Timestamp = 1_700_000_000;

    async fn create_test_ledger() -> (Ledger, TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = Config::new("0xA", temp_dir.path());
        (Ledger::open(config).await.unwrap(), temp_dir)
    }

    #[tokio::test]
    async fn test_ledger_open() {
        let (ledger, _temp) = create_test_ledger().await;
        assert_eq!(ledger.admin().as_str(), "0xa");
        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_requires_admin() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = Config::new("", temp_dir.path());
        let result = Ledger::open(config).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_reopen_keeps_state_and_admin() {
        let temp_dir = tempfile::tempdir().unwrap();

        let ledger = Ledger::open(Config::new("0xA", temp_dir.path())).await.unwrap();
        ledger.register_participant("0xB", "Bob").await.unwrap();
        ledger.mark_own_attendance("0xB", T).await.unwrap();
        ledger.shutdown().await.unwrap();
        // let the writer task drop its storage handle
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let ledger = Ledger::open(Config::new("0xa", temp_dir.path())).await.unwrap();
        assert!(ledger.is_registered("0xb").unwrap());
        assert_eq!(ledger.check_attendance("0xb", T).unwrap(), Some(true));
        ledger.shutdown().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let result = Ledger::open(Config::new("0xC", temp_dir.path())).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_register_trims_name() {
        let (ledger, _temp) = create_test_ledger().await;

        let participant = ledger.register_participant("0xB", "  Bob  ").await.unwrap();
        assert_eq!(participant.display_name, "Bob");
        assert!(participant.registered);

        let result = ledger.register_participant("0xC", "   ").await;
        assert!(matches!(result, Err(Error::InvalidName)));
        assert!(ledger.participant("0xC").unwrap().is_none());

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_identity_everywhere() {
        let (ledger, _temp) = create_test_ledger().await;

        assert!(matches!(ledger.is_admin(""), Err(Error::InvalidIdentity(_))));
        assert!(matches!(ledger.is_registered("a b"), Err(Error::InvalidIdentity(_))));
        assert!(matches!(
            ledger.register_participant(" ", "Bob").await,
            Err(Error::InvalidIdentity(_))
        ));
        assert!(matches!(
            ledger.mark_own_attendance("", T).await,
            Err(Error::InvalidIdentity(_))
        ));
        assert!(matches!(ledger.check_attendance("", T), Err(Error::InvalidIdentity(_))));
        assert!(matches!(
            ledger.modify_attendance("0xa", "", T, true).await,
            Err(Error::InvalidIdentity(_))
        ));
        assert!(matches!(
            ledger.evict_user("0xa", "x y").await,
            Err(Error::InvalidIdentity(_))
        ));

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_check_distinguishes_absent_from_unrecorded() {
        let (ledger, _temp) = create_test_ledger().await;

        assert_eq!(ledger.check_attendance("0xb", T).unwrap(), None);

        ledger.modify_attendance("0xa", "0xb", T, false).await.unwrap();
        assert_eq!(ledger.check_attendance("0xb", T).unwrap(), Some(false));

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_override_unregistered_target() {
        let (ledger, _temp) = create_test_ledger().await;

        let record = ledger.modify_attendance("0xA", "0xD", T, true).await.unwrap();
        assert_eq!(record.source, MarkSource::AdminOverride);
        assert!(!ledger.is_registered("0xd").unwrap());
        assert_eq!(ledger.check_attendance("0xd", T).unwrap(), Some(true));

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_admin_needs_no_participant_record() {
        let (ledger, _temp) = create_test_ledger().await;

        assert!(ledger.is_admin("0xa").unwrap());
        assert!(!ledger.is_registered("0xa").unwrap());
        assert_eq!(ledger.role("0xa").unwrap(), Role::Administrator);

        // but cannot mark own attendance without registering
        let result = ledger.mark_own_attendance("0xa", T).await;
        assert!(matches!(result, Err(Error::NotRegistered(_))));

        ledger.register_participant("0xa", "Admin").await.unwrap();
        ledger.mark_own_attendance("0xa", T).await.unwrap();
        assert_eq!(ledger.role("0xa").unwrap(), Role::Administrator);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_reregistration_after_eviction() {
        let (ledger, _temp) = create_test_ledger().await;

        ledger.register_participant("0xb", "Bob").await.unwrap();
        ledger.evict_user("0xa", "0xb").await.unwrap();
        assert_eq!(ledger.role("0xb").unwrap(), Role::Unregistered);

        let evicted = ledger.participant("0xb").unwrap().unwrap();
        assert!(!evicted.registered);
        assert!(evicted.evicted_at.is_some());

        let fresh = ledger.register_participant("0xb", "Robert").await.unwrap();
        assert_eq!(fresh.display_name, "Robert");
        assert!(fresh.evicted_at.is_none());
        assert!(ledger.is_registered("0xb").unwrap());

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_history_and_stats() {
        let (ledger, _temp) = create_test_ledger().await;

        ledger.register_participant("0xb", "Bob").await.unwrap();
        ledger.mark_own_attendance("0xb", T).await.unwrap();
        ledger
            .mark_own_attendance("0xb", T + SECONDS_PER_DAY)
            .await
            .unwrap();
        ledger
            .modify_attendance("0xa", "0xb", T + 2 * SECONDS_PER_DAY, false)
            .await
            .unwrap();

        let history = ledger.attendance_history("0xB").unwrap();
        let presence: Vec<bool> = history.iter().map(|r| r.present).collect();
        assert_eq!(presence, vec![true, true, false]);

        let stats = ledger.stats().unwrap();
        assert_eq!(stats.registered_participants, 1);
        assert_eq!(stats.attendance_records, 3);

        assert_eq!(ledger.metrics().marks_total.get(), 2);
        assert_eq!(ledger.metrics().overrides_total.get(), 1);

        ledger.shutdown().await.unwrap();
    }
}
