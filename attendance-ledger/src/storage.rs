//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `participants` - Participant records (key: identity)
//! - `attendance` - Attendance records (key: identity || 0x00 || day)
//! - `meta` - Fixed configuration values (key: name)
//!
//! Identities are ASCII graphic, so the 0x00 separator never occurs inside
//! one and `identity || 0x00` is an exact prefix for that identity's days.

use crate::{
    error::{Error, Result},
    roles::ParticipantDirectory,
    types::{AttendanceRecord, DayKey, Identity, Participant},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteOptions, DB,
};
use std::sync::Arc;

/// Column family names
const CF_PARTICIPANTS: &str = "participants";
const CF_ATTENDANCE: &str = "attendance";
const CF_META: &str = "meta";

/// Meta key holding the administrator identity
const META_ADMIN: &[u8] = b"admin";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
    sync_writes: bool,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_PARTICIPANTS, Self::cf_options_point_lookup()),
            ColumnFamilyDescriptor::new(CF_ATTENDANCE, Self::cf_options_attendance()),
            ColumnFamilyDescriptor::new(CF_META, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened attendance store");

        Ok(Self {
            db: Arc::new(db),
            sync_writes: config.rocksdb.sync_writes,
        })
    }

    // Column family options

    fn cf_options_point_lookup() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_options_attendance() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        opts
    }

    // Administrator

    /// Administrator identity recorded at initialization, if any
    pub fn stored_admin(&self) -> Result<Option<Identity>> {
        let cf = self.cf_handle(CF_META)?;
        match self.db.get_cf(cf, META_ADMIN)? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Record the administrator on first open; refuse a different one later
    pub fn initialize_admin(&self, admin: &Identity) -> Result<()> {
        match self.stored_admin()? {
            Some(stored) if stored == *admin => Ok(()),
            Some(stored) => Err(Error::Config(format!(
                "store was initialized with administrator {}, refusing {}",
                stored, admin
            ))),
            None => {
                let cf = self.cf_handle(CF_META)?;
                let value = bincode::serialize(admin)?;
                self.db
                    .put_cf_opt(cf, META_ADMIN, &value, &self.write_options())?;
                tracing::info!(admin = %admin, "Administrator recorded");
                Ok(())
            }
        }
    }

    // Participant operations

    /// Put participant record (full replace)
    pub fn put_participant(&self, participant: &Participant) -> Result<()> {
        let cf = self.cf_handle(CF_PARTICIPANTS)?;
        let value = bincode::serialize(participant)?;

        self.db.put_cf_opt(
            cf,
            participant.identity.as_bytes(),
            &value,
            &self.write_options(),
        )?;

        tracing::debug!(
            identity = %participant.identity,
            registered = participant.registered,
            "Participant stored"
        );

        Ok(())
    }

    /// Get participant record by identity
    pub fn get_participant(&self, identity: &Identity) -> Result<Option<Participant>> {
        let cf = self.cf_handle(CF_PARTICIPANTS)?;
        match self.db.get_cf(cf, identity.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    // Attendance operations

    /// Put attendance record (full replace of the (identity, day) key)
    pub fn put_attendance(&self, record: &AttendanceRecord) -> Result<()> {
        let cf = self.cf_handle(CF_ATTENDANCE)?;
        let key = Self::attendance_key(&record.identity, record.day);
        let value = bincode::serialize(record)?;

        self.db.put_cf_opt(cf, &key, &value, &self.write_options())?;

        tracing::debug!(
            identity = %record.identity,
            day = %record.day,
            present = record.present,
            "Attendance stored"
        );

        Ok(())
    }

    /// Get attendance record for (identity, day)
    pub fn get_attendance(
        &self,
        identity: &Identity,
        day: DayKey,
    ) -> Result<Option<AttendanceRecord>> {
        let cf = self.cf_handle(CF_ATTENDANCE)?;
        let key = Self::attendance_key(identity, day);
        match self.db.get_cf(cf, &key)? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// All attendance records of an identity, ordered by day
    pub fn attendance_history(&self, identity: &Identity) -> Result<Vec<AttendanceRecord>> {
        let cf = self.cf_handle(CF_ATTENDANCE)?;
        let prefix = Self::attendance_prefix(identity);

        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));

        let mut records = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            records.push(bincode::deserialize(&value)?);
        }

        Ok(records)
    }

    // Key helpers

    fn attendance_prefix(identity: &Identity) -> Vec<u8> {
        let mut key = identity.as_bytes().to_vec();
        key.push(0x00);
        key
    }

    fn attendance_key(identity: &Identity, day: DayKey) -> Vec<u8> {
        let mut key = Self::attendance_prefix(identity);
        key.extend_from_slice(&day.to_key_bytes());
        key
    }

    // Statistics

    /// Get storage statistics (full scan)
    pub fn get_stats(&self) -> Result<StorageStats> {
        let cf_participants = self.cf_handle(CF_PARTICIPANTS)?;
        let cf_attendance = self.cf_handle(CF_ATTENDANCE)?;

        let mut total_participants = 0u64;
        let mut registered_participants = 0u64;
        for item in self.db.iterator_cf(cf_participants, IteratorMode::Start) {
            let (_, value) = item?;
            let participant: Participant = bincode::deserialize(&value)?;
            total_participants += 1;
            if participant.registered {
                registered_participants += 1;
            }
        }

        let mut attendance_records = 0u64;
        for item in self.db.iterator_cf(cf_attendance, IteratorMode::Start) {
            item?;
            attendance_records += 1;
        }

        Ok(StorageStats {
            total_participants,
            registered_participants,
            attendance_records,
        })
    }
}

impl ParticipantDirectory for Storage {
    fn participant(&self, identity: &Identity) -> Result<Option<Participant>> {
        self.get_participant(identity)
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.db.path())
            .field("sync_writes", &self.sync_writes)
            .finish()
    }
}

/// Storage statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct StorageStats {
    /// Participant records ever created (including evicted)
    pub total_participants: u64,
    /// Participant records with `registered = true`
    pub registered_participants: u64,
    /// Attendance records across all identities and days
    pub attendance_records: u64,
}
