//! Attendance Ledger
//!
//! Per-day attendance records with a single fixed administrator.
//!
//! # Architecture
//!
//! - **Role Resolver**: Classifies callers as administrator, participant or unregistered
//! - **Single Writer**: One actor task applies every mutation behind its guard
//! - **RocksDB Storage**: Participants and attendance in separate column families
//! - **Explicit Ownership**: One [`Ledger`] per store, passed by reference, no globals
//!
//! # Invariants
//!
//! - At most one participant record per identity
//! - The administrator needs no participant record
//! - An (identity, day) write fully replaces the previous value
//! - Eviction deactivates registration and keeps attendance history

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod roles;
pub mod storage;
pub mod ledger;
pub mod error;
pub mod actor;
pub mod config;
pub mod metrics;
pub mod service;

// Re-exports
pub use error::{Error, Result};
pub use types::{
    AttendanceRecord, DayKey, Identity, MarkSource, Participant, Role, Timestamp,
};
pub use roles::{ParticipantDirectory, RoleResolver};
pub use storage::Storage;
pub use ledger::Ledger;
pub use config::Config;
