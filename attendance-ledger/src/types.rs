//! Core types for the attendance ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Case-insensitive identity comparison
//! - Stable day bucketing (same timestamp, same day key, always)

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds since the Unix epoch, as supplied by every caller
pub type Timestamp = i64;

/// Seconds in one UTC calendar day
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Maximum identity length (characters)
pub const MAX_IDENTITY_LEN: usize = 256;

/// Caller identity (account address or other opaque identifier)
///
/// Always stored normalised to ASCII lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity(String);

impl Identity {
    /// Parse and normalise a raw identity
    pub fn parse(raw: &str) -> crate::Result<Self> {
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(crate::Error::InvalidIdentity(
                "identity must not be empty".to_string(),
            ));
        }

        if trimmed.len() > MAX_IDENTITY_LEN {
            return Err(crate::Error::InvalidIdentity(format!(
                "identity exceeds {} characters",
                MAX_IDENTITY_LEN
            )));
        }

        if !trimmed.chars().all(|c| c.is_ascii_graphic()) {
            return Err(crate::Error::InvalidIdentity(format!(
                "identity contains invalid characters: {:?}",
                trimmed
            )));
        }

        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get as bytes (storage key form)
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// UTC calendar day, counted from 1970-01-01
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DayKey(i64);

impl DayKey {
    /// Truncate a timestamp to its calendar day
    pub fn from_timestamp(timestamp: Timestamp) -> Self {
        Self(timestamp.div_euclid(SECONDS_PER_DAY))
    }

    /// Day number since the epoch
    pub fn value(&self) -> i64 {
        self.0
    }

    /// First second of this day
    pub fn start_timestamp(&self) -> Timestamp {
        self.0.saturating_mul(SECONDS_PER_DAY)
    }

    /// Calendar date, if representable by chrono
    pub fn date(&self) -> Option<NaiveDate> {
        DateTime::<Utc>::from_timestamp(self.start_timestamp(), 0).map(|dt| dt.date_naive())
    }

    /// Order-preserving big-endian key bytes
    pub fn to_key_bytes(&self) -> [u8; 8] {
        ((self.0 as u64) ^ (1 << 63)).to_be_bytes()
    }

    /// Inverse of [`DayKey::to_key_bytes`]
    pub fn from_key_bytes(bytes: [u8; 8]) -> Self {
        Self((u64::from_be_bytes(bytes) ^ (1 << 63)) as i64)
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.date() {
            Some(date) => write!(f, "{}", date),
            None => write!(f, "day#{}", self.0),
        }
    }
}

/// Validate a display name, returning it trimmed
pub fn normalize_display_name(raw: &str) -> crate::Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(crate::Error::InvalidName);
    }
    Ok(trimmed.to_string())
}

/// Registered participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Participant identity
    pub identity: Identity,

    /// Name chosen at registration
    pub display_name: String,

    /// True until evicted
    pub registered: bool,

    /// When this record was (re)created
    pub registered_at: DateTime<Utc>,

    /// When this record was evicted, if ever
    pub evicted_at: Option<DateTime<Utc>>,
}

impl Participant {
    /// Create a fresh active record
    pub fn new(identity: Identity, display_name: String) -> Self {
        Self {
            identity,
            display_name,
            registered: true,
            registered_at: Utc::now(),
            evicted_at: None,
        }
    }

    /// Deactivate this record
    pub fn evict(&mut self) {
        self.registered = false;
        self.evicted_at = Some(Utc::now());
    }
}

/// Which path produced an attendance write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkSource {
    /// Participant marked their own attendance
    SelfMarked,
    /// Administrator override
    AdminOverride,
}

/// Attendance for one identity on one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// Whose attendance
    pub identity: Identity,

    /// Which day
    pub day: DayKey,

    /// Recorded presence (false is an explicit absence)
    pub present: bool,

    /// Who wrote the current value
    pub source: MarkSource,

    /// When the current value was written
    pub updated_at: DateTime<Utc>,
}

impl AttendanceRecord {
    /// Build a record stamped with the current time
    pub fn new(identity: Identity, day: DayKey, present: bool, source: MarkSource) -> Self {
        Self {
            identity,
            day,
            present,
            source,
            updated_at: Utc::now(),
        }
    }
}

/// Resolved role of a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The fixed administrator
    Administrator,
    /// Identity with an active participant record
    Participant,
    /// Never registered, or evicted
    Unregistered,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_case_insensitive() {
        let a = Identity::parse("0xAbCd").unwrap();
        let b = Identity::parse("  0xabcd ").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "0xabcd");
    }

    #[test]
    fn test_identity_rejects_malformed() {
        assert!(matches!(Identity::parse(""), Err(crate::Error::InvalidIdentity(_))));
        assert!(matches!(Identity::parse("   "), Err(crate::Error::InvalidIdentity(_))));
        assert!(matches!(Identity::parse("0x a"), Err(crate::Error::InvalidIdentity(_))));
        assert!(matches!(Identity::parse("0x\u{0}a"), Err(crate::Error::InvalidIdentity(_))));
        assert!(matches!(Identity::parse("äbc"), Err(crate::Error::InvalidIdentity(_))));

        let long = "a".repeat(MAX_IDENTITY_LEN + 1);
        assert!(Identity::parse(&long).is_err());
        assert!(Identity::parse(&long[1..]).is_ok());
    }

    #[test]
    fn test_day_key_same_day() {
        let d1 = DayKey::from_timestamp(1_700_000_000);
        let d2 = DayKey::from_timestamp(1_700_003_600);
        assert_eq!(d1, d2);
        assert_eq!(d1.value(), 19_675);
        assert_eq!(d1.date(), NaiveDate::from_ymd_opt(2023, 11, 14));

        let next = DayKey::from_timestamp(1_700_000_000 + SECONDS_PER_DAY);
        assert_eq!(next.value(), d1.value() + 1);
    }

    #[test]
    fn test_day_key_boundaries() {
        assert_eq!(DayKey::from_timestamp(0).value(), 0);
        assert_eq!(DayKey::from_timestamp(SECONDS_PER_DAY - 1).value(), 0);
        assert_eq!(DayKey::from_timestamp(SECONDS_PER_DAY).value(), 1);
        assert_eq!(DayKey::from_timestamp(-1).value(), -1);
        assert_eq!(DayKey::from_timestamp(-SECONDS_PER_DAY).value(), -1);
        assert_eq!(DayKey::from_timestamp(i64::MIN).start_timestamp(), i64::MIN);
    }

    #[test]
    fn test_day_key_bytes_preserve_order() {
        let days = [-5i64, -1, 0, 1, 19_675];
        let keys: Vec<[u8; 8]> = days
            .iter()
            .map(|d| DayKey::from_timestamp(d * SECONDS_PER_DAY).to_key_bytes())
            .collect();
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(DayKey::from_key_bytes(keys[0]).value(), -5);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(normalize_display_name("  Alice ").unwrap(), "Alice");
        assert!(matches!(normalize_display_name(" \t\n"), Err(crate::Error::InvalidName)));
    }

    #[test]
    fn test_participant_evict() {
        let mut p = Participant::new(Identity::parse("0xb").unwrap(), "Bob".into());
        assert!(p.registered);
        p.evict();
        assert!(!p.registered);
        assert!(p.evicted_at.is_some());
        assert_eq!(p.display_name, "Bob");
    }
}
