//! Request/response boundary
//!
//! Maps JSON requests from an already-authenticated caller onto ledger
//! operations. The `caller` field is trusted as-is; establishing it is the
//! transport's job.
//!
//! ```text
//! {"op":"register","caller":"0xB","name":"Bob"}
//! {"op":"mark_attendance","caller":"0xB","timestamp":1700000000}
//! {"op":"check_attendance","caller":"0xB","timestamp":1700003600}
//! {"op":"modify_attendance","caller":"0xA","target":"0xB","timestamp":1700000000,"present":false}
//! {"op":"evict_user","caller":"0xA","target":"0xB"}
//! ```

use crate::{types::Timestamp, Error, Ledger, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Caller request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Self-registration
    Register {
        /// Authenticated caller
        caller: String,
        /// Display name
        name: String,
    },

    /// Mark own attendance
    MarkAttendance {
        /// Authenticated caller
        caller: String,
        /// Seconds since the Unix epoch
        timestamp: Timestamp,
    },

    /// Read attendance; `target` defaults to the caller
    CheckAttendance {
        /// Authenticated caller
        caller: String,
        /// Whose attendance
        #[serde(default)]
        target: Option<String>,
        /// Seconds since the Unix epoch
        timestamp: Timestamp,
    },

    /// Administrator override
    ModifyAttendance {
        /// Authenticated caller
        caller: String,
        /// Whose attendance
        target: String,
        /// Seconds since the Unix epoch
        timestamp: Timestamp,
        /// New value
        present: bool,
    },

    /// Administrator eviction
    EvictUser {
        /// Authenticated caller
        caller: String,
        /// Who to evict
        target: String,
    },

    /// Is the caller the administrator
    IsAdmin {
        /// Authenticated caller
        caller: String,
    },

    /// Is the caller registered
    IsRegistered {
        /// Authenticated caller
        caller: String,
    },

    /// Participant record; `target` defaults to the caller
    Participant {
        /// Authenticated caller
        caller: String,
        /// Whose record
        #[serde(default)]
        target: Option<String>,
    },

    /// The administrator identity
    Admin,
}

/// Error payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable machine-readable code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

/// Response to one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Whether the operation succeeded
    pub ok: bool,

    /// Operation result on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    fn failure(err: &Error) -> Self {
        // Infrastructure detail stays in the logs
        let message = if err.is_domain() {
            err.to_string()
        } else {
            "internal error".to_string()
        };
        Self {
            ok: false,
            result: None,
            error: Some(ErrorBody {
                code: err.code().to_string(),
                message,
            }),
        }
    }

    /// Error code, if this is a failure
    pub fn error_code(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.code.as_str())
    }
}

/// Execute one request against the ledger
pub async fn dispatch(ledger: &Ledger, request: Request) -> Response {
    match execute(ledger, request).await {
        Ok(value) => Response::success(value),
        Err(err) => {
            if !err.is_domain() {
                tracing::error!("Request failed: {}", err);
            }
            Response::failure(&err)
        }
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| Error::Storage(format!("Failed to encode response: {}", e)))
}

async fn execute(ledger: &Ledger, request: Request) -> Result<Value> {
    match request {
        Request::Register { caller, name } => {
            let participant = ledger.register_participant(&caller, &name).await?;
            to_value(&participant)
        }

        Request::MarkAttendance { caller, timestamp } => {
            let record = ledger.mark_own_attendance(&caller, timestamp).await?;
            to_value(&record)
        }

        Request::CheckAttendance {
            caller,
            target,
            timestamp,
        } => {
            let whose = target.unwrap_or(caller);
            let present = ledger.check_attendance(&whose, timestamp)?;
            Ok(json!({ "present": present }))
        }

        Request::ModifyAttendance {
            caller,
            target,
            timestamp,
            present,
        } => {
            let record = ledger
                .modify_attendance(&caller, &target, timestamp, present)
                .await?;
            to_value(&record)
        }

        Request::EvictUser { caller, target } => {
            ledger.evict_user(&caller, &target).await?;
            Ok(json!({}))
        }

        Request::IsAdmin { caller } => Ok(json!({ "is_admin": ledger.is_admin(&caller)? })),

        Request::IsRegistered { caller } => {
            Ok(json!({ "is_registered": ledger.is_registered(&caller)? }))
        }

        Request::Participant { caller, target } => {
            let whose = target.unwrap_or(caller);
            to_value(&ledger.participant(&whose)?)
        }

        Request::Admin => Ok(json!({ "admin": ledger.admin().as_str() })),
    }
}
