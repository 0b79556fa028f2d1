//! Audit sink trait (C9).
//!
//! Every operation touching authentication state emits an audit record.
//! The log is append-only, bounded in memory (ring buffer), and durably
//! forwarded out-of-process; a forwarding failure must never fail the
//! caller, mirroring the event-bus/audit failure policy in the error
//! handling design.

use crate::state::UserId;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Who performed the audited action.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Actor {
    /// An authenticated user.
    User(UserId),
    /// The system itself (scheduled job, internal reconciliation).
    System,
    /// Unauthenticated caller (e.g. a failed login before user resolution).
    Anonymous,
}

/// Outcome of the audited operation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Outcome {
    /// The operation succeeded.
    Success,
    /// The operation failed, with the stable error code.
    Failure(String),
}

/// Security context attached to security-relevant audit records.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SecurityContext {
    /// Risk score at the time of the event.
    pub risk_score: f32,
    /// Risk level label.
    pub risk_level: String,
    /// SHA-256 hash of the device fingerprint (never the raw fingerprint).
    pub device_fingerprint_hash: Option<String>,
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AuditRecord {
    /// Record id.
    pub id: uuid::Uuid,
    /// Timestamp.
    pub timestamp: DateTime<Utc>,
    /// Correlation id threading through the originating request.
    pub correlation_id: uuid::Uuid,
    /// Event type from the fixed taxonomy.
    pub event_type: String,
    /// Who performed the action.
    pub actor: Actor,
    /// What was acted on (free-form resource identifier).
    pub resource: String,
    /// Outcome.
    pub outcome: Outcome,
    /// Request/response body, with sensitive fields redacted via
    /// [`redact`].
    pub body: Option<Value>,
    /// SHA-256 hash of the pre-redaction body, for integrity checking.
    pub body_hash: Option<String>,
    /// Security context, present for security-relevant record types.
    pub security_context: Option<SecurityContext>,
}

/// Field/header name substrings whose values are redacted before an audit
/// record or log line is persisted.
pub const SENSITIVE_SUBSTRINGS: &[&str] =
    &["password", "token", "secret", "authorization", "cookie"];

/// Redaction placeholder written in place of a sensitive value.
pub const REDACTED: &str = "[REDACTED]";

/// Recursively redact any object key in `value` whose lowercased name
/// contains one of [`SENSITIVE_SUBSTRINGS`], replacing the value with
/// [`REDACTED`]. Arrays and nested objects are walked; scalars and
/// non-matching keys are left untouched.
#[must_use]
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, v) in map {
                let lower = key.to_lowercase();
                if SENSITIVE_SUBSTRINGS.iter().any(|s| lower.contains(s)) {
                    out.insert(key.clone(), Value::String(REDACTED.to_string()));
                } else {
                    out.insert(key.clone(), redact(v));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}

/// Durable audit sink.
///
/// # Implementation Notes
///
/// Implementations should hold an in-memory ring buffer (configurable
/// size) for recent records and forward durably out-of-process
/// (e.g. via the same `authd_core::event_bus::EventBus` used for C8, or a
/// dedicated log shipper). `record` must never propagate a forwarding
/// failure to the caller — log it and move on.
pub trait AuditSink: Send + Sync {
    /// Record one audit entry. Implementations redact `body` via
    /// [`redact`] before persisting or forwarding it.
    fn record(&self, record: AuditRecord) -> impl std::future::Future<Output = ()> + Send;

    /// Read back the most recent `limit` records from the in-memory ring
    /// buffer (for `/admin` inspection tooling, not a durability guarantee).
    fn recent(&self, limit: usize) -> impl std::future::Future<Output = Vec<AuditRecord>> + Send;
}
