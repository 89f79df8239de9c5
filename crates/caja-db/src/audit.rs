//! # Audit Sink
//!
//! Fire-and-forget trail of business operations. The engine emits exactly
//! one event per *committed* operation, after the transaction commits, so
//! a rolled-back sale never produces an audit entry. Emission must not
//! fail the operation; implementations swallow their own errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

/// One audited business action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// User who performed the action.
    pub actor_id: String,
    /// `CREATE`, `VOID`, `RETURN`, `INVENTORY_ENTRY` or `INVENTORY_ADJUST`.
    pub action: String,
    /// Entity kind, e.g. `sale`, `return`, `inventory_movement`.
    pub entity: String,
    pub entity_id: String,
    pub description: String,
    /// State before the action, where meaningful (e.g. a void captures
    /// the sale's previous status).
    pub old_values: Option<Value>,
    /// State after the action.
    pub new_values: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        actor_id: impl Into<String>,
        action: impl Into<String>,
        entity: impl Into<String>,
        entity_id: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        AuditEvent {
            actor_id: actor_id.into(),
            action: action.into(),
            entity: entity.into(),
            entity_id: entity_id.into(),
            description: description.into(),
            old_values: None,
            new_values: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_old_values(mut self, values: Value) -> Self {
        self.old_values = Some(values);
        self
    }

    pub fn with_new_values(mut self, values: Value) -> Self {
        self.new_values = Some(values);
        self
    }
}

/// Destination for audit events. Implementations must be cheap and
/// infallible from the caller's point of view.
pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

/// Emits audit events as structured `tracing` records.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        info!(
            actor_id = %event.actor_id,
            action = %event.action,
            entity = %event.entity,
            entity_id = %event.entity_id,
            description = %event.description,
            "Audit"
        );
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn emit(&self, _event: AuditEvent) {}
}
