//! Audit trail entry domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::account::AccountId;
use super::operation::{Operation, OperationKind};
use super::user::UserId;

/// How an audited operation was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    /// The operation ran; `success` says how it ended
    Executed,
    /// Authorization refused the operation before anything was mutated
    Denied,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Executed => "executed",
            Disposition::Denied => "denied",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "executed" => Some(Disposition::Executed),
            "denied" => Some(Disposition::Denied),
            _ => None,
        }
    }
}

/// One persisted audit fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: u64,
    /// When the operation was attempted
    pub recorded_at: DateTime<Utc>,
    pub kind: OperationKind,
    pub actor_id: Option<UserId>,
    pub actor_name: Option<String>,
    pub account_id: Option<AccountId>,
    pub amount: Option<Decimal>,
    pub description: String,
    pub success: bool,
    pub disposition: Disposition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denial_reason: Option<String>,
}

impl AuditEntry {
    /// Capture an operation outcome
    pub fn from_operation(id: u64, operation: &Operation, success: bool) -> Self {
        let actor = operation.actor();
        Self {
            id,
            recorded_at: operation.timestamp(),
            kind: operation.kind(),
            actor_id: actor.map(|u| u.id),
            actor_name: actor.map(|u| u.name.clone()),
            account_id: operation.account_id(),
            amount: operation.amount(),
            description: operation.description().to_string(),
            success,
            disposition: Disposition::Executed,
            denial_reason: None,
        }
    }

    /// Tag the entry as an authorization denial
    pub fn denied(mut self, reason: impl Into<String>) -> Self {
        self.disposition = Disposition::Denied;
        self.denial_reason = Some(reason.into());
        self
    }

    pub fn is_denial(&self) -> bool {
        self.disposition == Disposition::Denied
    }
}
