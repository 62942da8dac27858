//! Canonical claim model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::{IdValidationError, UserRef, validate_id};

/// Stable upstream claim identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClaimId(String);

impl ClaimId {
    /// Validate and construct a [`ClaimId`].
    pub fn new(id: impl Into<String>) -> Result<Self, IdValidationError> {
        validate_id(id.into()).map(Self)
    }
}

impl AsRef<str> for ClaimId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<ClaimId> for String {
    fn from(value: ClaimId) -> Self {
        value.0
    }
}

impl TryFrom<String> for ClaimId {
    type Error = IdValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Workflow status of a claim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    /// Editable by its creator; not yet counted against the limit.
    #[default]
    Draft,
    /// Awaiting manager approval.
    Submitted,
    /// Approved by the manager; awaiting reimbursement.
    Approved,
    /// Rejected by the manager or finance.
    Rejected,
    /// Paid out.
    Reimbursed,
}

impl ClaimStatus {
    /// Parse a status string case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "submitted" => Some(Self::Submitted),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "reimbursed" => Some(Self::Reimbursed),
            _ => None,
        }
    }

    /// Lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Reimbursed => "reimbursed",
        }
    }
}

/// Which user reference on a claim is being addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClaimField {
    /// The claim's creator.
    CreatedBy,
    /// The approving manager.
    Manager,
}

impl fmt::Display for ClaimField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CreatedBy => "createdBy",
            Self::Manager => "manager",
        })
    }
}

/// Canonical claim record.
///
/// ## Invariants
/// - `created_by` and `manager`, once present, always carry an id.
/// - `amount` is finite.
/// - `id` is absent only when the upstream record carried none; such claims
///   cannot be addressed by identity and are never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    /// Upstream identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ClaimId>,
    /// Short summary.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Claimed amount.
    pub amount: f64,
    /// Workflow status.
    pub status: ClaimStatus,
    /// Location of the uploaded receipt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_url: Option<String>,
    /// Claim creator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserRef>,
    /// Approving manager.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager: Option<UserRef>,
    /// Reason given when the claim was rejected; empty otherwise.
    pub rejection_reason: String,
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last modification time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Submission time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    /// Approval time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    /// Reimbursement time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reimbursed_at: Option<DateTime<Utc>>,
}

impl Claim {
    /// Borrow the user reference stored in `field`.
    pub fn user(&self, field: ClaimField) -> Option<&UserRef> {
        match field {
            ClaimField::CreatedBy => self.created_by.as_ref(),
            ClaimField::Manager => self.manager.as_ref(),
        }
    }

    /// Mutably borrow the slot for `field`.
    pub fn user_slot_mut(&mut self, field: ClaimField) -> &mut Option<UserRef> {
        match field {
            ClaimField::CreatedBy => &mut self.created_by,
            ClaimField::Manager => &mut self.manager,
        }
    }
}

/// Fields sent when creating a draft claim.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimDraft {
    /// Short summary.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Claimed amount.
    pub amount: f64,
}

/// Partial update applied to a draft claim. Absent fields are left as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimPatch {
    /// Replacement title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Replacement description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Replacement amount.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

/// Manager and finance workflow transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimTransition {
    /// Manager approval.
    Approve,
    /// Manager rejection with an optional reason.
    Reject {
        /// Reason shown to the creator.
        reason: Option<String>,
    },
    /// Finance payout.
    Reimburse,
    /// Finance rejection with an optional reason.
    FinanceReject {
        /// Reason shown to the creator.
        reason: Option<String>,
    },
}

impl ClaimTransition {
    /// Upstream action segment for this transition.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject { .. } => "reject",
            Self::Reimburse => "reimburse",
            Self::FinanceReject { .. } => "reject-finance",
        }
    }

    /// Rejection reason, if the transition carries one.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Reject { reason } | Self::FinanceReject { reason } => reason.as_deref(),
            Self::Approve | Self::Reimburse => None,
        }
    }
}
