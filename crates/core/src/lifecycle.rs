//! Status transitions. Any status may move to any other; what a transition
//! stamps onto the quotation depends only on the target status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::activity::{actor_or_system, NewActivity};
use crate::domain::quotation::{QuotationId, QuotationStatus};
use crate::errors::DomainError;

/// Raw status change body as submitted by an administrator.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct StatusChangeInput {
    pub status: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusChangeRequest {
    pub new_status: QuotationStatus,
    pub actor: Option<String>,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
}

impl StatusChangeRequest {
    pub fn new(new_status: QuotationStatus) -> Self {
        Self { new_status, actor: None, notes: None, rejection_reason: None }
    }
}

impl TryFrom<StatusChangeInput> for StatusChangeRequest {
    type Error = DomainError;

    fn try_from(input: StatusChangeInput) -> Result<Self, Self::Error> {
        let raw = input
            .status
            .filter(|status| !status.trim().is_empty())
            .ok_or_else(|| DomainError::Validation("status is required".to_string()))?;

        Ok(Self {
            new_status: raw.parse()?,
            actor: input.user_name,
            notes: input.notes,
            rejection_reason: input.rejection_reason.filter(|reason| !reason.trim().is_empty()),
        })
    }
}

/// Column writes and the audit entry for one status change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusTransition {
    pub new_status: QuotationStatus,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub activity: NewActivity,
    pub updated_at: DateTime<Utc>,
}

/// `None` fields in the transition leave the stored column untouched, so an
/// earlier approval survives a later move to `sent`.
pub fn plan_transition(
    current: QuotationStatus,
    request: &StatusChangeRequest,
    now: DateTime<Utc>,
) -> StatusTransition {
    let target = request.new_status;
    let actor = request.actor.as_deref();

    let (approved_by, approved_at) = match target {
        QuotationStatus::Approved => (Some(actor_or_system(actor)), Some(now)),
        _ => (None, None),
    };
    let sent_at = (target == QuotationStatus::Sent).then_some(now);
    let rejection_reason = match target {
        QuotationStatus::Rejected => request.rejection_reason.clone(),
        _ => None,
    };

    StatusTransition {
        new_status: target,
        approved_by,
        approved_at,
        sent_at,
        rejection_reason,
        activity: NewActivity::status_change(current, target, actor, request.notes.as_deref()),
        updated_at: now,
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChangeOutcome {
    pub quote_id: QuotationId,
    pub old_status: QuotationStatus,
    pub new_status: QuotationStatus,
}
