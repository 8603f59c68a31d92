use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::quotation::{QuotationId, QuotationStatus};
use crate::errors::DomainError;

pub const SYSTEM_ACTOR: &str = "System";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Created,
    StatusChange,
    Cloned,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::StatusChange => "status_change",
            Self::Cloned => "cloned",
        }
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityAction {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "created" => Ok(Self::Created),
            "status_change" => Ok(Self::StatusChange),
            "cloned" => Ok(Self::Cloned),
            other => Err(DomainError::Validation(format!("unknown activity action `{other}`"))),
        }
    }
}

/// Entry to append to a quotation's audit trail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewActivity {
    pub action: ActivityAction,
    pub old_status: Option<QuotationStatus>,
    pub new_status: Option<QuotationStatus>,
    pub actor: String,
    pub note: Option<String>,
}

impl NewActivity {
    pub fn created(actor: Option<&str>) -> Self {
        Self {
            action: ActivityAction::Created,
            old_status: None,
            new_status: Some(QuotationStatus::Draft),
            actor: actor_or_system(actor),
            note: Some("Quotation created".to_string()),
        }
    }

    pub fn status_change(
        old_status: QuotationStatus,
        new_status: QuotationStatus,
        actor: Option<&str>,
        note: Option<&str>,
    ) -> Self {
        let note = note
            .map(str::trim)
            .filter(|note| !note.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Status changed from {old_status} to {new_status}"));

        Self {
            action: ActivityAction::StatusChange,
            old_status: Some(old_status),
            new_status: Some(new_status),
            actor: actor_or_system(actor),
            note: Some(note),
        }
    }

    pub fn cloned(source_quote_number: &str, actor: Option<&str>) -> Self {
        Self {
            action: ActivityAction::Cloned,
            old_status: None,
            new_status: Some(QuotationStatus::Draft),
            actor: actor_or_system(actor),
            note: Some(format!("Cloned from quote {source_quote_number}")),
        }
    }
}

/// Append-only audit row owned by a quotation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub id: i64,
    pub quote_id: QuotationId,
    pub action: ActivityAction,
    pub old_status: Option<QuotationStatus>,
    pub new_status: Option<QuotationStatus>,
    pub actor: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub fn actor_or_system(actor: Option<&str>) -> String {
    actor
        .map(str::trim)
        .filter(|actor| !actor.is_empty())
        .unwrap_or(SYSTEM_ACTOR)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::{ActivityAction, NewActivity, SYSTEM_ACTOR};
    use crate::domain::quotation::QuotationStatus;

    #[test]
    fn status_change_synthesizes_default_note() {
        let entry = NewActivity::status_change(
            QuotationStatus::Draft,
            QuotationStatus::PendingApproval,
            Some("Ravi"),
            None,
        );

        assert_eq!(entry.action, ActivityAction::StatusChange);
        assert_eq!(entry.actor, "Ravi");
        assert_eq!(entry.note.as_deref(), Some("Status changed from draft to pending_approval"));
    }

    #[test]
    fn blank_actor_and_note_fall_back() {
        let entry = NewActivity::status_change(
            QuotationStatus::Sent,
            QuotationStatus::Rejected,
            Some("  "),
            Some(""),
        );

        assert_eq!(entry.actor, SYSTEM_ACTOR);
        assert_eq!(entry.note.as_deref(), Some("Status changed from sent to rejected"));
    }

    #[test]
    fn cloned_entry_references_source_number() {
        let entry = NewActivity::cloned("C4I-Q-2026-0007", None);
        assert_eq!(entry.action.as_str(), "cloned");
        assert_eq!(entry.new_status, Some(QuotationStatus::Draft));
        assert_eq!(entry.note.as_deref(), Some("Cloned from quote C4I-Q-2026-0007"));
    }
}
