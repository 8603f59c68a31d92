use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::activity::NewActivity;
use crate::domain::line_item::LineItemDraft;
use crate::errors::DomainError;
use crate::pricing::QuotationTotals;

pub const DEFAULT_CURRENCY: &str = "INR";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuotationId(pub i64);

impl fmt::Display for QuotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QuotationId {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .map(Self)
            .ok_or_else(|| DomainError::Validation(format!("invalid quotation id `{value}`")))
    }
}

/// Lifecycle status. Every status is reachable from every other one; only
/// membership in this set is enforced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Draft,
    PendingApproval,
    Approved,
    Sent,
    Rejected,
    Expired,
}

impl QuotationStatus {
    pub const ALL: [QuotationStatus; 6] = [
        Self::Draft,
        Self::PendingApproval,
        Self::Approved,
        Self::Sent,
        Self::Rejected,
        Self::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Sent => "sent",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for QuotationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuotationStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == value.trim())
            .ok_or_else(|| DomainError::UnknownStatus(value.to_string()))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerDetails {
    pub customer_name: Option<String>,
    pub customer_company: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    pub customer_gst: Option<String>,
}

impl CustomerDetails {
    /// Field-wise merge where `patch` wins whenever it carries a value.
    pub fn merged_with(&self, patch: &CustomerDetails) -> CustomerDetails {
        fn pick(patch: &Option<String>, current: &Option<String>) -> Option<String> {
            patch.clone().or_else(|| current.clone())
        }

        CustomerDetails {
            customer_name: pick(&patch.customer_name, &self.customer_name),
            customer_company: pick(&patch.customer_company, &self.customer_company),
            customer_email: pick(&patch.customer_email, &self.customer_email),
            customer_phone: pick(&patch.customer_phone, &self.customer_phone),
            customer_address: pick(&patch.customer_address, &self.customer_address),
            customer_gst: pick(&patch.customer_gst, &self.customer_gst),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: QuotationId,
    pub quote_number: String,
    pub version: i64,
    pub parent_quote_id: Option<QuotationId>,
    pub status: QuotationStatus,
    #[serde(flatten)]
    pub customer: CustomerDetails,
    pub validity_days: u32,
    pub valid_until: DateTime<Utc>,
    pub internal_notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub grand_total: Decimal,
    pub currency: String,
    pub share_token: String,
    pub share_enabled: bool,
    pub created_by: Option<String>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quotation {
    pub fn totals(&self) -> QuotationTotals {
        QuotationTotals {
            subtotal: self.subtotal,
            tax_rate: self.tax_rate,
            tax_amount: self.tax_amount,
            discount_amount: self.discount_amount,
            grand_total: self.grand_total,
        }
    }

    pub fn is_past_validity(&self, now: DateTime<Utc>) -> bool {
        self.valid_until < now
    }
}

/// A fully computed quotation ready to be written, together with its items and
/// the activity entry recording its creation, as one unit.
#[derive(Clone, Debug, PartialEq)]
pub struct NewQuotation {
    pub quote_prefix: String,
    pub version: i64,
    pub parent_quote_id: Option<QuotationId>,
    pub status: QuotationStatus,
    pub customer: CustomerDetails,
    pub validity_days: u32,
    pub valid_until: DateTime<Utc>,
    pub internal_notes: Option<String>,
    pub totals: QuotationTotals,
    pub currency: String,
    pub share_token: String,
    pub created_by: Option<String>,
    pub items: Vec<LineItemDraft>,
    pub activity: NewActivity,
    pub created_at: DateTime<Utc>,
}
