//! Shapes returned by read operations. Every quotation handed to a caller
//! carries its `items` list, empty rather than absent.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::activity::ActivityLogEntry;
use crate::domain::line_item::LineItem;
use crate::domain::quotation::{Quotation, QuotationId, QuotationStatus};
use crate::errors::DomainError;
use crate::pricing::out_of_range;

pub const DEFAULT_PAGE_LIMIT: u32 = 50;
pub const MAX_PAGE_LIMIT: u32 = 500;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuotationWithItems {
    #[serde(flatten)]
    pub quotation: Quotation,
    pub items: Vec<LineItem>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuotationDetail {
    #[serde(flatten)]
    pub quotation: Quotation,
    pub items: Vec<LineItem>,
    pub activities: Vec<ActivityLogEntry>,
}

/// Public view resolved from a share token. Carries display-only terms, never
/// the activity log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SharedQuotation {
    #[serde(flatten)]
    pub quotation: Quotation,
    pub items: Vec<LineItem>,
    pub assumptions_text: String,
    pub terms_text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareState {
    pub quote_id: QuotationId,
    pub share_token: String,
    pub share_enabled: bool,
}

/// Raw list parameters as they arrive from a query string.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct QuotationListParams {
    pub status: Option<String>,
    pub customer_email: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuotationQuery {
    pub status: Option<QuotationStatus>,
    pub customer_email: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for QuotationQuery {
    fn default() -> Self {
        Self { status: None, customer_email: None, limit: DEFAULT_PAGE_LIMIT, offset: 0 }
    }
}

impl TryFrom<QuotationListParams> for QuotationQuery {
    type Error = DomainError;

    fn try_from(params: QuotationListParams) -> Result<Self, Self::Error> {
        let status = match non_blank(params.status) {
            Some(status) => Some(status.parse::<QuotationStatus>()?),
            None => None,
        };

        let limit = match non_blank(params.limit) {
            Some(raw) => match raw.parse::<u32>() {
                Ok(limit) if (1..=MAX_PAGE_LIMIT).contains(&limit) => limit,
                _ => {
                    return Err(DomainError::Validation(format!(
                        "limit must be an integer in 1..={MAX_PAGE_LIMIT}, got `{raw}`"
                    )))
                }
            },
            None => DEFAULT_PAGE_LIMIT,
        };

        let offset = match non_blank(params.offset) {
            Some(raw) => raw.parse::<u32>().map_err(|_| {
                DomainError::Validation(format!("offset must be a non-negative integer, got `{raw}`"))
            })?,
            None => 0,
        };

        Ok(Self { status, customer_email: non_blank(params.customer_email), limit, offset })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuotationPage {
    pub quotations: Vec<QuotationWithItems>,
    pub total: i64,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub count: u64,
    pub total_value: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationStats {
    pub by_status: BTreeMap<String, StatusSummary>,
    pub total_quotes: u64,
    pub total_value: Decimal,
}

impl QuotationStats {
    pub fn from_rows(
        rows: impl IntoIterator<Item = (QuotationStatus, Decimal)>,
    ) -> Result<Self, DomainError> {
        let mut stats = Self::default();
        for (status, grand_total) in rows {
            let summary = stats.by_status.entry(status.as_str().to_string()).or_default();
            summary.count += 1;
            summary.total_value =
                summary.total_value.checked_add(grand_total).ok_or_else(out_of_range)?;
            stats.total_quotes += 1;
            stats.total_value = stats.total_value.checked_add(grand_total).ok_or_else(out_of_range)?;
        }
        Ok(stats)
    }
}
