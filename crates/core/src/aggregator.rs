//! Builds and revises quotations, keeping their totals consistent with their
//! line items.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::activity::NewActivity;
use crate::domain::line_item::{validate_items, LineItemDraft, LineItemInput};
use crate::domain::quotation::{
    CustomerDetails, NewQuotation, Quotation, QuotationStatus, DEFAULT_CURRENCY,
};
use crate::domain::settings::EstimatorSettings;
use crate::errors::DomainError;
use crate::pricing::QuotationTotals;

pub const MAX_VALIDITY_DAYS: u32 = 3650;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct NewQuotationRequest {
    #[serde(flatten)]
    pub customer: CustomerDetails,
    #[serde(default)]
    pub validity_days: Option<i64>,
    #[serde(default)]
    pub internal_notes: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItemInput>,
    #[serde(default)]
    pub created_by: Option<String>,
}

/// Partial update. Absent fields keep their stored value; `items`, when
/// present, replaces the whole item list.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct QuotationPatch {
    #[serde(flatten)]
    pub customer: CustomerDetails,
    #[serde(default)]
    pub validity_days: Option<i64>,
    #[serde(default)]
    pub internal_notes: Option<String>,
    #[serde(default)]
    pub discount_amount: Option<Decimal>,
    #[serde(default)]
    pub items: Option<Vec<LineItemInput>>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuotationUpdate {
    pub customer: CustomerDetails,
    pub validity_days: Option<u32>,
    pub internal_notes: Option<String>,
    pub discount_amount: Option<Decimal>,
    pub items: Option<Vec<LineItemDraft>>,
}

impl QuotationPatch {
    pub fn validate(self) -> Result<QuotationUpdate, DomainError> {
        let validity_days = self.validity_days.map(validity_days).transpose()?;

        if let Some(discount) = self.discount_amount {
            if discount < Decimal::ZERO {
                return Err(DomainError::Validation(
                    "discount_amount must not be negative".to_string(),
                ));
            }
        }

        let items = self.items.map(validate_items).transpose()?;

        Ok(QuotationUpdate {
            customer: self.customer,
            validity_days,
            internal_notes: self.internal_notes,
            discount_amount: self.discount_amount,
            items,
        })
    }
}

/// New column values for an existing quotation after an update.
#[derive(Clone, Debug, PartialEq)]
pub struct QuotationRevision {
    pub customer: CustomerDetails,
    pub validity_days: u32,
    pub valid_until: DateTime<Utc>,
    pub internal_notes: Option<String>,
    pub totals: QuotationTotals,
    pub updated_at: DateTime<Utc>,
}

pub fn plan_quotation(
    request: NewQuotationRequest,
    settings: &EstimatorSettings,
    share_token: String,
    now: DateTime<Utc>,
) -> Result<NewQuotation, DomainError> {
    let validity_days = match request.validity_days {
        Some(days) => validity_days(days)?,
        None => settings.default_validity_days,
    };
    let items = validate_items(request.items)?;
    let totals = QuotationTotals::for_items(&items, settings.tax_rate, Decimal::ZERO)?;
    let currency = request
        .currency
        .map(|currency| currency.trim().to_ascii_uppercase())
        .filter(|currency| !currency.is_empty())
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
    let created_by = request.created_by.filter(|actor| !actor.trim().is_empty());

    Ok(NewQuotation {
        quote_prefix: settings.quote_prefix.clone(),
        version: 1,
        parent_quote_id: None,
        status: QuotationStatus::Draft,
        customer: request.customer,
        validity_days,
        valid_until: valid_until_from(now, validity_days),
        internal_notes: request.internal_notes,
        totals,
        currency,
        share_token,
        activity: NewActivity::created(created_by.as_deref()),
        created_by,
        items,
        created_at: now,
    })
}

/// Applies `update` to `existing`. The subtotal moves only when items are
/// replaced, tax always uses the rate frozen on the quotation, and the
/// validity window restarts from `now` only when a new length is given.
pub fn revise(
    existing: &Quotation,
    update: &QuotationUpdate,
    now: DateTime<Utc>,
) -> Result<QuotationRevision, DomainError> {
    let subtotal = match &update.items {
        Some(items) => crate::pricing::subtotal(items)?,
        None => existing.subtotal,
    };
    let discount = update.discount_amount.unwrap_or(existing.discount_amount);
    let totals = QuotationTotals::compute(subtotal, existing.tax_rate, discount)?;

    let (validity_days, valid_until) = match update.validity_days {
        Some(days) => (days, valid_until_from(now, days)),
        None => (existing.validity_days, existing.valid_until),
    };

    Ok(QuotationRevision {
        customer: existing.customer.merged_with(&update.customer),
        validity_days,
        valid_until,
        internal_notes: update.internal_notes.clone().or_else(|| existing.internal_notes.clone()),
        totals,
        updated_at: now,
    })
}

pub fn valid_until_from(start: DateTime<Utc>, validity_days: u32) -> DateTime<Utc> {
    start + Duration::days(i64::from(validity_days))
}

fn validity_days(days: i64) -> Result<u32, DomainError> {
    u32::try_from(days)
        .ok()
        .filter(|days| (1..=MAX_VALIDITY_DAYS).contains(days))
        .ok_or_else(|| {
            DomainError::Validation(format!(
                "validity_days must be in 1..={MAX_VALIDITY_DAYS}, got {days}"
            ))
        })
}
