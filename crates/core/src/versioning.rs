//! New versions of a quotation are copies, never edits: the source keeps its
//! status, items and totals.

use chrono::{DateTime, Utc};

use crate::aggregator::valid_until_from;
use crate::domain::activity::NewActivity;
use crate::domain::line_item::LineItem;
use crate::domain::quotation::{NewQuotation, Quotation, QuotationStatus};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloneRequest {
    pub created_by: Option<String>,
    pub quote_prefix: String,
    pub share_token: String,
    pub requested_at: DateTime<Utc>,
}

/// Plans the next version of `source`. Totals and the tax rate are copied
/// verbatim rather than recomputed, and the validity window restarts at the
/// clone time.
pub fn plan_clone(source: &Quotation, items: &[LineItem], request: CloneRequest) -> NewQuotation {
    let mut items: Vec<_> = items.iter().map(|item| item.draft.clone()).collect();
    items.sort_by_key(|item| item.order_index);

    let created_by = request.created_by.filter(|actor| !actor.trim().is_empty());

    NewQuotation {
        quote_prefix: request.quote_prefix,
        version: source.version + 1,
        parent_quote_id: Some(source.id),
        status: QuotationStatus::Draft,
        customer: source.customer.clone(),
        validity_days: source.validity_days,
        valid_until: valid_until_from(request.requested_at, source.validity_days),
        internal_notes: source.internal_notes.clone(),
        totals: source.totals(),
        currency: source.currency.clone(),
        share_token: request.share_token,
        activity: NewActivity::cloned(&source.quote_number, created_by.as_deref()),
        created_by,
        items,
        created_at: request.requested_at,
    }
}
