//! Persistence seams consumed by [`crate::service::QuotationService`].
//!
//! Implementations must apply every multi-row write (quotation row, its items
//! and its activity entry) as one unit: all of it or none of it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::aggregator::QuotationUpdate;
use crate::domain::catalog::{BillingDuration, CatalogItemRef};
use crate::domain::quotation::{NewQuotation, QuotationId, QuotationStatus};
use crate::domain::read_model::{QuotationDetail, QuotationQuery, QuotationWithItems, ShareState};
use crate::domain::settings::EstimatorSettings;
use crate::errors::ApplicationError;
use crate::lifecycle::{StatusChangeOutcome, StatusChangeRequest};
use crate::versioning::CloneRequest;

#[async_trait]
pub trait QuotationStore: Send + Sync {
    /// Allocates the quote number and writes the quotation, its items and its
    /// creation activity in one transaction.
    async fn insert(&self, quotation: NewQuotation) -> Result<QuotationWithItems, ApplicationError>;

    /// Reads, recomputes and writes in one transaction. Items, when present in
    /// the update, are replaced wholesale.
    async fn update(
        &self,
        id: QuotationId,
        update: QuotationUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<QuotationWithItems>, ApplicationError>;

    async fn change_status(
        &self,
        id: QuotationId,
        request: StatusChangeRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<StatusChangeOutcome>, ApplicationError>;

    async fn insert_clone(
        &self,
        id: QuotationId,
        request: CloneRequest,
    ) -> Result<Option<QuotationWithItems>, ApplicationError>;

    async fn set_share_enabled(
        &self,
        id: QuotationId,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<ShareState>, ApplicationError>;

    /// Removes the quotation with its items and activity. Returns `false` when
    /// nothing matched.
    async fn delete(&self, id: QuotationId) -> Result<bool, ApplicationError>;

    async fn find_detail(&self, id: QuotationId) -> Result<Option<QuotationDetail>, ApplicationError>;

    async fn find_by_share_token(
        &self,
        token: &str,
    ) -> Result<Option<QuotationWithItems>, ApplicationError>;

    /// One page plus the total number of rows matching the filters.
    async fn list(
        &self,
        query: &QuotationQuery,
    ) -> Result<(Vec<QuotationWithItems>, i64), ApplicationError>;

    async fn status_totals(&self) -> Result<Vec<(QuotationStatus, Decimal)>, ApplicationError>;
}

/// Source of the business configuration record, read on every call that
/// needs it.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn current(&self) -> Result<EstimatorSettings, ApplicationError>;
}

/// What the catalog holds for one item reference.
#[derive(Clone, Debug, PartialEq)]
pub enum CatalogRecord {
    Missing,
    /// Marketplace, product or solution entry with its raw JSON content.
    Section { content: Option<String> },
    /// Compute plan or disk offering with the price column for the requested
    /// duration.
    Plan { active: bool, price: Option<String> },
}

/// Raw price fields of one listed catalog entry.
#[derive(Clone, Debug, PartialEq)]
pub enum CatalogBody {
    /// JSON pricing blob of a marketplace, product or solution entry.
    Content(Option<String>),
    /// Price columns of an active compute plan or disk offering, in
    /// hourly, monthly, quarterly, yearly order.
    Columns([Option<String>; 4]),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CatalogRow {
    pub item: CatalogItemRef,
    pub name: String,
    pub body: CatalogBody,
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn lookup(
        &self,
        item: CatalogItemRef,
        duration: BillingDuration,
    ) -> Result<CatalogRecord, ApplicationError>;

    /// Every priceable entry of the five sources. Inactive plans are left out.
    async fn list_all(&self) -> Result<Vec<CatalogRow>, ApplicationError>;
}
