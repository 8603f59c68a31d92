pub mod aggregator;
pub mod config;
pub mod domain;
pub mod errors;
pub mod identifiers;
pub mod lifecycle;
pub mod pricing;
pub mod resolver;
pub mod service;
pub mod sharing;
pub mod store;
pub mod versioning;

pub use aggregator::{NewQuotationRequest, QuotationPatch, QuotationUpdate};
pub use domain::catalog::{
    BillingDuration, CatalogEntry, CatalogItemRef, CatalogKind, CatalogListing, CatalogPricing,
};
pub use domain::quotation::{Quotation, QuotationId, QuotationStatus};
pub use domain::read_model::{
    QuotationDetail, QuotationPage, QuotationQuery, QuotationStats, QuotationWithItems,
    SharedQuotation,
};
pub use domain::settings::EstimatorSettings;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use lifecycle::{StatusChangeOutcome, StatusChangeRequest};
pub use resolver::CatalogPriceResolver;
pub use service::QuotationService;
pub use store::{
    CatalogBody, CatalogRecord, CatalogRow, CatalogSource, QuotationStore, SettingsProvider,
};
