use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::catalog::{
    BillingDuration, CatalogEntry, CatalogItemRef, CatalogKind, CatalogListing, CatalogPricing,
    PricingLookup,
};
use crate::errors::{ApplicationError, DomainError};
use crate::pricing::parse_price;
use crate::store::{CatalogBody, CatalogRecord, CatalogRow, CatalogSource};

/// Query parameters of a price lookup, before validation.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ItemPriceQuery {
    pub item_id: Option<String>,
    pub item_type: Option<String>,
    pub duration: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPrice {
    pub price: Option<Decimal>,
    pub duration: BillingDuration,
}

#[derive(Clone)]
pub struct CatalogPriceResolver {
    catalog: Arc<dyn CatalogSource>,
}

impl CatalogPriceResolver {
    pub fn new(catalog: Arc<dyn CatalogSource>) -> Self {
        Self { catalog }
    }

    /// Price of `item` for `duration`, or `None` when the catalog holds no
    /// usable price. Only a missing item is an error.
    pub async fn resolve(
        &self,
        item: CatalogItemRef,
        duration: BillingDuration,
    ) -> Result<Option<Decimal>, ApplicationError> {
        let record = self.catalog.lookup(item, duration).await?;
        let price = match record {
            CatalogRecord::Missing => {
                return Err(ApplicationError::NotFound(format!("catalog item {item} not found")))
            }
            CatalogRecord::Section { content } => {
                let lookup = PricingLookup::decode(content.as_deref());
                if lookup == PricingLookup::Unknown {
                    warn!(
                        event_name = "catalog.pricing_undecodable",
                        item = %item,
                        "catalog pricing content could not be decoded"
                    );
                }
                lookup.price_for(duration)
            }
            CatalogRecord::Plan { active: false, .. } => None,
            CatalogRecord::Plan { active: true, price } => price.as_deref().and_then(parse_price),
        };

        debug!(
            event_name = "catalog.price_resolved",
            item = %item,
            duration = duration.as_str(),
            priced = price.is_some(),
            "resolved catalog price"
        );
        Ok(price)
    }

    /// The unified catalog listing. Undecodable pricing content lists the
    /// entry without prices instead of failing the whole listing.
    pub async fn list_all(&self) -> Result<CatalogListing, ApplicationError> {
        let rows = self.catalog.list_all().await?;
        let mut listing = CatalogListing::default();
        for row in rows {
            listing.push(price_row(row));
        }

        debug!(event_name = "catalog.listed", entries = listing.len(), "listed catalog");
        Ok(listing)
    }

    pub async fn resolve_query(&self, query: ItemPriceQuery) -> Result<ResolvedPrice, ApplicationError> {
        let (item, duration) = parse_item_query(query)?;
        let price = self.resolve(item, duration).await?;
        Ok(ResolvedPrice { price, duration })
    }
}

fn price_row(row: CatalogRow) -> CatalogEntry {
    let CatalogRow { item, name, body } = row;
    let pricing = match body {
        CatalogBody::Content(content) => match PricingLookup::decode(content.as_deref()) {
            PricingLookup::Known(pricing) => pricing,
            PricingLookup::Unknown => {
                warn!(
                    event_name = "catalog.pricing_undecodable",
                    item = %item,
                    "catalog pricing content could not be decoded"
                );
                CatalogPricing::default()
            }
        },
        CatalogBody::Columns([hourly, monthly, quarterly, yearly]) => {
            let price = |column: Option<String>| column.as_deref().and_then(parse_price);
            CatalogPricing {
                hourly: price(hourly),
                monthly: price(monthly),
                quarterly: price(quarterly),
                yearly: price(yearly),
                ..CatalogPricing::default()
            }
        }
    };
    CatalogEntry { item, name, pricing }
}

fn parse_item_query(query: ItemPriceQuery) -> Result<(CatalogItemRef, BillingDuration), DomainError> {
    let (Some(item_id), Some(item_type), Some(duration)) = (
        non_blank(query.item_id),
        non_blank(query.item_type),
        non_blank(query.duration),
    ) else {
        return Err(DomainError::Validation(
            "missing required parameters: item_id, item_type, duration".to_string(),
        ));
    };

    let id = item_id
        .parse::<i64>()
        .map_err(|_| DomainError::Validation(format!("invalid item_id `{item_id}`")))?;
    let kind = item_type.parse::<CatalogKind>()?;
    let duration = duration.parse::<BillingDuration>()?;

    Ok((CatalogItemRef::new(kind, id), duration))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}
