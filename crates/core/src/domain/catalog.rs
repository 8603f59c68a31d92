//! Typed view over the heterogeneous price catalog.
//!
//! Marketplace, product and solution plans keep their prices inside a JSON
//! content blob edited through the CMS; compute plans and disk offerings keep
//! them in dedicated columns. Both shapes are decoded here once, at the
//! boundary, so callers only ever see [`CatalogPricing`].

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::DomainError;
use crate::pricing::parse_price;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    Marketplace,
    Product,
    Solution,
    ComputePlan,
    DiskOffering,
}

impl CatalogKind {
    pub const ALL: [CatalogKind; 5] =
        [Self::Marketplace, Self::Product, Self::Solution, Self::ComputePlan, Self::DiskOffering];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Marketplace => "marketplace",
            Self::Product => "product",
            Self::Solution => "solution",
            Self::ComputePlan => "compute_plan",
            Self::DiskOffering => "disk_offering",
        }
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CatalogKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value.trim())
            .ok_or_else(|| DomainError::UnknownItemType(value.to_string()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "item_type", content = "item_id", rename_all = "snake_case")]
pub enum CatalogItemRef {
    Marketplace(i64),
    Product(i64),
    Solution(i64),
    ComputePlan(i64),
    DiskOffering(i64),
}

impl CatalogItemRef {
    pub fn new(kind: CatalogKind, id: i64) -> Self {
        match kind {
            CatalogKind::Marketplace => Self::Marketplace(id),
            CatalogKind::Product => Self::Product(id),
            CatalogKind::Solution => Self::Solution(id),
            CatalogKind::ComputePlan => Self::ComputePlan(id),
            CatalogKind::DiskOffering => Self::DiskOffering(id),
        }
    }

    pub fn kind(&self) -> CatalogKind {
        match self {
            Self::Marketplace(_) => CatalogKind::Marketplace,
            Self::Product(_) => CatalogKind::Product,
            Self::Solution(_) => CatalogKind::Solution,
            Self::ComputePlan(_) => CatalogKind::ComputePlan,
            Self::DiskOffering(_) => CatalogKind::DiskOffering,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Self::Marketplace(id)
            | Self::Product(id)
            | Self::Solution(id)
            | Self::ComputePlan(id)
            | Self::DiskOffering(id) => *id,
        }
    }
}

impl fmt::Display for CatalogItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingDuration {
    Hourly,
    Monthly,
    Quarterly,
    Yearly,
}

impl BillingDuration {
    pub const ALL: [BillingDuration; 4] =
        [Self::Hourly, Self::Monthly, Self::Quarterly, Self::Yearly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Yearly => "yearly",
        }
    }

    /// Key under which the pricing blob and the plan tables store this price.
    pub fn price_key(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly_price",
            Self::Monthly => "monthly_price",
            Self::Quarterly => "quarterly_price",
            Self::Yearly => "yearly_price",
        }
    }
}

impl fmt::Display for BillingDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingDuration {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|duration| duration.as_str() == value.trim())
            .ok_or_else(|| DomainError::UnknownDuration(value.to_string()))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogPricing {
    pub hourly: Option<Decimal>,
    pub monthly: Option<Decimal>,
    pub quarterly: Option<Decimal>,
    pub yearly: Option<Decimal>,
    pub specifications: Vec<Value>,
    pub features: Vec<Value>,
}

impl CatalogPricing {
    pub fn price_for(&self, duration: BillingDuration) -> Option<Decimal> {
        match duration {
            BillingDuration::Hourly => self.hourly,
            BillingDuration::Monthly => self.monthly,
            BillingDuration::Quarterly => self.quarterly,
            BillingDuration::Yearly => self.yearly,
        }
    }
}

/// One entry of the unified catalog listing, with its prices already parsed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub item: CatalogItemRef,
    pub name: String,
    #[serde(flatten)]
    pub pricing: CatalogPricing,
}

/// The whole priceable catalog grouped by source, in catalog order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogListing {
    pub marketplaces: Vec<CatalogEntry>,
    pub products: Vec<CatalogEntry>,
    pub solutions: Vec<CatalogEntry>,
    pub compute_plans: Vec<CatalogEntry>,
    pub disk_offerings: Vec<CatalogEntry>,
}

impl CatalogListing {
    pub fn push(&mut self, entry: CatalogEntry) {
        let group = match entry.item.kind() {
            CatalogKind::Marketplace => &mut self.marketplaces,
            CatalogKind::Product => &mut self.products,
            CatalogKind::Solution => &mut self.solutions,
            CatalogKind::ComputePlan => &mut self.compute_plans,
            CatalogKind::DiskOffering => &mut self.disk_offerings,
        };
        group.push(entry);
    }

    pub fn len(&self) -> usize {
        self.marketplaces.len()
            + self.products.len()
            + self.solutions.len()
            + self.compute_plans.len()
            + self.disk_offerings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of decoding a pricing blob. Malformed content is not an error: the
/// CMS may hold half-edited plans, which simply have no price.
#[derive(Clone, Debug, PartialEq)]
pub enum PricingLookup {
    Known(CatalogPricing),
    Unknown,
}

impl PricingLookup {
    pub fn decode(content: Option<&str>) -> Self {
        let raw = content.map(str::trim).filter(|raw| !raw.is_empty()).unwrap_or("{}");
        let object = match serde_json::from_str::<Value>(raw) {
            Ok(value @ Value::Object(_)) => value,
            _ => return Self::Unknown,
        };
        match serde_json::from_value::<PricingBlob>(object) {
            Ok(blob) => Self::Known(blob.into_pricing()),
            Err(_) => Self::Unknown,
        }
    }

    pub fn price_for(&self, duration: BillingDuration) -> Option<Decimal> {
        match self {
            Self::Known(pricing) => pricing.price_for(duration),
            Self::Unknown => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PricingBlob {
    hourly_price: Option<Value>,
    monthly_price: Option<Value>,
    quarterly_price: Option<Value>,
    yearly_price: Option<Value>,
    specifications: Option<Value>,
    features: Option<Value>,
}

impl PricingBlob {
    fn into_pricing(self) -> CatalogPricing {
        CatalogPricing {
            hourly: self.hourly_price.as_ref().and_then(price_from_value),
            monthly: self.monthly_price.as_ref().and_then(price_from_value),
            quarterly: self.quarterly_price.as_ref().and_then(price_from_value),
            yearly: self.yearly_price.as_ref().and_then(price_from_value),
            specifications: list_from_value(self.specifications),
            features: list_from_value(self.features),
        }
    }
}

pub fn price_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(display) => parse_price(display),
        Value::Number(number) => parse_price(&number.to_string()),
        _ => None,
    }
}

fn list_from_value(value: Option<Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(values)) => values,
        _ => Vec::new(),
    }
}
