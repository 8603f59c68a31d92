use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::catalog::{BillingDuration, CatalogItemRef, CatalogKind};
use crate::domain::quotation::QuotationId;
use crate::errors::DomainError;
use crate::pricing::{line_total, parse_price};

/// Price exactly as the estimator UI submitted it, e.g. `"₹1,000"`, `"N/A"` or `1000`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DisplayPrice(pub String);

impl DisplayPrice {
    pub fn amount(&self) -> Option<Decimal> {
        parse_price(&self.0)
    }
}

impl From<&str> for DisplayPrice {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for DisplayPrice {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(match raw {
            Value::String(display) => Self(display),
            Value::Number(number) => Self(number.to_string()),
            _ => Self::default(),
        })
    }
}

/// One line item as submitted by a caller, before validation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItemInput {
    pub item_id: i64,
    pub item_type: String,
    pub item_name: String,
    #[serde(default)]
    pub item_description: Option<String>,
    #[serde(default)]
    pub plan_name: Option<String>,
    pub duration: String,
    #[serde(default)]
    pub unit_price: DisplayPrice,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub specifications: Vec<Value>,
    #[serde(default)]
    pub features: Vec<Value>,
}

impl LineItemInput {
    /// Validates the input and freezes its price. An unparsable price becomes
    /// zero so that partial quotations can still be saved.
    pub fn into_draft(self, order_index: usize) -> Result<LineItemDraft, DomainError> {
        let item_type = self.item_type.parse::<CatalogKind>()?;
        let duration = self.duration.parse::<BillingDuration>()?;

        let item_name = self.item_name.trim().to_string();
        if item_name.is_empty() {
            return Err(DomainError::Validation(format!(
                "items[{order_index}].item_name is required"
            )));
        }

        let quantity = match self.quantity {
            None => 1,
            Some(quantity) if quantity >= 1 => u32::try_from(quantity).map_err(|_| {
                DomainError::Validation(format!("items[{order_index}].quantity is too large"))
            })?,
            Some(_) => {
                return Err(DomainError::Validation(format!(
                    "items[{order_index}].quantity must be at least 1"
                )))
            }
        };

        let unit_price = self.unit_price.amount().unwrap_or(Decimal::ZERO);

        Ok(LineItemDraft {
            item: CatalogItemRef::new(item_type, self.item_id),
            item_name,
            item_description: self.item_description,
            plan_name: self.plan_name,
            duration,
            unit_price,
            quantity,
            total_price: line_total(unit_price, quantity)?,
            specifications: self.specifications,
            features: self.features,
            order_index: order_index as i64,
        })
    }
}

pub fn validate_items(inputs: Vec<LineItemInput>) -> Result<Vec<LineItemDraft>, DomainError> {
    inputs.into_iter().enumerate().map(|(index, input)| input.into_draft(index)).collect()
}

/// A priced line item snapshot, detached from the live catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItemDraft {
    #[serde(flatten)]
    pub item: CatalogItemRef,
    pub item_name: String,
    pub item_description: Option<String>,
    pub plan_name: Option<String>,
    pub duration: BillingDuration,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub total_price: Decimal,
    pub specifications: Vec<Value>,
    pub features: Vec<Value>,
    pub order_index: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: i64,
    pub quote_id: QuotationId,
    #[serde(flatten)]
    pub draft: LineItemDraft,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{validate_items, DisplayPrice, LineItemInput};
    use crate::domain::catalog::{BillingDuration, CatalogItemRef};
    use crate::errors::DomainError;

    fn input(unit_price: &str, quantity: Option<i64>) -> LineItemInput {
        LineItemInput {
            item_id: 11,
            item_type: "compute_plan".to_string(),
            item_name: "General Purpose 4x8".to_string(),
            item_description: None,
            plan_name: Some("GP-4".to_string()),
            duration: "monthly".to_string(),
            unit_price: DisplayPrice::from(unit_price),
            quantity,
            specifications: vec![json!("4 vCPU")],
            features: Vec::new(),
        }
    }

    #[test]
    fn draft_freezes_parsed_price_and_line_total() {
        let draft = input("₹1,000", Some(2)).into_draft(0).expect("valid item");

        assert_eq!(draft.item, CatalogItemRef::ComputePlan(11));
        assert_eq!(draft.duration, BillingDuration::Monthly);
        assert_eq!(draft.unit_price, Decimal::new(1000, 0));
        assert_eq!(draft.total_price, Decimal::new(2000, 0));
        assert_eq!(draft.order_index, 0);
    }

    #[test]
    fn unparsable_price_becomes_zero_and_quantity_defaults_to_one() {
        let draft = input("N/A", None).into_draft(3).expect("partial item is allowed");

        assert_eq!(draft.unit_price, Decimal::ZERO);
        assert_eq!(draft.quantity, 1);
        assert_eq!(draft.total_price, Decimal::ZERO);
        assert_eq!(draft.order_index, 3);
    }

    #[test]
    fn rejects_bad_enums_empty_name_and_zero_quantity() {
        let mut bad_type = input("100", None);
        bad_type.item_type = "storage_option".to_string();
        assert!(matches!(bad_type.into_draft(0), Err(DomainError::UnknownItemType(_))));

        let mut bad_duration = input("100", None);
        bad_duration.duration = "weekly".to_string();
        assert!(matches!(bad_duration.into_draft(0), Err(DomainError::UnknownDuration(_))));

        let mut unnamed = input("100", None);
        unnamed.item_name = "  ".to_string();
        assert!(matches!(unnamed.into_draft(0), Err(DomainError::Validation(_))));

        assert!(matches!(input("100", Some(0)).into_draft(0), Err(DomainError::Validation(_))));
    }

    #[test]
    fn validate_items_assigns_positional_order() {
        let drafts =
            validate_items(vec![input("10", None), input("20", Some(3))]).expect("valid items");
        assert_eq!(drafts.iter().map(|d| d.order_index).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn display_price_accepts_numbers_and_strings() {
        let parsed: LineItemInput = serde_json::from_value(json!({
            "item_id": 1,
            "item_type": "product",
            "item_name": "Object Storage",
            "duration": "yearly",
            "unit_price": 1200.5
        }))
        .expect("numeric price should deserialize");

        assert_eq!(parsed.unit_price.amount(), Some(Decimal::new(12005, 1)));
        assert_eq!(parsed.quantity, None);
        assert!(parsed.specifications.is_empty());
    }
}
