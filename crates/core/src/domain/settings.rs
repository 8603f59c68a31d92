use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const DEFAULT_QUOTE_PREFIX: &str = "C4I-Q";
pub const DEFAULT_VALIDITY_DAYS: u32 = 30;

/// The estimator's single business-configuration record. Quotations copy the
/// tax rate out of it at creation time and never look at it again.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimatorSettings {
    pub tax_rate: Decimal,
    pub quote_prefix: String,
    pub default_validity_days: u32,
    pub assumptions_text: String,
    pub terms_text: String,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(18, 0),
            quote_prefix: DEFAULT_QUOTE_PREFIX.to_string(),
            default_validity_days: DEFAULT_VALIDITY_DAYS,
            assumptions_text: String::new(),
            terms_text: String::new(),
        }
    }
}
