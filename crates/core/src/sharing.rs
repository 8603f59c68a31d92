use chrono::{DateTime, Utc};

use crate::domain::quotation::Quotation;
use crate::errors::ApplicationError;

/// Same message for unknown tokens and disabled shares, so a caller cannot
/// probe which tokens exist.
pub const SHARE_UNAVAILABLE: &str = "quotation not found or sharing disabled";

/// Gate for the public share view. Validity is checked on every read; the
/// stored status is never consulted.
pub fn check_share_access(quotation: &Quotation, now: DateTime<Utc>) -> Result<(), ApplicationError> {
    if !quotation.share_enabled {
        return Err(ApplicationError::NotFound(SHARE_UNAVAILABLE.to_string()));
    }
    if quotation.is_past_validity(now) {
        return Err(ApplicationError::Expired { valid_until: quotation.valid_until });
    }
    Ok(())
}
