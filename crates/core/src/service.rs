//! Application service for the quotation lifecycle. It validates input, reads
//! the business settings when an operation needs them and hands fully planned
//! writes to the store.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::aggregator::{plan_quotation, NewQuotationRequest, QuotationPatch};
use crate::domain::quotation::QuotationId;
use crate::domain::read_model::{
    QuotationDetail, QuotationPage, QuotationQuery, QuotationStats, QuotationWithItems,
    ShareState, SharedQuotation,
};
use crate::errors::ApplicationError;
use crate::identifiers::{generate_share_token, token_preview};
use crate::lifecycle::{StatusChangeOutcome, StatusChangeRequest};
use crate::sharing::{check_share_access, SHARE_UNAVAILABLE};
use crate::store::{QuotationStore, SettingsProvider};
use crate::versioning::CloneRequest;

#[derive(Clone)]
pub struct QuotationService {
    store: Arc<dyn QuotationStore>,
    settings: Arc<dyn SettingsProvider>,
}

impl QuotationService {
    pub fn new(store: Arc<dyn QuotationStore>, settings: Arc<dyn SettingsProvider>) -> Self {
        Self { store, settings }
    }

    pub async fn create(
        &self,
        request: NewQuotationRequest,
    ) -> Result<QuotationWithItems, ApplicationError> {
        let settings = self.settings.current().await.inspect_err(|e| log_failure("create", e))?;
        let planned = plan_quotation(request, &settings, generate_share_token(), Utc::now())
            .map_err(ApplicationError::from)
            .inspect_err(|e| log_failure("create", e))?;
        let item_count = planned.items.len();

        let created = self.store.insert(planned).await.inspect_err(|e| log_failure("create", e))?;
        info!(
            event_name = "quotation.created",
            quote_id = %created.quotation.id,
            quote_number = %created.quotation.quote_number,
            item_count,
            "quotation created"
        );
        Ok(created)
    }

    pub async fn update(
        &self,
        id: QuotationId,
        patch: QuotationPatch,
    ) -> Result<QuotationWithItems, ApplicationError> {
        let update =
            patch.validate().map_err(ApplicationError::from).inspect_err(|e| log_failure("update", e))?;
        let replaced_items = update.items.is_some();

        let updated = self
            .store
            .update(id, update, Utc::now())
            .await
            .inspect_err(|e| log_failure("update", e))?
            .ok_or_else(|| not_found(id))?;
        info!(
            event_name = "quotation.updated",
            quote_id = %id,
            replaced_items,
            grand_total = %updated.quotation.grand_total,
            "quotation updated"
        );
        Ok(updated)
    }

    pub async fn set_status(
        &self,
        id: QuotationId,
        request: StatusChangeRequest,
    ) -> Result<StatusChangeOutcome, ApplicationError> {
        let outcome = self
            .store
            .change_status(id, request, Utc::now())
            .await
            .inspect_err(|e| log_failure("set_status", e))?
            .ok_or_else(|| not_found(id))?;
        info!(
            event_name = "quotation.status_changed",
            quote_id = %id,
            old_status = %outcome.old_status,
            new_status = %outcome.new_status,
            "quotation status changed"
        );
        Ok(outcome)
    }

    pub async fn clone_quotation(
        &self,
        id: QuotationId,
        created_by: Option<String>,
    ) -> Result<QuotationWithItems, ApplicationError> {
        let settings =
            self.settings.current().await.inspect_err(|e| log_failure("clone", e))?;
        let request = CloneRequest {
            created_by,
            quote_prefix: settings.quote_prefix,
            share_token: generate_share_token(),
            requested_at: Utc::now(),
        };

        let cloned = self
            .store
            .insert_clone(id, request)
            .await
            .inspect_err(|e| log_failure("clone", e))?
            .ok_or_else(|| not_found(id))?;
        info!(
            event_name = "quotation.cloned",
            quote_id = %cloned.quotation.id,
            parent_quote_id = %id,
            version = cloned.quotation.version,
            "quotation cloned"
        );
        Ok(cloned)
    }

    pub async fn toggle_share(
        &self,
        id: QuotationId,
        enabled: bool,
    ) -> Result<ShareState, ApplicationError> {
        let state = self
            .store
            .set_share_enabled(id, enabled, Utc::now())
            .await
            .inspect_err(|e| log_failure("toggle_share", e))?
            .ok_or_else(|| not_found(id))?;
        info!(
            event_name = "share.toggled",
            quote_id = %id,
            share_enabled = enabled,
            "quotation sharing toggled"
        );
        Ok(state)
    }

    pub async fn delete(&self, id: QuotationId) -> Result<(), ApplicationError> {
        let deleted = self.store.delete(id).await.inspect_err(|e| log_failure("delete", e))?;
        if !deleted {
            return Err(not_found(id));
        }
        info!(event_name = "quotation.deleted", quote_id = %id, "quotation deleted");
        Ok(())
    }

    pub async fn get(&self, id: QuotationId) -> Result<QuotationDetail, ApplicationError> {
        self.store
            .find_detail(id)
            .await
            .inspect_err(|e| log_failure("get", e))?
            .ok_or_else(|| not_found(id))
    }

    pub async fn list(&self, query: QuotationQuery) -> Result<QuotationPage, ApplicationError> {
        let (quotations, total) =
            self.store.list(&query).await.inspect_err(|e| log_failure("list", e))?;
        Ok(QuotationPage { quotations, total, limit: query.limit, offset: query.offset })
    }

    /// Public read. Unknown and disabled tokens fail identically; an enabled
    /// share past its validity fails as expired.
    pub async fn get_by_token(&self, token: &str) -> Result<SharedQuotation, ApplicationError> {
        let found = self
            .store
            .find_by_share_token(token)
            .await
            .inspect_err(|e| log_failure("get_by_token", e))?;

        let Some(QuotationWithItems { quotation, items }) = found else {
            info!(
                event_name = "share.access_denied",
                token_prefix = token_preview(token),
                reason = "unknown_token",
                "share access denied"
            );
            return Err(ApplicationError::NotFound(SHARE_UNAVAILABLE.to_string()));
        };

        if let Err(denied) = check_share_access(&quotation, Utc::now()) {
            let reason =
                if matches!(denied, ApplicationError::Expired { .. }) { "expired" } else { "disabled" };
            info!(
                event_name = "share.access_denied",
                token_prefix = token_preview(token),
                quote_id = %quotation.id,
                reason,
                "share access denied"
            );
            return Err(denied);
        }

        let settings =
            self.settings.current().await.inspect_err(|e| log_failure("get_by_token", e))?;
        info!(
            event_name = "share.viewed",
            token_prefix = token_preview(token),
            quote_id = %quotation.id,
            "shared quotation viewed"
        );
        Ok(SharedQuotation {
            quotation,
            items,
            assumptions_text: settings.assumptions_text,
            terms_text: settings.terms_text,
        })
    }

    pub async fn stats(&self) -> Result<QuotationStats, ApplicationError> {
        let rows = self.store.status_totals().await.inspect_err(|e| log_failure("stats", e))?;
        Ok(QuotationStats::from_rows(rows)?)
    }
}

fn not_found(id: QuotationId) -> ApplicationError {
    ApplicationError::NotFound(format!("quotation {id} not found"))
}

fn log_failure(operation: &'static str, error: &ApplicationError) {
    if error.is_server_fault() {
        error!(event_name = "quotation.operation_failed", operation, error = %error, "quotation operation failed");
    } else {
        warn!(event_name = "quotation.operation_rejected", operation, error = %error, "quotation operation rejected");
    }
}
