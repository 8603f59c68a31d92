use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::json;

use estimator_core::aggregator::{NewQuotationRequest, QuotationPatch};
use estimator_core::domain::activity::ActivityAction;
use estimator_core::domain::settings::EstimatorSettings;
use estimator_core::{
    ApplicationError, QuotationQuery, QuotationService, QuotationStatus, StatusChangeRequest,
};
use estimator_db::{
    connect_with_settings, migrations, DbPool, SqlQuotationStore, SqlSettingsRepository,
};

async fn service() -> (DbPool, QuotationService) {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    let service = QuotationService::new(
        Arc::new(SqlQuotationStore::new(pool.clone())),
        Arc::new(SqlSettingsRepository::new(pool.clone())),
    );
    (pool, service)
}

fn scenario_a_request() -> NewQuotationRequest {
    serde_json::from_value(json!({
        "customer_name": "Meera Iyer",
        "customer_company": "Acme Logistics",
        "customer_email": "meera@acme.in",
        "created_by": "Ravi",
        "items": [
            {"item_id": 1, "item_type": "marketplace", "item_name": "Odoo ERP",
             "duration": "monthly", "unit_price": "₹1,000", "quantity": 2},
            {"item_id": 4, "item_type": "solution", "item_name": "Managed backup",
             "duration": "monthly", "unit_price": "N/A", "quantity": 5}
        ]
    }))
    .expect("request")
}

#[tokio::test]
async fn created_quotation_carries_exact_totals() {
    let (_, service) = service().await;
    let created = service.create(scenario_a_request()).await.expect("create");

    assert_eq!(created.quotation.subtotal, Decimal::new(2000, 0));
    assert_eq!(created.quotation.tax_rate, Decimal::new(18, 0));
    assert_eq!(created.quotation.tax_amount, Decimal::new(360, 0));
    assert_eq!(created.quotation.grand_total, Decimal::new(2360, 0));
    assert_eq!(created.quotation.currency, "INR");
    assert_eq!(created.quotation.status, QuotationStatus::Draft);
    assert_eq!(created.quotation.created_by.as_deref(), Some("Ravi"));

    let detail = service.get(created.quotation.id).await.expect("get");
    assert_eq!(detail.activities.len(), 1);
    assert_eq!(detail.activities[0].actor, "Ravi");
}

#[tokio::test]
async fn invalid_items_are_rejected_before_anything_is_written() {
    let (pool, service) = service().await;
    let request: NewQuotationRequest = serde_json::from_value(json!({
        "items": [{"item_id": 1, "item_type": "newsletter", "item_name": "X",
                   "duration": "monthly", "unit_price": "1"}]
    }))
    .expect("request");

    let error = service.create(request).await.expect_err("unknown item type");
    assert!(matches!(error, ApplicationError::Domain(_)));

    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM quotations").fetch_one(&pool).await.expect("count");
    assert_eq!(count, 0);
}

#[tokio::test]
async fn amounts_past_the_decimal_range_are_rejected() {
    let (pool, service) = service().await;
    let request: NewQuotationRequest = serde_json::from_value(json!({
        "customer_name": "Meera Iyer",
        "items": [{"item_id": 1, "item_type": "product", "item_name": "Bulk storage",
                   "duration": "yearly", "unit_price": "79228162514264337593543950335",
                   "quantity": 2}]
    }))
    .expect("request");

    let error = service.create(request).await.expect_err("line total overflows");
    assert_eq!(error, ApplicationError::validation("amount out of range"));
    assert!(!error.is_server_fault());

    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM quotations").fetch_one(&pool).await.expect("count");
    assert_eq!(count, 0);
}

#[tokio::test]
async fn approval_records_approver_and_one_activity_entry() {
    let (_, service) = service().await;
    let created = service.create(scenario_a_request()).await.expect("create");

    let request = StatusChangeRequest {
        actor: Some("Alice".to_string()),
        ..StatusChangeRequest::new(QuotationStatus::Approved)
    };
    service.set_status(created.quotation.id, request).await.expect("approve");

    let detail = service.get(created.quotation.id).await.expect("get");
    assert_eq!(detail.quotation.status, QuotationStatus::Approved);
    assert_eq!(detail.quotation.approved_by.as_deref(), Some("Alice"));
    assert!(detail.quotation.approved_at.is_some());

    let latest = &detail.activities[0];
    assert_eq!(latest.action, ActivityAction::StatusChange);
    assert_eq!(latest.old_status, Some(QuotationStatus::Draft));
    assert_eq!(latest.new_status, Some(QuotationStatus::Approved));
    assert_eq!(detail.activities.len(), 2);
}

#[tokio::test]
async fn share_toggle_and_expiry_fail_with_distinct_errors() {
    let (pool, service) = service().await;
    let created = service.create(scenario_a_request()).await.expect("create");
    let id = created.quotation.id;
    let token = created.quotation.share_token.clone();

    let unknown = service.get_by_token("no-such-token").await.expect_err("unknown token");
    let disabled = service.get_by_token(&token).await.expect_err("disabled share");
    assert_eq!(unknown, disabled);

    service.toggle_share(id, true).await.expect("enable");
    let shared = service.get_by_token(&token).await.expect("enabled share");
    assert_eq!(shared.quotation.id, id);
    assert_eq!(shared.items.len(), 2);

    service.toggle_share(id, false).await.expect("disable");
    assert!(matches!(service.get_by_token(&token).await, Err(ApplicationError::NotFound(_))));

    service.toggle_share(id, true).await.expect("re-enable");
    let past = Utc::now() - Duration::days(1);
    sqlx::query("UPDATE quotations SET valid_until = ? WHERE id = ?")
        .bind(past.to_rfc3339_opts(chrono::SecondsFormat::Micros, true))
        .bind(id.0)
        .execute(&pool)
        .await
        .expect("expire");
    let expired = service.get_by_token(&token).await.expect_err("expired share");
    assert!(matches!(expired, ApplicationError::Expired { .. }));
}

#[tokio::test]
async fn shared_view_attaches_current_terms() {
    let (pool, service) = service().await;
    let created = service.create(scenario_a_request()).await.expect("create");
    service.toggle_share(created.quotation.id, true).await.expect("enable");

    SqlSettingsRepository::new(pool)
        .save(&EstimatorSettings {
            assumptions_text: "Prices exclude GST on bandwidth.".to_string(),
            terms_text: "Payment within 15 days.".to_string(),
            ..EstimatorSettings::default()
        })
        .await
        .expect("save settings");

    let shared = service.get_by_token(&created.quotation.share_token).await.expect("shared");
    assert_eq!(shared.terms_text, "Payment within 15 days.");
    assert_eq!(shared.assumptions_text, "Prices exclude GST on bandwidth.");
}

#[tokio::test]
async fn clone_uses_current_prefix_and_keeps_source_totals() {
    let (pool, service) = service().await;
    let created = service.create(scenario_a_request()).await.expect("create");

    SqlSettingsRepository::new(pool)
        .save(&EstimatorSettings { quote_prefix: "ACME-Q".to_string(), ..EstimatorSettings::default() })
        .await
        .expect("save settings");

    let cloned = service.clone_quotation(created.quotation.id, None).await.expect("clone");
    assert!(cloned.quotation.quote_number.starts_with("ACME-Q-"));
    assert!(cloned.quotation.quote_number.ends_with("-0001"));
    assert_eq!(cloned.quotation.version, 2);
    assert_eq!(cloned.quotation.grand_total, created.quotation.grand_total);
    assert_eq!(cloned.quotation.validity_days, created.quotation.validity_days);
}

#[tokio::test]
async fn update_rejects_negative_discount_and_missing_rows() {
    let (_, service) = service().await;
    let created = service.create(scenario_a_request()).await.expect("create");

    let negative = QuotationPatch { discount_amount: Some(Decimal::new(-1, 0)), ..Default::default() };
    let error = service.update(created.quotation.id, negative).await.expect_err("negative discount");
    assert!(matches!(error, ApplicationError::Domain(_)));

    let discount = QuotationPatch { discount_amount: Some(Decimal::new(360, 0)), ..Default::default() };
    let updated = service.update(created.quotation.id, discount).await.expect("discount");
    assert_eq!(updated.quotation.grand_total, Decimal::new(2000, 0));

    let missing = service
        .update(estimator_core::QuotationId(999), QuotationPatch::default())
        .await
        .expect_err("missing quotation");
    assert!(matches!(missing, ApplicationError::NotFound(_)));
}

#[tokio::test]
async fn list_and_stats_reflect_deletes() {
    let (_, service) = service().await;
    let first = service.create(scenario_a_request()).await.expect("create");
    service.create(scenario_a_request()).await.expect("create");

    let stats = service.stats().await.expect("stats");
    assert_eq!(stats.total_quotes, 2);
    assert_eq!(stats.total_value, Decimal::new(4720, 0));

    service.delete(first.quotation.id).await.expect("delete");
    assert!(matches!(service.get(first.quotation.id).await, Err(ApplicationError::NotFound(_))));

    let page = service.list(QuotationQuery::default()).await.expect("list");
    assert_eq!(page.total, 1);
    assert_eq!(page.quotations.len(), 1);
    assert_eq!(page.limit, QuotationQuery::default().limit);
}
