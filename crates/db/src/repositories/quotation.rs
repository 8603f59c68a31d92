//! SQLite-backed quotation store. Every operation that touches more than one
//! row runs inside a single transaction; an early return drops the
//! transaction, which rolls it back.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use tracing::debug;

use estimator_core::aggregator::{revise, QuotationUpdate};
use estimator_core::domain::activity::{ActivityLogEntry, NewActivity};
use estimator_core::domain::catalog::CatalogItemRef;
use estimator_core::domain::line_item::{LineItem, LineItemDraft};
use estimator_core::domain::quotation::{
    CustomerDetails, NewQuotation, Quotation, QuotationId, QuotationStatus,
};
use estimator_core::domain::read_model::{
    QuotationDetail, QuotationQuery, QuotationWithItems, ShareState,
};
use estimator_core::errors::ApplicationError;
use estimator_core::identifiers::format_quote_number;
use estimator_core::lifecycle::{plan_transition, StatusChangeOutcome, StatusChangeRequest};
use estimator_core::store::QuotationStore;
use estimator_core::versioning::{plan_clone, CloneRequest};

use super::{decode_decimal, decode_enum, decode_timestamp, encode_timestamp, RepositoryError};
use crate::DbPool;

const QUOTATION_COLUMNS: &str = "id, quote_number, version, parent_quote_id, status,
    customer_name, customer_company, customer_email, customer_phone, customer_address, customer_gst,
    validity_days, valid_until, internal_notes, rejection_reason,
    subtotal, tax_rate, tax_amount, discount_amount, grand_total, currency,
    share_token, share_enabled, created_by, approved_by, approved_at, sent_at,
    created_at, updated_at";

const ITEM_COLUMNS: &str = "id, quote_id, item_type, item_id, item_name, item_description,
    plan_name, duration, unit_price, quantity, total_price, specifications, features,
    order_index, created_at";

pub struct SqlQuotationStore {
    pool: DbPool,
}

impl SqlQuotationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn insert_quotation(
        &self,
        quotation: NewQuotation,
    ) -> Result<QuotationWithItems, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let quote_number =
            next_quote_number(&mut tx, &quotation.quote_prefix, quotation.created_at.year()).await?;
        let id = write_new_quotation(&mut tx, &quotation, &quote_number).await?;
        let created = load_with_items(&mut tx, id).await?;
        tx.commit().await?;

        created.ok_or_else(|| RepositoryError::Decode(format!("quotation {id} vanished after insert")))
    }

    async fn update_quotation(
        &self,
        id: QuotationId,
        update: QuotationUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<QuotationWithItems>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Take the write lock before reading so the totals below are computed
        // from the row as it is committed, and readers never see the item list
        // between the delete and the insert.
        if !touch(&mut tx, id, now).await? {
            return Ok(None);
        }
        let Some(existing) = fetch_quotation(&mut tx, id).await? else {
            return Ok(None);
        };

        let revision = revise(&existing, &update, now)?;
        let customer = &revision.customer;
        sqlx::query(
            "UPDATE quotations SET
                 customer_name = ?, customer_company = ?, customer_email = ?,
                 customer_phone = ?, customer_address = ?, customer_gst = ?,
                 validity_days = ?, valid_until = ?, internal_notes = ?,
                 subtotal = ?, tax_rate = ?, tax_amount = ?, discount_amount = ?, grand_total = ?,
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(&customer.customer_name)
        .bind(&customer.customer_company)
        .bind(&customer.customer_email)
        .bind(&customer.customer_phone)
        .bind(&customer.customer_address)
        .bind(&customer.customer_gst)
        .bind(i64::from(revision.validity_days))
        .bind(encode_timestamp(&revision.valid_until))
        .bind(&revision.internal_notes)
        .bind(revision.totals.subtotal.to_string())
        .bind(revision.totals.tax_rate.to_string())
        .bind(revision.totals.tax_amount.to_string())
        .bind(revision.totals.discount_amount.to_string())
        .bind(revision.totals.grand_total.to_string())
        .bind(encode_timestamp(&revision.updated_at))
        .bind(id.0)
        .execute(&mut *tx)
        .await?;

        if let Some(items) = &update.items {
            sqlx::query("DELETE FROM quote_items WHERE quote_id = ?")
                .bind(id.0)
                .execute(&mut *tx)
                .await?;
            insert_items(&mut tx, id, items, now).await?;
        }

        let updated = load_with_items(&mut tx, id).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn change_quotation_status(
        &self,
        id: QuotationId,
        request: StatusChangeRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<StatusChangeOutcome>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Lock first so the recorded old status is the one this change replaces.
        if !touch(&mut tx, id, now).await? {
            return Ok(None);
        }
        let raw_status: String = sqlx::query("SELECT status FROM quotations WHERE id = ?")
            .bind(id.0)
            .fetch_one(&mut *tx)
            .await?
            .try_get("status")?;
        let old_status: QuotationStatus = decode_enum("status", &raw_status)?;

        let transition = plan_transition(old_status, &request, now);
        sqlx::query(
            "UPDATE quotations SET
                 status = ?,
                 approved_by = COALESCE(?, approved_by),
                 approved_at = COALESCE(?, approved_at),
                 sent_at = COALESCE(?, sent_at),
                 rejection_reason = COALESCE(?, rejection_reason),
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(transition.new_status.as_str())
        .bind(&transition.approved_by)
        .bind(transition.approved_at.as_ref().map(encode_timestamp))
        .bind(transition.sent_at.as_ref().map(encode_timestamp))
        .bind(&transition.rejection_reason)
        .bind(encode_timestamp(&transition.updated_at))
        .bind(id.0)
        .execute(&mut *tx)
        .await?;

        insert_activity(&mut tx, id, &transition.activity, now).await?;
        tx.commit().await?;

        Ok(Some(StatusChangeOutcome { quote_id: id, old_status, new_status: transition.new_status }))
    }

    async fn clone_quotation(
        &self,
        id: QuotationId,
        request: CloneRequest,
    ) -> Result<Option<QuotationWithItems>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Allocating the number is the first write, so the source read below
        // happens under the write lock. A missing source rolls the allocation
        // back with everything else.
        let quote_number =
            next_quote_number(&mut tx, &request.quote_prefix, request.requested_at.year()).await?;
        let Some(source) = fetch_quotation(&mut tx, id).await? else {
            return Ok(None);
        };
        let items = fetch_items(&mut tx, id).await?;

        let planned = plan_clone(&source, &items, request);
        let clone_id = write_new_quotation(&mut tx, &planned, &quote_number).await?;
        let cloned = load_with_items(&mut tx, clone_id).await?;
        tx.commit().await?;
        Ok(cloned)
    }

    async fn update_share_enabled(
        &self,
        id: QuotationId,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<ShareState>, RepositoryError> {
        let row = sqlx::query(
            "UPDATE quotations SET share_enabled = ?, updated_at = ? WHERE id = ? RETURNING share_token",
        )
        .bind(enabled)
        .bind(encode_timestamp(&now))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(ShareState {
                quote_id: id,
                share_token: row.try_get("share_token")?,
                share_enabled: enabled,
            })),
            None => Ok(None),
        }
    }

    async fn delete_quotation(&self, id: QuotationId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE quotations SET parent_quote_id = NULL WHERE parent_quote_id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM quote_items WHERE quote_id = ?").bind(id.0).execute(&mut *tx).await?;
        sqlx::query("DELETE FROM quote_activity_log WHERE quote_id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM quotations WHERE id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Ok(false);
        }
        tx.commit().await?;
        Ok(true)
    }

    async fn load_detail(&self, id: QuotationId) -> Result<Option<QuotationDetail>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let Some(quotation) = fetch_quotation(&mut tx, id).await? else {
            return Ok(None);
        };
        let items = fetch_items(&mut tx, id).await?;
        let activities = fetch_activities(&mut tx, id).await?;
        tx.commit().await?;

        Ok(Some(QuotationDetail { quotation, items, activities }))
    }

    async fn load_by_share_token(
        &self,
        token: &str,
    ) -> Result<Option<QuotationWithItems>, RepositoryError> {
        // One read transaction, so the totals and the items come from the same
        // committed revision even while an update replaces the item list.
        let mut tx = self.pool.begin().await?;
        let sql = format!("SELECT {QUOTATION_COLUMNS} FROM quotations WHERE share_token = ?");
        let row = sqlx::query(&sql).bind(token).fetch_optional(&mut *tx).await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let quotation = row_to_quotation(&row)?;
        let items = fetch_items(&mut tx, quotation.id).await?;
        tx.commit().await?;
        Ok(Some(QuotationWithItems { quotation, items }))
    }

    async fn list_page(
        &self,
        query: &QuotationQuery,
    ) -> Result<(Vec<QuotationWithItems>, i64), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS total FROM quotations");
        push_filters(&mut count, query);
        let total: i64 = count.build().fetch_one(&mut *tx).await?.try_get("total")?;

        let mut page = QueryBuilder::<Sqlite>::new(format!("SELECT {QUOTATION_COLUMNS} FROM quotations"));
        push_filters(&mut page, query);
        page.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(i64::from(query.limit))
            .push(" OFFSET ")
            .push_bind(i64::from(query.offset));
        let rows = page.build().fetch_all(&mut *tx).await?;
        let quotations = rows.iter().map(row_to_quotation).collect::<Result<Vec<_>, _>>()?;

        let ids: Vec<QuotationId> = quotations.iter().map(|quotation| quotation.id).collect();
        let mut items = fetch_items_for(&mut tx, &ids).await?;
        tx.commit().await?;

        let page = quotations
            .into_iter()
            .map(|quotation| {
                let items = items.remove(&quotation.id).unwrap_or_default();
                QuotationWithItems { quotation, items }
            })
            .collect();
        Ok((page, total))
    }

    async fn load_status_totals(&self) -> Result<Vec<(QuotationStatus, Decimal)>, RepositoryError> {
        let rows = sqlx::query("SELECT status, grand_total FROM quotations")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let status: String = row.try_get("status")?;
                let grand_total: String = row.try_get("grand_total")?;
                Ok((decode_enum("status", &status)?, decode_decimal("grand_total", &grand_total)?))
            })
            .collect()
    }
}

#[async_trait]
impl QuotationStore for SqlQuotationStore {
    async fn insert(&self, quotation: NewQuotation) -> Result<QuotationWithItems, ApplicationError> {
        Ok(self.insert_quotation(quotation).await?)
    }

    async fn update(
        &self,
        id: QuotationId,
        update: QuotationUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<QuotationWithItems>, ApplicationError> {
        Ok(self.update_quotation(id, update, now).await?)
    }

    async fn change_status(
        &self,
        id: QuotationId,
        request: StatusChangeRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<StatusChangeOutcome>, ApplicationError> {
        Ok(self.change_quotation_status(id, request, now).await?)
    }

    async fn insert_clone(
        &self,
        id: QuotationId,
        request: CloneRequest,
    ) -> Result<Option<QuotationWithItems>, ApplicationError> {
        Ok(self.clone_quotation(id, request).await?)
    }

    async fn set_share_enabled(
        &self,
        id: QuotationId,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<ShareState>, ApplicationError> {
        Ok(self.update_share_enabled(id, enabled, now).await?)
    }

    async fn delete(&self, id: QuotationId) -> Result<bool, ApplicationError> {
        Ok(self.delete_quotation(id).await?)
    }

    async fn find_detail(&self, id: QuotationId) -> Result<Option<QuotationDetail>, ApplicationError> {
        Ok(self.load_detail(id).await?)
    }

    async fn find_by_share_token(
        &self,
        token: &str,
    ) -> Result<Option<QuotationWithItems>, ApplicationError> {
        Ok(self.load_by_share_token(token).await?)
    }

    async fn list(
        &self,
        query: &QuotationQuery,
    ) -> Result<(Vec<QuotationWithItems>, i64), ApplicationError> {
        Ok(self.list_page(query).await?)
    }

    async fn status_totals(&self) -> Result<Vec<(QuotationStatus, Decimal)>, ApplicationError> {
        Ok(self.load_status_totals().await?)
    }
}

/// Bumps `updated_at`, returning whether the row exists. In SQLite this is
/// also what acquires the write lock for the surrounding transaction.
async fn touch(
    conn: &mut SqliteConnection,
    id: QuotationId,
    now: DateTime<Utc>,
) -> Result<bool, RepositoryError> {
    let touched = sqlx::query("UPDATE quotations SET updated_at = ? WHERE id = ?")
        .bind(encode_timestamp(&now))
        .bind(id.0)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    Ok(touched > 0)
}

async fn next_quote_number(
    conn: &mut SqliteConnection,
    prefix: &str,
    year: i32,
) -> Result<String, RepositoryError> {
    let sequence: i64 = sqlx::query(
        "INSERT INTO quote_number_sequence (prefix, year, last_value) VALUES (?, ?, 1)
         ON CONFLICT(prefix, year) DO UPDATE SET last_value = last_value + 1
         RETURNING last_value",
    )
    .bind(prefix)
    .bind(year)
    .fetch_one(&mut *conn)
    .await?
    .try_get("last_value")?;

    let quote_number = format_quote_number(prefix, year, sequence);
    debug!(event_name = "quotation.number_allocated", quote_number = %quote_number, "allocated quote number");
    Ok(quote_number)
}

async fn write_new_quotation(
    conn: &mut SqliteConnection,
    quotation: &NewQuotation,
    quote_number: &str,
) -> Result<QuotationId, RepositoryError> {
    let customer = &quotation.customer;
    let totals = &quotation.totals;
    let created_at = encode_timestamp(&quotation.created_at);

    let id = sqlx::query(
        "INSERT INTO quotations (
             quote_number, version, parent_quote_id, status,
             customer_name, customer_company, customer_email, customer_phone,
             customer_address, customer_gst, validity_days, valid_until, internal_notes,
             subtotal, tax_rate, tax_amount, discount_amount, grand_total, currency,
             share_token, share_enabled, created_by, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?)",
    )
    .bind(quote_number)
    .bind(quotation.version)
    .bind(quotation.parent_quote_id.map(|parent| parent.0))
    .bind(quotation.status.as_str())
    .bind(&customer.customer_name)
    .bind(&customer.customer_company)
    .bind(&customer.customer_email)
    .bind(&customer.customer_phone)
    .bind(&customer.customer_address)
    .bind(&customer.customer_gst)
    .bind(i64::from(quotation.validity_days))
    .bind(encode_timestamp(&quotation.valid_until))
    .bind(&quotation.internal_notes)
    .bind(totals.subtotal.to_string())
    .bind(totals.tax_rate.to_string())
    .bind(totals.tax_amount.to_string())
    .bind(totals.discount_amount.to_string())
    .bind(totals.grand_total.to_string())
    .bind(&quotation.currency)
    .bind(&quotation.share_token)
    .bind(&quotation.created_by)
    .bind(&created_at)
    .bind(&created_at)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    let id = QuotationId(id);
    insert_items(conn, id, &quotation.items, quotation.created_at).await?;
    insert_activity(conn, id, &quotation.activity, quotation.created_at).await?;
    Ok(id)
}

async fn insert_items(
    conn: &mut SqliteConnection,
    quote_id: QuotationId,
    items: &[LineItemDraft],
    created_at: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    let created_at = encode_timestamp(&created_at);
    for item in items {
        sqlx::query(
            "INSERT INTO quote_items (
                 quote_id, item_type, item_id, item_name, item_description, plan_name, duration,
                 unit_price, quantity, total_price, specifications, features, order_index, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(quote_id.0)
        .bind(item.item.kind().as_str())
        .bind(item.item.id())
        .bind(&item.item_name)
        .bind(&item.item_description)
        .bind(&item.plan_name)
        .bind(item.duration.as_str())
        .bind(item.unit_price.to_string())
        .bind(i64::from(item.quantity))
        .bind(item.total_price.to_string())
        .bind(Value::Array(item.specifications.clone()).to_string())
        .bind(Value::Array(item.features.clone()).to_string())
        .bind(item.order_index)
        .bind(&created_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn insert_activity(
    conn: &mut SqliteConnection,
    quote_id: QuotationId,
    activity: &NewActivity,
    at: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO quote_activity_log (quote_id, action, old_status, new_status, actor, note, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(quote_id.0)
    .bind(activity.action.as_str())
    .bind(activity.old_status.map(|status| status.as_str()))
    .bind(activity.new_status.map(|status| status.as_str()))
    .bind(&activity.actor)
    .bind(&activity.note)
    .bind(encode_timestamp(&at))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn fetch_quotation(
    conn: &mut SqliteConnection,
    id: QuotationId,
) -> Result<Option<Quotation>, RepositoryError> {
    let sql = format!("SELECT {QUOTATION_COLUMNS} FROM quotations WHERE id = ?");
    let row = sqlx::query(&sql).bind(id.0).fetch_optional(&mut *conn).await?;
    row.as_ref().map(row_to_quotation).transpose()
}

async fn load_with_items(
    conn: &mut SqliteConnection,
    id: QuotationId,
) -> Result<Option<QuotationWithItems>, RepositoryError> {
    let Some(quotation) = fetch_quotation(conn, id).await? else {
        return Ok(None);
    };
    let items = fetch_items(conn, id).await?;
    Ok(Some(QuotationWithItems { quotation, items }))
}

async fn fetch_items(
    conn: &mut SqliteConnection,
    quote_id: QuotationId,
) -> Result<Vec<LineItem>, RepositoryError> {
    let sql = format!(
        "SELECT {ITEM_COLUMNS} FROM quote_items WHERE quote_id = ? ORDER BY order_index ASC, id ASC"
    );
    let rows = sqlx::query(&sql).bind(quote_id.0).fetch_all(&mut *conn).await?;
    rows.iter().map(row_to_item).collect()
}

async fn fetch_items_for(
    conn: &mut SqliteConnection,
    quote_ids: &[QuotationId],
) -> Result<HashMap<QuotationId, Vec<LineItem>>, RepositoryError> {
    let mut grouped: HashMap<QuotationId, Vec<LineItem>> = HashMap::new();
    if quote_ids.is_empty() {
        return Ok(grouped);
    }

    let mut builder =
        QueryBuilder::<Sqlite>::new(format!("SELECT {ITEM_COLUMNS} FROM quote_items WHERE quote_id IN ("));
    let mut ids = builder.separated(", ");
    for id in quote_ids {
        ids.push_bind(id.0);
    }
    ids.push_unseparated(") ORDER BY quote_id ASC, order_index ASC, id ASC");

    for row in builder.build().fetch_all(&mut *conn).await? {
        let item = row_to_item(&row)?;
        grouped.entry(item.quote_id).or_default().push(item);
    }
    Ok(grouped)
}

async fn fetch_activities(
    conn: &mut SqliteConnection,
    quote_id: QuotationId,
) -> Result<Vec<ActivityLogEntry>, RepositoryError> {
    let rows = sqlx::query(
        "SELECT id, quote_id, action, old_status, new_status, actor, note, created_at
         FROM quote_activity_log WHERE quote_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(quote_id.0)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(row_to_activity).collect()
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &QuotationQuery) {
    builder.push(" WHERE 1 = 1");
    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(email) = &query.customer_email {
        builder
            .push(" AND customer_email LIKE ")
            .push_bind(format!("%{}%", escape_like(email)))
            .push(" ESCAPE '\\'");
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn row_to_quotation(row: &SqliteRow) -> Result<Quotation, RepositoryError> {
    let status: String = row.try_get("status")?;
    let validity_days: i64 = row.try_get("validity_days")?;
    let valid_until: String = row.try_get("valid_until")?;
    let approved_at: Option<String> = row.try_get("approved_at")?;
    let sent_at: Option<String> = row.try_get("sent_at")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    let parent_quote_id: Option<i64> = row.try_get("parent_quote_id")?;

    Ok(Quotation {
        id: QuotationId(row.try_get("id")?),
        quote_number: row.try_get("quote_number")?,
        version: row.try_get("version")?,
        parent_quote_id: parent_quote_id.map(QuotationId),
        status: decode_enum("status", &status)?,
        customer: CustomerDetails {
            customer_name: row.try_get("customer_name")?,
            customer_company: row.try_get("customer_company")?,
            customer_email: row.try_get("customer_email")?,
            customer_phone: row.try_get("customer_phone")?,
            customer_address: row.try_get("customer_address")?,
            customer_gst: row.try_get("customer_gst")?,
        },
        validity_days: u32::try_from(validity_days).map_err(|_| {
            RepositoryError::Decode(format!("validity_days: `{validity_days}` out of range"))
        })?,
        valid_until: decode_timestamp("valid_until", &valid_until)?,
        internal_notes: row.try_get("internal_notes")?,
        rejection_reason: row.try_get("rejection_reason")?,
        subtotal: decimal_column(row, "subtotal")?,
        tax_rate: decimal_column(row, "tax_rate")?,
        tax_amount: decimal_column(row, "tax_amount")?,
        discount_amount: decimal_column(row, "discount_amount")?,
        grand_total: decimal_column(row, "grand_total")?,
        currency: row.try_get("currency")?,
        share_token: row.try_get("share_token")?,
        share_enabled: row.try_get("share_enabled")?,
        created_by: row.try_get("created_by")?,
        approved_by: row.try_get("approved_by")?,
        approved_at: approved_at.map(|raw| decode_timestamp("approved_at", &raw)).transpose()?,
        sent_at: sent_at.map(|raw| decode_timestamp("sent_at", &raw)).transpose()?,
        created_at: decode_timestamp("created_at", &created_at)?,
        updated_at: decode_timestamp("updated_at", &updated_at)?,
    })
}

fn row_to_item(row: &SqliteRow) -> Result<LineItem, RepositoryError> {
    let item_type: String = row.try_get("item_type")?;
    let duration: String = row.try_get("duration")?;
    let quantity: i64 = row.try_get("quantity")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(LineItem {
        id: row.try_get("id")?,
        quote_id: QuotationId(row.try_get("quote_id")?),
        draft: LineItemDraft {
            item: CatalogItemRef::new(decode_enum("item_type", &item_type)?, row.try_get("item_id")?),
            item_name: row.try_get("item_name")?,
            item_description: row.try_get("item_description")?,
            plan_name: row.try_get("plan_name")?,
            duration: decode_enum("duration", &duration)?,
            unit_price: decimal_column(row, "unit_price")?,
            quantity: u32::try_from(quantity)
                .map_err(|_| RepositoryError::Decode(format!("quantity: `{quantity}` out of range")))?,
            total_price: decimal_column(row, "total_price")?,
            specifications: json_list_column(row, "specifications")?,
            features: json_list_column(row, "features")?,
            order_index: row.try_get("order_index")?,
        },
        created_at: decode_timestamp("created_at", &created_at)?,
    })
}

fn row_to_activity(row: &SqliteRow) -> Result<ActivityLogEntry, RepositoryError> {
    let action: String = row.try_get("action")?;
    let old_status: Option<String> = row.try_get("old_status")?;
    let new_status: Option<String> = row.try_get("new_status")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(ActivityLogEntry {
        id: row.try_get("id")?,
        quote_id: QuotationId(row.try_get("quote_id")?),
        action: decode_enum("action", &action)?,
        old_status: old_status.map(|raw| decode_enum("old_status", &raw)).transpose()?,
        new_status: new_status.map(|raw| decode_enum("new_status", &raw)).transpose()?,
        actor: row.try_get("actor")?,
        note: row.try_get("note")?,
        created_at: decode_timestamp("created_at", &created_at)?,
    })
}

fn decimal_column(row: &SqliteRow, column: &str) -> Result<Decimal, RepositoryError> {
    let raw: String = row.try_get(column)?;
    decode_decimal(column, &raw)
}

fn json_list_column(row: &SqliteRow, column: &str) -> Result<Vec<Value>, RepositoryError> {
    let raw: String = row.try_get(column)?;
    serde_json::from_str(&raw).map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}
