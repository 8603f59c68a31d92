use async_trait::async_trait;
use sqlx::{Row, SqliteConnection};

use estimator_core::domain::catalog::{BillingDuration, CatalogItemRef, CatalogKind};
use estimator_core::errors::ApplicationError;
use estimator_core::store::{CatalogBody, CatalogRecord, CatalogRow, CatalogSource};

use super::RepositoryError;
use crate::DbPool;

const SECTION_TABLES: [(CatalogKind, &str); 3] = [
    (CatalogKind::Marketplace, "marketplace_items"),
    (CatalogKind::Product, "product_items"),
    (CatalogKind::Solution, "solution_items"),
];

const PLAN_TABLES: [(CatalogKind, &str); 2] =
    [(CatalogKind::ComputePlan, "compute_plans"), (CatalogKind::DiskOffering, "disk_offerings")];

/// Reads the five catalog sources. Table and column names come from closed
/// enums, never from caller input.
pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn section(&self, table: &'static str, id: i64) -> Result<CatalogRecord, RepositoryError> {
        let sql = format!("SELECT content FROM {table} WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(CatalogRecord::Section { content: row.try_get("content")? }),
            None => Ok(CatalogRecord::Missing),
        }
    }

    async fn plan(
        &self,
        table: &'static str,
        id: i64,
        duration: BillingDuration,
    ) -> Result<CatalogRecord, RepositoryError> {
        let column = duration.price_key();
        let sql = format!("SELECT {column} AS price, is_active FROM {table} WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(CatalogRecord::Plan {
                active: row.try_get("is_active")?,
                price: row.try_get("price")?,
            }),
            None => Ok(CatalogRecord::Missing),
        }
    }

    async fn list_rows(&self) -> Result<Vec<CatalogRow>, RepositoryError> {
        // One snapshot across all five tables.
        let mut tx = self.pool.begin().await?;
        let mut rows = Vec::new();
        for (kind, table) in SECTION_TABLES {
            list_sections(&mut tx, kind, table, &mut rows).await?;
        }
        for (kind, table) in PLAN_TABLES {
            list_plans(&mut tx, kind, table, &mut rows).await?;
        }
        tx.commit().await?;
        Ok(rows)
    }
}

async fn list_sections(
    conn: &mut SqliteConnection,
    kind: CatalogKind,
    table: &'static str,
    out: &mut Vec<CatalogRow>,
) -> Result<(), RepositoryError> {
    let sql = format!("SELECT id, name, content FROM {table} ORDER BY id ASC");
    for row in sqlx::query(&sql).fetch_all(&mut *conn).await? {
        out.push(CatalogRow {
            item: CatalogItemRef::new(kind, row.try_get("id")?),
            name: row.try_get("name")?,
            body: CatalogBody::Content(row.try_get("content")?),
        });
    }
    Ok(())
}

async fn list_plans(
    conn: &mut SqliteConnection,
    kind: CatalogKind,
    table: &'static str,
    out: &mut Vec<CatalogRow>,
) -> Result<(), RepositoryError> {
    let sql = format!(
        "SELECT id, name, hourly_price, monthly_price, quarterly_price, yearly_price
         FROM {table} WHERE is_active = 1 ORDER BY id ASC"
    );
    for row in sqlx::query(&sql).fetch_all(&mut *conn).await? {
        let prices = [
            row.try_get("hourly_price")?,
            row.try_get("monthly_price")?,
            row.try_get("quarterly_price")?,
            row.try_get("yearly_price")?,
        ];
        out.push(CatalogRow {
            item: CatalogItemRef::new(kind, row.try_get("id")?),
            name: row.try_get("name")?,
            body: CatalogBody::Columns(prices),
        });
    }
    Ok(())
}

#[async_trait]
impl CatalogSource for SqlCatalogRepository {
    async fn lookup(
        &self,
        item: CatalogItemRef,
        duration: BillingDuration,
    ) -> Result<CatalogRecord, ApplicationError> {
        let record = match item {
            CatalogItemRef::Marketplace(id) => self.section("marketplace_items", id).await,
            CatalogItemRef::Product(id) => self.section("product_items", id).await,
            CatalogItemRef::Solution(id) => self.section("solution_items", id).await,
            CatalogItemRef::ComputePlan(id) => self.plan("compute_plans", id, duration).await,
            CatalogItemRef::DiskOffering(id) => self.plan("disk_offerings", id, duration).await,
        };
        Ok(record?)
    }

    async fn list_all(&self) -> Result<Vec<CatalogRow>, ApplicationError> {
        Ok(self.list_rows().await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;

    use estimator_core::domain::catalog::{BillingDuration, CatalogItemRef};
    use estimator_core::errors::ApplicationError;
    use estimator_core::resolver::CatalogPriceResolver;
    use estimator_core::store::{CatalogRecord, CatalogSource};

    use super::SqlCatalogRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        sqlx::query(
            "INSERT INTO marketplace_items (id, name, content) VALUES
                (1, 'Odoo ERP', '{\"monthly_price\":\"₹1,000\",\"yearly_price\":\"Contact Sales\"}'),
                (2, 'Half edited', '{\"monthly_price\": '),
                (3, 'Blank', NULL)",
        )
        .execute(&pool)
        .await
        .expect("seed marketplace");
        sqlx::query(
            "INSERT INTO compute_plans (id, name, hourly_price, monthly_price, is_active) VALUES
                (10, 'GP-2', '₹2.50', '₹1,499', 1),
                (11, 'Retired', '₹1.00', '₹499', 0)",
        )
        .execute(&pool)
        .await
        .expect("seed compute plans");
        sqlx::query(
            "INSERT INTO disk_offerings (id, name, monthly_price, is_active) VALUES (20, 'SSD 100GB', 'N/A', 1)",
        )
        .execute(&pool)
        .await
        .expect("seed disk offerings");

        pool
    }

    #[tokio::test]
    async fn lookup_dispatches_by_item_kind() {
        let repo = SqlCatalogRepository::new(setup().await);

        let section = repo
            .lookup(CatalogItemRef::Marketplace(1), BillingDuration::Monthly)
            .await
            .expect("lookup");
        assert!(matches!(section, CatalogRecord::Section { content: Some(_) }));

        let plan = repo
            .lookup(CatalogItemRef::ComputePlan(10), BillingDuration::Hourly)
            .await
            .expect("lookup");
        assert_eq!(plan, CatalogRecord::Plan { active: true, price: Some("₹2.50".to_string()) });

        let missing = repo
            .lookup(CatalogItemRef::Product(404), BillingDuration::Monthly)
            .await
            .expect("lookup");
        assert_eq!(missing, CatalogRecord::Missing);
    }

    #[tokio::test]
    async fn resolver_prices_catalog_rows() {
        let resolver = CatalogPriceResolver::new(Arc::new(SqlCatalogRepository::new(setup().await)));

        let monthly = resolver
            .resolve(CatalogItemRef::Marketplace(1), BillingDuration::Monthly)
            .await
            .expect("resolve");
        assert_eq!(monthly, Some(Decimal::new(1000, 0)));

        let sentinel = resolver
            .resolve(CatalogItemRef::Marketplace(1), BillingDuration::Yearly)
            .await
            .expect("resolve");
        assert_eq!(sentinel, None);

        let compute = resolver
            .resolve(CatalogItemRef::ComputePlan(10), BillingDuration::Monthly)
            .await
            .expect("resolve");
        assert_eq!(compute, Some(Decimal::new(1499, 0)));
    }

    #[tokio::test]
    async fn incomplete_catalog_content_has_no_price() {
        let resolver = CatalogPriceResolver::new(Arc::new(SqlCatalogRepository::new(setup().await)));

        for item in [
            CatalogItemRef::Marketplace(2),
            CatalogItemRef::Marketplace(3),
            CatalogItemRef::ComputePlan(11),
            CatalogItemRef::DiskOffering(20),
        ] {
            let price = resolver.resolve(item, BillingDuration::Monthly).await.expect("resolve");
            assert_eq!(price, None, "{item} should have no price");
        }
    }

    #[tokio::test]
    async fn listing_covers_every_source_and_skips_inactive_plans() {
        let pool = setup().await;
        sqlx::query(
            "INSERT INTO solution_items (id, name, content) VALUES
                (5, 'Backup as a Service', '{\"yearly_price\": 12000}')",
        )
        .execute(&pool)
        .await
        .expect("seed solutions");
        let resolver = CatalogPriceResolver::new(Arc::new(SqlCatalogRepository::new(pool)));

        let listing = resolver.list_all().await.expect("listing");

        let marketplace_ids: Vec<_> = listing.marketplaces.iter().map(|entry| entry.item).collect();
        assert_eq!(
            marketplace_ids,
            vec![
                CatalogItemRef::Marketplace(1),
                CatalogItemRef::Marketplace(2),
                CatalogItemRef::Marketplace(3)
            ]
        );
        assert_eq!(listing.marketplaces[0].pricing.monthly, Some(Decimal::new(1000, 0)));
        assert_eq!(listing.marketplaces[0].pricing.yearly, None);
        assert_eq!(listing.marketplaces[1].pricing.monthly, None);
        assert!(listing.products.is_empty());
        assert_eq!(listing.solutions[0].pricing.yearly, Some(Decimal::new(12000, 0)));

        assert_eq!(listing.compute_plans.len(), 1, "retired plan is not listed");
        let plan = &listing.compute_plans[0];
        assert_eq!(plan.name, "GP-2");
        assert_eq!(plan.pricing.hourly, Some(Decimal::new(250, 2)));
        assert_eq!(plan.pricing.monthly, Some(Decimal::new(1499, 0)));
        assert_eq!(listing.disk_offerings[0].pricing.monthly, None);
    }

    #[tokio::test]
    async fn missing_catalog_item_is_not_found() {
        let resolver = CatalogPriceResolver::new(Arc::new(SqlCatalogRepository::new(setup().await)));
        let error = resolver
            .resolve(CatalogItemRef::DiskOffering(999), BillingDuration::Monthly)
            .await
            .expect_err("missing");
        assert!(matches!(error, ApplicationError::NotFound(_)));
    }
}
