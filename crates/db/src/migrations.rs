use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use super::{run_pending, MIGRATOR};
    use crate::{connect_with_settings, DbPool};

    async fn migrated() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");
        pool
    }

    async fn schema_objects(pool: &DbPool) -> Vec<(String, String)> {
        sqlx::query_as(
            "SELECT name, IFNULL(sql, '') FROM sqlite_master
             WHERE type IN ('table', 'index')
               AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx_%'
             ORDER BY name",
        )
        .fetch_all(pool)
        .await
        .expect("read sqlite_master")
    }

    #[tokio::test]
    async fn settings_row_is_seeded_with_business_defaults() {
        let pool = migrated().await;

        let (tax_rate, prefix, validity): (String, String, i64) = sqlx::query_as(
            "SELECT tax_rate, quote_prefix, default_validity_days FROM estimator_settings WHERE id = 1",
        )
        .fetch_one(&pool)
        .await
        .expect("settings row");

        assert_eq!(tax_rate, "18");
        assert_eq!(prefix, "C4I-Q");
        assert_eq!(validity, 30);

        let second = sqlx::query("INSERT INTO estimator_settings (id) VALUES (2)").execute(&pool).await;
        assert!(second.is_err(), "settings must stay a single row");
    }

    #[tokio::test]
    async fn status_and_item_vocabularies_are_enforced() {
        let pool = migrated().await;
        let now = "2026-03-01T10:00:00.000000Z";

        let bad_status = sqlx::query(
            "INSERT INTO quotations (quote_number, status, valid_until, share_token, created_at, updated_at)
             VALUES ('Q-1', 'archived', ?1, 'tok-1', ?1, ?1)",
        )
        .bind(now)
        .execute(&pool)
        .await;
        assert!(bad_status.is_err());

        let quote_id = sqlx::query(
            "INSERT INTO quotations (quote_number, valid_until, share_token, created_at, updated_at)
             VALUES ('Q-2', ?1, 'tok-2', ?1, ?1)",
        )
        .bind(now)
        .execute(&pool)
        .await
        .expect("draft quotation")
        .last_insert_rowid();

        let bad_duration = sqlx::query(
            "INSERT INTO quote_items (quote_id, item_type, item_id, item_name, duration, unit_price, total_price, created_at)
             VALUES (?1, 'product', 1, 'Backup', 'weekly', '10', '10', ?2)",
        )
        .bind(quote_id)
        .bind(now)
        .execute(&pool)
        .await;
        assert!(bad_duration.is_err());
    }

    #[tokio::test]
    async fn deleting_a_quotation_cascades_to_its_rows() {
        let pool = migrated().await;
        let now = "2026-03-01T10:00:00.000000Z";

        let parent = sqlx::query(
            "INSERT INTO quotations (quote_number, valid_until, share_token, created_at, updated_at)
             VALUES ('Q-1', ?1, 'tok-1', ?1, ?1)",
        )
        .bind(now)
        .execute(&pool)
        .await
        .expect("parent")
        .last_insert_rowid();
        sqlx::query(
            "INSERT INTO quotations (quote_number, parent_quote_id, valid_until, share_token, created_at, updated_at)
             VALUES ('Q-2', ?1, ?2, 'tok-2', ?2, ?2)",
        )
        .bind(parent)
        .bind(now)
        .execute(&pool)
        .await
        .expect("clone");
        sqlx::query(
            "INSERT INTO quote_activity_log (quote_id, action, actor, created_at) VALUES (?1, 'created', 'system', ?2)",
        )
        .bind(parent)
        .bind(now)
        .execute(&pool)
        .await
        .expect("activity");

        sqlx::query("DELETE FROM quotations WHERE id = ?").bind(parent).execute(&pool).await.expect("delete");

        let activity: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quote_activity_log")
            .fetch_one(&pool)
            .await
            .expect("count");
        let orphan_parent: Option<i64> =
            sqlx::query_scalar("SELECT parent_quote_id FROM quotations WHERE quote_number = 'Q-2'")
                .fetch_one(&pool)
                .await
                .expect("clone row");
        assert_eq!(activity, 0);
        assert_eq!(orphan_parent, None);
    }

    #[tokio::test]
    async fn undo_then_rerun_restores_the_same_schema() {
        let pool = migrated().await;
        let before = schema_objects(&pool).await;
        assert!(before.iter().any(|(name, _)| name == "quote_number_sequence"));

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");
        assert!(schema_objects(&pool).await.is_empty(), "down migration should drop everything");

        run_pending(&pool).await.expect("re-run migrations");
        assert_eq!(schema_objects(&pool).await, before);
    }
}
