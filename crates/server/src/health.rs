use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{SecondsFormat, Utc};
use estimator_db::DbPool;
use serde::Serialize;
use tracing::warn;

/// Tables the quotation routes cannot serve without.
const REQUIRED_TABLES: [&str; 4] =
    ["estimator_settings", "quotations", "quote_items", "quote_activity_log"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    Degraded,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DatabaseProbe {
    pub status: Readiness,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: Readiness,
    pub version: &'static str,
    pub database: DatabaseProbe,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(db_pool)
}

pub async fn health(State(pool): State<DbPool>) -> (StatusCode, Json<HealthReport>) {
    let database = probe_database(&pool).await;
    let status = database.status;
    if status == Readiness::Degraded {
        warn!(event_name = "http.health_degraded", detail = %database.detail, "database not ready");
    }

    let report = HealthReport {
        status,
        version: env!("CARGO_PKG_VERSION"),
        database,
        checked_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    };
    let code = match status {
        Readiness::Ready => StatusCode::OK,
        Readiness::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(report))
}

async fn probe_database(pool: &DbPool) -> DatabaseProbe {
    let present: Result<Vec<String>, sqlx::Error> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' \
         AND name IN ('estimator_settings', 'quotations', 'quote_items', 'quote_activity_log')",
    )
    .fetch_all(pool)
    .await;

    match present {
        Ok(tables) => {
            let missing: Vec<&str> = REQUIRED_TABLES
                .into_iter()
                .filter(|table| !tables.iter().any(|name| name == table))
                .collect();
            if missing.is_empty() {
                DatabaseProbe { status: Readiness::Ready, detail: "schema present".to_string() }
            } else {
                DatabaseProbe {
                    status: Readiness::Degraded,
                    detail: format!("missing tables: {}", missing.join(", ")),
                }
            }
        }
        Err(error) => DatabaseProbe {
            status: Readiness::Degraded,
            detail: format!("database unreachable: {error}"),
        },
    }
}
