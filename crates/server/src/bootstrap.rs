use std::sync::Arc;

use estimator_core::config::{AppConfig, ConfigError, LoadOptions};
use estimator_core::{CatalogPriceResolver, QuotationService};
use estimator_db::{
    connect_with_config, migrations, DbPool, SqlCatalogRepository, SqlQuotationStore,
    SqlSettingsRepository,
};
use thiserror::Error;
use tracing::info;

use crate::api::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        max_connections = config.database.max_connections,
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let state = wire_state(db_pool.clone());
    Ok(Application { config, db_pool, state })
}

pub fn wire_state(db_pool: DbPool) -> AppState {
    let service = QuotationService::new(
        Arc::new(SqlQuotationStore::new(db_pool.clone())),
        Arc::new(SqlSettingsRepository::new(db_pool.clone())),
    );
    let resolver = CatalogPriceResolver::new(Arc::new(SqlCatalogRepository::new(db_pool.clone())));
    AppState::new(Arc::new(service), resolver, db_pool)
}
