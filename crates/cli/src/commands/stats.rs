use std::sync::Arc;

use estimator_core::QuotationService;
use estimator_db::{SqlQuotationStore, SqlSettingsRepository};

use crate::commands::{with_database, CommandResult};

pub fn run() -> CommandResult {
    let stats = with_database("stats", |pool| async move {
        let service = QuotationService::new(
            Arc::new(SqlQuotationStore::new(pool.clone())),
            Arc::new(SqlSettingsRepository::new(pool)),
        );
        service.stats().await.map_err(|error| ("query", error.to_string(), 5u8))
    });

    let stats = match stats {
        Ok(stats) => stats,
        Err(failure) => return failure,
    };

    match serde_json::to_value(&stats) {
        Ok(data) => CommandResult::success_with(
            "stats",
            format!("{} quotations, total value {}", stats.total_quotes, stats.total_value),
            Some(data),
        ),
        Err(error) => CommandResult::failure("stats", "serialization", error.to_string(), 3),
    }
}
