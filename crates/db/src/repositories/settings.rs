use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use estimator_core::domain::settings::EstimatorSettings;
use estimator_core::errors::ApplicationError;
use estimator_core::store::SettingsProvider;

use super::{decode_decimal, encode_timestamp, RepositoryError};
use crate::DbPool;

/// Reads the single `estimator_settings` row on every call; nothing is cached.
pub struct SqlSettingsRepository {
    pool: DbPool,
}

impl SqlSettingsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn load(&self) -> Result<EstimatorSettings, RepositoryError> {
        let row = sqlx::query(
            "SELECT tax_rate, quote_prefix, default_validity_days, assumptions_text, terms_text
             FROM estimator_settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(EstimatorSettings::default());
        };

        let tax_rate: String = row.try_get("tax_rate")?;
        let default_validity_days: i64 = row.try_get("default_validity_days")?;
        let default_validity_days = u32::try_from(default_validity_days)
            .ok()
            .filter(|days| *days > 0)
            .ok_or_else(|| {
                RepositoryError::Decode(format!(
                    "default_validity_days: `{default_validity_days}` is not a positive day count"
                ))
            })?;

        Ok(EstimatorSettings {
            tax_rate: decode_decimal("tax_rate", &tax_rate)?,
            quote_prefix: row.try_get("quote_prefix")?,
            default_validity_days,
            assumptions_text: row.try_get("assumptions_text")?,
            terms_text: row.try_get("terms_text")?,
        })
    }

    pub async fn save(&self, settings: &EstimatorSettings) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO estimator_settings (id, tax_rate, quote_prefix, default_validity_days,
                                             assumptions_text, terms_text, updated_at)
             VALUES (1, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 tax_rate = excluded.tax_rate,
                 quote_prefix = excluded.quote_prefix,
                 default_validity_days = excluded.default_validity_days,
                 assumptions_text = excluded.assumptions_text,
                 terms_text = excluded.terms_text,
                 updated_at = excluded.updated_at",
        )
        .bind(settings.tax_rate.to_string())
        .bind(&settings.quote_prefix)
        .bind(i64::from(settings.default_validity_days))
        .bind(&settings.assumptions_text)
        .bind(&settings.terms_text)
        .bind(encode_timestamp(&Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SettingsProvider for SqlSettingsRepository {
    async fn current(&self) -> Result<EstimatorSettings, ApplicationError> {
        self.load().await.map_err(|error| match error {
            RepositoryError::Decode(message) => {
                ApplicationError::Configuration(format!("estimator settings: {message}"))
            }
            other => other.into(),
        })
    }
}
