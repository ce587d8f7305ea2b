use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use callbridge_core::domain::mapping::{CorrelationKey, MappingAction, MappingRecord, SyncMethod};

use super::{MappingRepository, RepositoryError};
use crate::DbPool;

pub struct SqlMappingRepository {
    pool: DbPool,
}

impl SqlMappingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MappingRepository for SqlMappingRepository {
    async fn get(
        &self,
        integration_id: &str,
        key: &CorrelationKey,
    ) -> Result<Option<MappingRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT
                external_id,
                note_id,
                last_synced_at,
                sync_method,
                action,
                enriched_at,
                extra_json
             FROM sync_mapping
             WHERE integration_id = ? AND correlation_key = ?",
        )
        .bind(integration_id)
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(mapping_from_row).transpose()
    }

    async fn upsert(
        &self,
        integration_id: &str,
        key: &CorrelationKey,
        record: MappingRecord,
    ) -> Result<(), RepositoryError> {
        let extra_json = serde_json::to_string(&record.extra)
            .map_err(|error| RepositoryError::Decode(format!("invalid extra payload: {error}")))?;

        sqlx::query(
            "INSERT INTO sync_mapping (
                integration_id,
                correlation_key,
                external_id,
                note_id,
                last_synced_at,
                sync_method,
                action,
                enriched_at,
                extra_json
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(integration_id, correlation_key) DO UPDATE SET
                external_id = excluded.external_id,
                note_id = excluded.note_id,
                last_synced_at = excluded.last_synced_at,
                sync_method = excluded.sync_method,
                action = excluded.action,
                enriched_at = excluded.enriched_at,
                extra_json = excluded.extra_json",
        )
        .bind(integration_id)
        .bind(key.as_str())
        .bind(&record.external_id)
        .bind(&record.note_id)
        .bind(record.last_synced_at.to_rfc3339())
        .bind(record.sync_method.as_str())
        .bind(record.action.as_str())
        .bind(record.enriched_at.map(|timestamp| timestamp.to_rfc3339()))
        .bind(extra_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(
        &self,
        integration_id: &str,
        key: &CorrelationKey,
    ) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM sync_mapping WHERE integration_id = ? AND correlation_key = ?")
            .bind(integration_id)
            .bind(key.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn mapping_from_row(row: SqliteRow) -> Result<MappingRecord, RepositoryError> {
    let sync_method_raw = row.try_get::<String, _>("sync_method")?;
    let sync_method = SyncMethod::parse(&sync_method_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown sync method `{sync_method_raw}`"))
    })?;

    let action_raw = row.try_get::<String, _>("action")?;
    let action = MappingAction::parse(&action_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown mapping action `{action_raw}`")))?;

    let extra_raw = row.try_get::<String, _>("extra_json")?;
    let extra = serde_json::from_str(&extra_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid extra_json: {error}")))?;

    Ok(MappingRecord {
        external_id: row.try_get("external_id")?,
        note_id: row.try_get("note_id")?,
        last_synced_at: parse_timestamp("last_synced_at", row.try_get("last_synced_at")?)?,
        sync_method,
        action,
        enriched_at: parse_optional_timestamp("enriched_at", row.try_get("enriched_at")?)?,
        extra,
    })
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|timestamp| parse_timestamp(column, timestamp)).transpose()
}
