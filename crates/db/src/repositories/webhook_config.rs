use secrecy::ExposeSecret;
use sqlx::{sqlite::SqliteRow, Row};

use callbridge_core::domain::webhook::{
    Platform, RetiredWebhook, WebhookConfig, WebhookDescriptor, WebhookKind,
};

use super::mapping::parse_timestamp;
use super::{RepositoryError, WebhookConfigRepository};
use crate::DbPool;

/// One row per remote subscription; `save` replaces the integration's whole
/// set inside a transaction.
pub struct SqlWebhookConfigRepository {
    pool: DbPool,
}

impl SqlWebhookConfigRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl WebhookConfigRepository for SqlWebhookConfigRepository {
    async fn load(&self, integration_id: &str) -> Result<WebhookConfig, RepositoryError> {
        let rows = sqlx::query(
            "SELECT
                platform,
                descriptor_id,
                kind,
                signing_key,
                resource_ids_json,
                url,
                created_at,
                retired
             FROM webhook_config
             WHERE integration_id = ?
             ORDER BY created_at ASC, descriptor_id ASC",
        )
        .bind(integration_id)
        .fetch_all(&self.pool)
        .await?;

        let mut config = WebhookConfig::default();
        for row in rows {
            let retired = row.try_get::<bool, _>("retired")?;
            let (platform, descriptor) = descriptor_from_row(row)?;
            if retired {
                config.retired.push(RetiredWebhook { platform, descriptor });
            } else {
                config.side_mut(platform).push(descriptor);
            }
        }
        Ok(config)
    }

    async fn save(
        &self,
        integration_id: &str,
        config: &WebhookConfig,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM webhook_config WHERE integration_id = ?")
            .bind(integration_id)
            .execute(&mut *tx)
            .await?;

        let active = [Platform::Telephony, Platform::Crm].into_iter().flat_map(|platform| {
            config.side(platform).iter().map(move |descriptor| (platform, descriptor, false))
        });
        let retiring =
            config.retired.iter().map(|entry| (entry.platform, &entry.descriptor, true));

        let rows: Vec<(Platform, &WebhookDescriptor, bool)> = active.chain(retiring).collect();

        for (platform, descriptor, retired) in rows {
            let resource_ids_json =
                serde_json::to_string(&descriptor.resource_ids).map_err(|error| {
                    RepositoryError::Decode(format!("invalid resource ids: {error}"))
                })?;

            sqlx::query(
                "INSERT INTO webhook_config (
                    integration_id,
                    platform,
                    descriptor_id,
                    kind,
                    signing_key,
                    resource_ids_json,
                    url,
                    created_at,
                    retired
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(integration_id)
            .bind(platform.as_str())
            .bind(&descriptor.id)
            .bind(descriptor.kind.as_str())
            .bind(descriptor.key.expose_secret())
            .bind(resource_ids_json)
            .bind(&descriptor.url)
            .bind(descriptor.created_at.to_rfc3339())
            .bind(retired)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn clear(&self, integration_id: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM webhook_config WHERE integration_id = ?")
            .bind(integration_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn descriptor_from_row(row: SqliteRow) -> Result<(Platform, WebhookDescriptor), RepositoryError> {
    let platform_raw = row.try_get::<String, _>("platform")?;
    let platform = Platform::parse(&platform_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown platform `{platform_raw}`")))?;

    let kind_raw = row.try_get::<String, _>("kind")?;
    let kind = WebhookKind::parse(&kind_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown webhook kind `{kind_raw}`")))?;

    let resource_ids_raw = row.try_get::<String, _>("resource_ids_json")?;
    let resource_ids = serde_json::from_str(&resource_ids_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid resource_ids_json: {error}")))?;

    let descriptor = WebhookDescriptor {
        id: row.try_get("descriptor_id")?,
        kind,
        key: row.try_get::<String, _>("signing_key")?.into(),
        resource_ids,
        url: row.try_get("url")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    };

    Ok((platform, descriptor))
}
