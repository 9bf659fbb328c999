/// Media retention: TTL bookkeeping, owner extensions, expiration sweep
///
/// Every generated asset carries an absolute `expires_at`. Owners may push
/// it out in fixed seven-day steps, up to a per-content-type cap (admins
/// are uncapped). A scheduled sweep deletes the blob first and only then
/// the record, re-checking `expires_at` in the DELETE so an extension that
/// lands mid-sweep always wins. A failed blob delete leaves the record in
/// place for the next run.
use crate::{
    config::RetentionConfig,
    db::models::{Account, ContentType, MediaAsset},
    error::{AppError, AppResult},
    storage::StorageDeleter,
};
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Fixed length of one retention extension
pub fn extension_window() -> Duration {
    Duration::days(7)
}

/// Attempts before giving up on a contended extension
const EXTEND_RETRIES: u32 = 3;

/// Result of a successful extension
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionOutcome {
    pub new_expires_at: DateTime<Utc>,
    pub extension_count: i64,
    pub remaining: i64,
}

/// Result of one sweep pass
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SweepOutcome {
    pub deleted_count: u64,
    pub error_count: u64,
}

/// Retention service
pub struct RetentionManager {
    db: SqlitePool,
    storage: Arc<dyn StorageDeleter>,
    config: RetentionConfig,
}

impl RetentionManager {
    pub fn new(db: SqlitePool, storage: Arc<dyn StorageDeleter>, config: RetentionConfig) -> Self {
        Self {
            db,
            storage,
            config,
        }
    }

    /// Register a freshly generated asset with its base TTL
    pub async fn create_asset(
        &self,
        owner_id: &str,
        content_type: ContentType,
        blob_key: &str,
    ) -> AppResult<MediaAsset> {
        let now = Utc::now();
        let ttl_secs = match content_type {
            ContentType::Image => self.config.image_base_ttl_secs,
            ContentType::Video => self.config.video_base_ttl_secs,
        };
        let expires_at = now + Duration::seconds(ttl_secs);
        let id = uuid::Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO media_asset
             (id, owner_id, content_type, blob_key, created_at, base_ttl_secs, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&id)
        .bind(owner_id)
        .bind(content_type.as_str())
        .bind(blob_key)
        .bind(now)
        .bind(ttl_secs)
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        tracing::debug!(asset_id = %id, owner_id, content_type = content_type.as_str(), "Asset registered");

        self.get_asset(&id).await
    }

    /// Get asset by id
    pub async fn get_asset(&self, asset_id: &str) -> AppResult<MediaAsset> {
        let sql = format!("SELECT {} FROM media_asset WHERE id = ?1", MediaAsset::COLUMNS);
        let row = sqlx::query(&sql)
            .bind(asset_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::AssetNotFound(asset_id.to_string()))?;

        MediaAsset::from_row(&row)
    }

    /// Extend an asset's retention by one fixed window
    ///
    /// Only the owner or an admin may extend. The cap applies per content
    /// type and counts all extensions ever made on the asset, whoever made
    /// them. The new deadline is one window out from the time of the
    /// request, clamped so it never moves backwards.
    pub async fn extend(&self, asset_id: &str, actor: &Account) -> AppResult<ExtensionOutcome> {
        self.extend_at(asset_id, actor, Utc::now()).await
    }

    async fn extend_at(
        &self,
        asset_id: &str,
        actor: &Account,
        now: DateTime<Utc>,
    ) -> AppResult<ExtensionOutcome> {
        for _ in 0..EXTEND_RETRIES {
            let asset = self.get_asset(asset_id).await?;

            if asset.owner_id != actor.id && !actor.is_admin() {
                return Err(AppError::Forbidden(
                    "Only the owner may extend this asset".to_string(),
                ));
            }

            let cap = asset.content_type.max_extensions();
            let remaining = (cap - asset.extension_count).max(0);
            if remaining == 0 && !actor.is_admin() {
                return Err(AppError::ExtensionLimitReached { remaining: 0 });
            }

            let new_expires_at = (now + extension_window()).max(asset.expires_at);

            // Compare-and-swap on extension_count; a concurrent extend or
            // a sweep deletion makes this touch zero rows and we retry.
            let result = sqlx::query(
                "UPDATE media_asset
                 SET expires_at = ?1, extension_count = extension_count + 1,
                     last_extended_at = ?2, expired = 0
                 WHERE id = ?3 AND extension_count = ?4",
            )
            .bind(new_expires_at)
            .bind(now)
            .bind(asset_id)
            .bind(asset.extension_count)
            .execute(&self.db)
            .await?;

            if result.rows_affected() == 1 {
                let extension_count = asset.extension_count + 1;
                tracing::info!(
                    asset_id,
                    actor_id = %actor.id,
                    extension_count,
                    new_expires_at = %new_expires_at,
                    "Asset retention extended"
                );

                return Ok(ExtensionOutcome {
                    new_expires_at,
                    extension_count,
                    remaining: (cap - extension_count).max(0),
                });
            }
        }

        Err(AppError::Internal(format!(
            "Extension of asset {} kept losing races",
            asset_id
        )))
    }

    /// Delete an asset immediately, blob first
    pub async fn delete_asset(&self, asset_id: &str, actor: &Account) -> AppResult<()> {
        let asset = self.get_asset(asset_id).await?;

        if asset.owner_id != actor.id && !actor.is_admin() {
            return Err(AppError::Forbidden(
                "Only the owner may delete this asset".to_string(),
            ));
        }

        self.storage.remove(&asset.blob_key).await?;

        sqlx::query("DELETE FROM media_asset WHERE id = ?1")
            .bind(asset_id)
            .execute(&self.db)
            .await?;

        tracing::info!(asset_id, actor_id = %actor.id, "Asset deleted");

        Ok(())
    }

    /// Delete everything that expired at or before `now`
    ///
    /// Failures are isolated per asset: a blob delete error is counted and
    /// the record kept so the next pass retries it. Repeated runs over the
    /// same set are harmless.
    pub async fn sweep(&self, now: DateTime<Utc>) -> AppResult<SweepOutcome> {
        // Flag candidates first so partially deleted assets stay visible.
        sqlx::query("UPDATE media_asset SET expired = 1 WHERE expires_at <= ?1 AND expired = 0")
            .bind(now)
            .execute(&self.db)
            .await?;

        let sql = format!(
            "SELECT {} FROM media_asset WHERE expires_at <= ?1",
            MediaAsset::COLUMNS
        );
        let rows = sqlx::query(&sql).bind(now).fetch_all(&self.db).await?;
        let candidates: Vec<MediaAsset> = rows
            .iter()
            .map(MediaAsset::from_row)
            .collect::<AppResult<_>>()?;

        let mut outcome = SweepOutcome::default();

        for asset in candidates {
            if let Err(e) = self.storage.remove(&asset.blob_key).await {
                tracing::warn!(asset_id = %asset.id, error = %e, "Blob delete failed, keeping record for retry");
                outcome.error_count += 1;
                continue;
            }

            // The deadline is re-checked so an extension committed after
            // candidate selection keeps the record.
            let result = sqlx::query("DELETE FROM media_asset WHERE id = ?1 AND expires_at <= ?2")
                .bind(&asset.id)
                .bind(now)
                .execute(&self.db)
                .await?;

            if result.rows_affected() == 1 {
                outcome.deleted_count += 1;
            }
        }

        if outcome.deleted_count > 0 || outcome.error_count > 0 {
            tracing::info!(
                deleted = outcome.deleted_count,
                errors = outcome.error_count,
                "Retention sweep finished"
            );
        }

        Ok(outcome)
    }
}
