//! Storage block lifecycle and limit edits.
//!
//! Limit edits run inside one transaction that first locks the block row, so
//! the load read for the lowering check cannot change before the new limits
//! are written.

use super::{
    ServiceError, ServiceResult,
    capacity::{self, BlockLoad, Footprint, Headroom},
    ensure_positive, is_foreign_key_violation, trigger_error,
};
use crate::models::storage_block::{NewStorageBlock, StorageBlock, StorageBlockPatch};
use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// A block together with what is currently stored in it.
#[derive(Serialize, Debug)]
pub struct BlockUsage {
    pub block: StorageBlock,
    pub load: BlockLoad,
    pub headroom: Headroom,
}

#[derive(Clone)]
pub struct StorageBlockService {
    pub db: Arc<SqlitePool>,
}

fn validate_limits(max_weight: f64, max_size: f64, max_package: i64) -> ServiceResult<()> {
    ensure_positive("max_weight", max_weight)?;
    ensure_positive("max_size", max_size)?;
    ensure_positive("max_package", max_package as f64)
}

impl StorageBlockService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Create an empty block. All three limits must be positive.
    pub async fn create_block(&self, new: NewStorageBlock) -> ServiceResult<StorageBlock> {
        validate_limits(new.max_weight, new.max_size, new.max_package)?;

        let block = StorageBlock {
            id: Uuid::new_v4(),
            name: new.name,
            max_weight: new.max_weight,
            max_size: new.max_size,
            max_package: new.max_package,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO storage_blocks (id, name, max_weight, max_size, max_package, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(block.id)
        .bind(&block.name)
        .bind(block.max_weight)
        .bind(block.max_size)
        .bind(block.max_package)
        .bind(block.created_at)
        .execute(&*self.db)
        .await?;

        info!("created storage block {} ({})", block.id, block.name);
        Ok(block)
    }

    pub async fn get_block(&self, id: Uuid) -> ServiceResult<StorageBlock> {
        let mut conn = self.db.acquire().await?;
        capacity::fetch_block(&mut conn, id).await
    }

    pub async fn list_blocks(&self) -> ServiceResult<Vec<StorageBlock>> {
        let blocks = sqlx::query_as::<_, StorageBlock>(
            "SELECT id, name, max_weight, max_size, max_package, created_at
             FROM storage_blocks ORDER BY name ASC, id ASC",
        )
        .fetch_all(&*self.db)
        .await?;
        Ok(blocks)
    }

    /// Rename a block and/or change its limits.
    ///
    /// Lowering a limit below the block's current load fails with
    /// `LimitLoweringRejected` and leaves the stored block unchanged.
    pub async fn update_block(
        &self,
        id: Uuid,
        patch: StorageBlockPatch,
    ) -> ServiceResult<StorageBlock> {
        let mut tx = self.db.begin().await?;
        capacity::lock_block(&mut tx, id).await?;
        let current = capacity::fetch_block(&mut tx, id).await?;

        let max_weight = patch.max_weight.unwrap_or(current.max_weight);
        let max_size = patch.max_size.unwrap_or(current.max_size);
        let max_package = patch.max_package.unwrap_or(current.max_package);
        validate_limits(max_weight, max_size, max_package)?;

        if patch.touches_limits() {
            if let Some(dimension) =
                capacity::limit_lowering_violation(&mut tx, &current, &patch).await?
            {
                warn!(
                    "rejected lowering {} limit of storage block {}",
                    dimension, id
                );
                return Err(ServiceError::LimitLoweringRejected {
                    block_id: id,
                    dimension,
                });
            }
        }

        let name = patch.name.unwrap_or(current.name);
        let updated = sqlx::query_as::<_, StorageBlock>(
            "UPDATE storage_blocks
             SET name = ?, max_weight = ?, max_size = ?, max_package = ?
             WHERE id = ?
             RETURNING id, name, max_weight, max_size, max_package, created_at",
        )
        .bind(&name)
        .bind(max_weight)
        .bind(max_size)
        .bind(max_package)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| trigger_error(err, id))?;

        tx.commit().await?;
        info!(
            "updated storage block {} (weight {}, size {}, packages {})",
            id, updated.max_weight, updated.max_size, updated.max_package
        );
        Ok(updated)
    }

    /// Delete a block that holds no packages.
    pub async fn delete_block(&self, id: Uuid) -> ServiceResult<StorageBlock> {
        let deleted = sqlx::query_as::<_, StorageBlock>(
            "DELETE FROM storage_blocks WHERE id = ?
             RETURNING id, name, max_weight, max_size, max_package, created_at",
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await
        .map_err(|err| {
            if is_foreign_key_violation(&err) {
                ServiceError::Conflict(format!("storage block `{id}` still holds packages"))
            } else {
                ServiceError::Sqlx(err)
            }
        })?;

        let block = deleted.ok_or(ServiceError::NotFound {
            entity: "storage block",
            id,
        })?;
        info!("deleted storage block {}", id);
        Ok(block)
    }

    /// Current load and remaining headroom of a block.
    pub async fn block_load(&self, id: Uuid) -> ServiceResult<BlockUsage> {
        let mut conn = self.db.acquire().await?;
        let block = capacity::fetch_block(&mut conn, id).await?;
        let load = capacity::block_load(&mut conn, id, None).await?;
        let headroom = load.headroom(&block);
        Ok(BlockUsage {
            block,
            load,
            headroom,
        })
    }

    /// Block with the most headroom able to take `count` packages totalling
    /// `volume` and `weight`.
    pub async fn best_fit(
        &self,
        volume: f64,
        weight: f64,
        count: i64,
    ) -> ServiceResult<Option<StorageBlock>> {
        let mut conn = self.db.acquire().await?;
        capacity::find_block_within_limits(&mut conn, Footprint::new(volume, weight), count).await
    }
}
