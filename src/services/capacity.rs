//! Capacity ledger for storage blocks.
//!
//! Every function here takes the caller's connection so that the aggregate
//! read, the check and the write that follows all run in one transaction.
//! The schema triggers enforce the same limits on write; these checks exist to
//! produce a typed error before the database has to abort.

use super::{CapacityDimension, ServiceError, ServiceResult, ensure_positive};
use crate::models::{storage_block::StorageBlock, storage_block::StorageBlockPatch};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

/// Slack allowed on weight and volume comparisons, so decimal sums that land
/// exactly on a limit (1.1 + 2.2 against 3.3) still fit. Must match the
/// `1e-6` in the schema triggers.
pub const CAPACITY_TOLERANCE: f64 = 1e-6;

/// Volume and weight a package contributes to its block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Footprint {
    pub volume: f64,
    pub weight: f64,
}

impl Footprint {
    pub fn new(volume: f64, weight: f64) -> Self {
        Self { volume, weight }
    }

    fn validate(&self) -> ServiceResult<()> {
        ensure_positive("volume", self.volume)?;
        ensure_positive("weight", self.weight)
    }
}

/// Aggregate load of the packages assigned to one block.
#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct BlockLoad {
    pub weight: f64,
    pub volume: f64,
    pub count: i64,
}

/// Remaining room in a block.
#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct Headroom {
    pub weight: f64,
    pub volume: f64,
    pub count: i64,
}

impl BlockLoad {
    /// First limit of `block` broken by adding `count` packages that together
    /// occupy `footprint`. Checked in weight, volume, count order.
    pub fn first_violation(
        &self,
        block: &StorageBlock,
        footprint: Footprint,
        count: i64,
    ) -> Option<CapacityDimension> {
        if self.weight + footprint.weight > block.max_weight + CAPACITY_TOLERANCE {
            Some(CapacityDimension::Weight)
        } else if self.volume + footprint.volume > block.max_size + CAPACITY_TOLERANCE {
            Some(CapacityDimension::Volume)
        } else if self.count + count > block.max_package {
            Some(CapacityDimension::Count)
        } else {
            None
        }
    }

    pub fn headroom(&self, block: &StorageBlock) -> Headroom {
        Headroom {
            weight: block.max_weight - self.weight,
            volume: block.max_size - self.volume,
            count: block.max_package - self.count,
        }
    }
}

/// Fetch a block by id.
pub async fn fetch_block(conn: &mut SqliteConnection, block_id: Uuid) -> ServiceResult<StorageBlock> {
    sqlx::query_as::<_, StorageBlock>(
        "SELECT id, name, max_weight, max_size, max_package, created_at
         FROM storage_blocks WHERE id = ?",
    )
    .bind(block_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(ServiceError::NotFound {
        entity: "storage block",
        id: block_id,
    })
}

/// Take the write lock for `block_id` for the rest of the transaction.
///
/// Issues a no-op update on the block row, so concurrent writers to the same
/// block queue here instead of interleaving their read-check-write sequences.
pub async fn lock_block(conn: &mut SqliteConnection, block_id: Uuid) -> ServiceResult<()> {
    let result = sqlx::query("UPDATE storage_blocks SET name = name WHERE id = ?")
        .bind(block_id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ServiceError::NotFound {
            entity: "storage block",
            id: block_id,
        });
    }
    Ok(())
}

/// Aggregate load of `block_id`, leaving out `exclude` when given.
pub async fn block_load(
    conn: &mut SqliteConnection,
    block_id: Uuid,
    exclude: Option<Uuid>,
) -> ServiceResult<BlockLoad> {
    let (weight, volume, count) = sqlx::query_as::<_, (f64, f64, i64)>(
        "SELECT TOTAL(weight), TOTAL(width * height * length), COUNT(*)
         FROM packages
         WHERE block_id = ? AND (? IS NULL OR id != ?)",
    )
    .bind(block_id)
    .bind(exclude)
    .bind(exclude)
    .fetch_one(&mut *conn)
    .await?;

    Ok(BlockLoad {
        weight,
        volume,
        count,
    })
}

pub async fn sum_volume(conn: &mut SqliteConnection, block_id: Uuid) -> ServiceResult<f64> {
    Ok(block_load(conn, block_id, None).await?.volume)
}

pub async fn sum_weight(conn: &mut SqliteConnection, block_id: Uuid) -> ServiceResult<f64> {
    Ok(block_load(conn, block_id, None).await?.weight)
}

pub async fn count(conn: &mut SqliteConnection, block_id: Uuid) -> ServiceResult<i64> {
    Ok(block_load(conn, block_id, None).await?.count)
}

/// Which limit of `block_id` placing `footprint` would break, if any.
///
/// `exclude` names a package already counted in the block that is being
/// re-measured; its current contribution is taken out of the aggregate before
/// the candidate is added, so a package never competes with itself.
pub async fn placement_violation(
    conn: &mut SqliteConnection,
    footprint: Footprint,
    block_id: Uuid,
    exclude: Option<Uuid>,
) -> ServiceResult<Option<CapacityDimension>> {
    footprint.validate()?;
    let block = fetch_block(conn, block_id).await?;
    let load = block_load(conn, block_id, exclude).await?;
    debug!(
        "block {} load {:?} candidate {:?} (excluding {:?})",
        block_id, load, footprint, exclude
    );
    Ok(load.first_violation(&block, footprint, 1))
}

/// True when placing `footprint` in `block_id` would break one of its limits.
pub async fn would_exceed_limit(
    conn: &mut SqliteConnection,
    footprint: Footprint,
    block_id: Uuid,
    exclude: Option<Uuid>,
) -> ServiceResult<bool> {
    Ok(placement_violation(conn, footprint, block_id, exclude)
        .await?
        .is_some())
}

/// Like [`would_exceed_limit`], but fails with `CapacityExceeded` naming the
/// broken limit.
pub async fn check_placement(
    conn: &mut SqliteConnection,
    footprint: Footprint,
    block_id: Uuid,
    exclude: Option<Uuid>,
) -> ServiceResult<()> {
    match placement_violation(conn, footprint, block_id, exclude).await? {
        Some(dimension) => Err(ServiceError::CapacityExceeded {
            block_id,
            dimension,
        }),
        None => Ok(()),
    }
}

/// First limit in `patch` that would drop below the current load of `block`.
/// Raising a limit, or leaving it unchanged, never fails.
pub async fn limit_lowering_violation(
    conn: &mut SqliteConnection,
    block: &StorageBlock,
    patch: &StorageBlockPatch,
) -> ServiceResult<Option<CapacityDimension>> {
    let load = block_load(conn, block.id, None).await?;

    if let Some(max_weight) = patch.max_weight {
        if max_weight < block.max_weight && load.weight > max_weight + CAPACITY_TOLERANCE {
            return Ok(Some(CapacityDimension::Weight));
        }
    }
    if let Some(max_size) = patch.max_size {
        if max_size < block.max_size && load.volume > max_size + CAPACITY_TOLERANCE {
            return Ok(Some(CapacityDimension::Volume));
        }
    }
    if let Some(max_package) = patch.max_package {
        if max_package < block.max_package && load.count > max_package {
            return Ok(Some(CapacityDimension::Count));
        }
    }
    Ok(None)
}

/// Block with the most room left that can take `count` packages totalling
/// `footprint`.
///
/// Candidates are ordered by remaining weight headroom, then remaining volume
/// headroom, both descending.
pub async fn find_block_within_limits(
    conn: &mut SqliteConnection,
    footprint: Footprint,
    count: i64,
) -> ServiceResult<Option<StorageBlock>> {
    footprint.validate()?;
    if count <= 0 {
        return Err(ServiceError::InvalidMetric {
            field: "count",
            value: count as f64,
            reason: "must be a positive number",
        });
    }

    let block = sqlx::query_as::<_, StorageBlock>(
        "SELECT b.id, b.name, b.max_weight, b.max_size, b.max_package, b.created_at
         FROM storage_blocks b
         LEFT JOIN (
             SELECT block_id,
                    TOTAL(weight) AS weight,
                    TOTAL(width * height * length) AS volume,
                    COUNT(*) AS count
             FROM packages
             WHERE block_id IS NOT NULL
             GROUP BY block_id
         ) agg ON agg.block_id = b.id
         WHERE COALESCE(agg.count, 0) + ? <= b.max_package
           AND COALESCE(agg.weight, 0.0) + ? <= b.max_weight + ?
           AND COALESCE(agg.volume, 0.0) + ? <= b.max_size + ?
         ORDER BY b.max_weight - COALESCE(agg.weight, 0.0) DESC,
                  b.max_size - COALESCE(agg.volume, 0.0) DESC
         LIMIT 1",
    )
    .bind(count)
    .bind(footprint.weight)
    .bind(CAPACITY_TOLERANCE)
    .bind(footprint.volume)
    .bind(CAPACITY_TOLERANCE)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(block)
}
