//! Creates, prices, places and moves packages.
//!
//! Every mutation runs in a single transaction whose first statement takes a
//! write lock (on the target block, or on the package row for updates), then
//! prices the package, checks the capacity ledger, writes the row and its
//! history entry. Any failure drops the transaction, which rolls back every
//! statement issued so far.

use super::{
    ServiceError, ServiceResult,
    capacity::{self, Footprint},
    ensure_non_negative, ensure_positive,
    package_rate_service::fetch_rate,
    pricing, trigger_error,
};
use crate::models::{
    package::{NewPackage, Package, PackagePatch, PackageStatus},
    package_history::PackageHistory,
};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const PACKAGE_COLUMNS: &str = "id, block_id, package_rate_id, description, status, \
     width, height, length, weight, is_fragile, is_urgent, shipping_cost, cod_cost, \
     created_at, updated_at";

pub const MAX_PAGE_SIZE: usize = 100;

/// Filters accepted by [`PackageService::list_packages`].
#[derive(Clone, Debug, Default)]
pub struct PackageFilter {
    pub block_id: Option<Uuid>,
    pub is_urgent: Option<bool>,
    pub is_fragile: Option<bool>,
    pub status: Option<PackageStatus>,
    pub min_weight: Option<f64>,
    pub max_weight: Option<f64>,
    /// Resume after this package id.
    pub after: Option<Uuid>,
    pub limit: usize,
}

#[derive(Debug)]
pub struct PackagePage {
    pub packages: Vec<Package>,
    /// Id to resume from when more rows remain.
    pub next_after: Option<Uuid>,
}

#[derive(Clone)]
pub struct PackageService {
    pub db: Arc<SqlitePool>,
}

fn validate_new(new: &NewPackage) -> ServiceResult<()> {
    ensure_positive("width", new.width)?;
    ensure_positive("height", new.height)?;
    ensure_positive("length", new.length)?;
    ensure_positive("weight", new.weight)?;
    ensure_non_negative("cod_cost", new.cod_cost)
}

fn validate_patch(patch: &PackagePatch) -> ServiceResult<()> {
    let metrics = [
        ("width", patch.width),
        ("height", patch.height),
        ("length", patch.length),
        ("weight", patch.weight),
    ];
    for (field, value) in metrics {
        if let Some(value) = value {
            ensure_positive(field, value)?;
        }
    }
    if let Some(cod_cost) = patch.cod_cost {
        ensure_non_negative("cod_cost", cod_cost)?;
    }
    Ok(())
}

fn describe_block(block_id: Option<Uuid>) -> String {
    block_id.map_or_else(|| "unassigned".to_string(), |id| format!("block {id}"))
}

/// Map a failed package write; trigger aborts only happen when a block is set.
fn write_error(err: sqlx::Error, block_id: Option<Uuid>) -> ServiceError {
    match block_id {
        Some(block_id) => trigger_error(err, block_id),
        None => ServiceError::Sqlx(err),
    }
}

impl PackageService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Price a new package and, when a block is given (or auto-assignment is
    /// requested), place it there.
    pub async fn create_package(&self, new: NewPackage) -> ServiceResult<Package> {
        validate_new(&new)?;
        let metrics = new.metrics();
        let footprint = Footprint::new(metrics.volume(), metrics.weight);

        let mut tx = self.db.begin().await?;

        let block_id = match new.block_id {
            Some(block_id) => {
                capacity::lock_block(&mut tx, block_id).await?;
                Some(block_id)
            }
            None if new.auto_assign => {
                lock_all_blocks(&mut tx).await?;
                let found = capacity::find_block_within_limits(&mut tx, footprint, 1).await?;
                if found.is_none() {
                    info!("no storage block can take {:?}; leaving package unassigned", footprint);
                }
                found.map(|block| block.id)
            }
            None => None,
        };

        let rate = fetch_rate(&mut tx, new.package_rate_id).await?;
        let shipping_cost = pricing::compute_price(&metrics, &rate);

        if let Some(block_id) = block_id {
            if let Err(err) = capacity::check_placement(&mut tx, footprint, block_id, None).await {
                warn!("rejected new package for block {}: {}", block_id, err);
                return Err(err);
            }
        }

        let now = Utc::now();
        let package = sqlx::query_as::<_, Package>(&format!(
            "INSERT INTO packages ({PACKAGE_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {PACKAGE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(block_id)
        .bind(new.package_rate_id)
        .bind(&new.description)
        .bind(new.status)
        .bind(new.width)
        .bind(new.height)
        .bind(new.length)
        .bind(new.weight)
        .bind(new.is_fragile)
        .bind(new.is_urgent)
        .bind(shipping_cost)
        .bind(new.cod_cost)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| write_error(err, block_id))?;

        record_history(
            &mut tx,
            package.id,
            "CREATED",
            &format!(
                "priced at {} with rate {}; {}",
                shipping_cost,
                rate.id,
                describe_block(block_id)
            ),
        )
        .await?;

        tx.commit().await?;
        info!(
            "created package {} ({}, shipping {})",
            package.id,
            describe_block(package.block_id),
            package.shipping_cost
        );
        Ok(package)
    }

    pub async fn get_package(&self, id: Uuid) -> ServiceResult<Package> {
        let mut conn = self.db.acquire().await?;
        fetch_package(&mut conn, id).await
    }

    /// Filtered page of packages, ordered by id.
    pub async fn list_packages(&self, filter: PackageFilter) -> ServiceResult<PackagePage> {
        let limit = filter.limit.clamp(1, MAX_PAGE_SIZE);
        let fetch_limit = limit + 1;

        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {PACKAGE_COLUMNS} FROM packages WHERE 1 = 1"
        ));
        if let Some(block_id) = filter.block_id {
            builder.push(" AND block_id = ");
            builder.push_bind(block_id);
        }
        if let Some(is_urgent) = filter.is_urgent {
            builder.push(" AND is_urgent = ");
            builder.push_bind(is_urgent);
        }
        if let Some(is_fragile) = filter.is_fragile {
            builder.push(" AND is_fragile = ");
            builder.push_bind(is_fragile);
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ");
            builder.push_bind(status);
        }
        if let Some(min_weight) = filter.min_weight {
            builder.push(" AND weight >= ");
            builder.push_bind(min_weight);
        }
        if let Some(max_weight) = filter.max_weight {
            builder.push(" AND weight <= ");
            builder.push_bind(max_weight);
        }
        if let Some(after) = filter.after {
            builder.push(" AND id > ");
            builder.push_bind(after);
        }
        builder.push(" ORDER BY id ASC LIMIT ");
        builder.push_bind(fetch_limit as i64);

        let mut packages: Vec<Package> = builder.build_query_as().fetch_all(&*self.db).await?;

        let mut next_after = None;
        if packages.len() == fetch_limit {
            packages.pop();
            next_after = packages.last().map(|package| package.id);
        }

        Ok(PackagePage {
            packages,
            next_after,
        })
    }

    /// Apply `patch` to a package.
    ///
    /// A change to the block, a dimension or the weight re-checks the target
    /// block with the package's own prior contribution excluded. Only a change
    /// of rate re-prices the package.
    pub async fn update_package(&self, id: Uuid, patch: PackagePatch) -> ServiceResult<Package> {
        validate_patch(&patch)?;

        let mut tx = self.db.begin().await?;
        lock_package(&mut tx, id).await?;
        let current = fetch_package(&mut tx, id).await?;
        let mut merged = patch.apply_to(&current);

        if patch.touches_capacity() {
            if let Some(block_id) = merged.block_id {
                capacity::lock_block(&mut tx, block_id).await?;
                let footprint = Footprint::new(merged.volume(), merged.weight);
                if let Err(err) =
                    capacity::check_placement(&mut tx, footprint, block_id, Some(id)).await
                {
                    warn!("rejected update of package {}: {}", id, err);
                    return Err(err);
                }
            }
        }

        let repriced = merged.package_rate_id != current.package_rate_id;
        if repriced {
            let rate = fetch_rate(&mut tx, merged.package_rate_id).await?;
            merged.shipping_cost = pricing::compute_price(&merged.metrics(), &rate);
            debug!(
                "re-priced package {} from {} to {}",
                id, current.shipping_cost, merged.shipping_cost
            );
        }

        let updated = sqlx::query_as::<_, Package>(&format!(
            "UPDATE packages
             SET block_id = ?, package_rate_id = ?, description = ?, status = ?,
                 width = ?, height = ?, length = ?, weight = ?,
                 is_fragile = ?, is_urgent = ?, shipping_cost = ?, cod_cost = ?,
                 updated_at = ?
             WHERE id = ?
             RETURNING {PACKAGE_COLUMNS}"
        ))
        .bind(merged.block_id)
        .bind(merged.package_rate_id)
        .bind(&merged.description)
        .bind(merged.status)
        .bind(merged.width)
        .bind(merged.height)
        .bind(merged.length)
        .bind(merged.weight)
        .bind(merged.is_fragile)
        .bind(merged.is_urgent)
        .bind(merged.shipping_cost)
        .bind(merged.cod_cost)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| write_error(err, merged.block_id))?;

        let (action, notes) = if updated.block_id != current.block_id {
            (
                "MOVED",
                format!(
                    "{} -> {}",
                    describe_block(current.block_id),
                    describe_block(updated.block_id)
                ),
            )
        } else if repriced {
            (
                "REPRICED",
                format!(
                    "rate {} -> {}; shipping {} -> {}",
                    current.package_rate_id,
                    updated.package_rate_id,
                    current.shipping_cost,
                    updated.shipping_cost
                ),
            )
        } else {
            ("UPDATED", String::new())
        };
        record_history(&mut tx, id, action, &notes).await?;

        tx.commit().await?;
        info!("updated package {} ({})", id, action);
        Ok(updated)
    }

    /// Delete a package together with its history.
    pub async fn delete_package(&self, id: Uuid) -> ServiceResult<Package> {
        let deleted = sqlx::query_as::<_, Package>(&format!(
            "DELETE FROM packages WHERE id = ? RETURNING {PACKAGE_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(ServiceError::NotFound {
            entity: "package",
            id,
        })?;

        info!("deleted package {}", id);
        Ok(deleted)
    }

    /// History of a package, newest first.
    pub async fn package_history(&self, id: Uuid) -> ServiceResult<Vec<PackageHistory>> {
        let mut conn = self.db.acquire().await?;
        fetch_package(&mut conn, id).await?;

        let entries = sqlx::query_as::<_, PackageHistory>(
            "SELECT id, package_id, action, notes, timestamp
             FROM package_history
             WHERE package_id = ?
             ORDER BY timestamp DESC, rowid DESC",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(entries)
    }
}

async fn fetch_package(conn: &mut SqliteConnection, id: Uuid) -> ServiceResult<Package> {
    sqlx::query_as::<_, Package>(&format!(
        "SELECT {PACKAGE_COLUMNS} FROM packages WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(ServiceError::NotFound {
        entity: "package",
        id,
    })
}

/// Write-lock a package row for the rest of the transaction.
async fn lock_package(conn: &mut SqliteConnection, id: Uuid) -> ServiceResult<()> {
    let result = sqlx::query("UPDATE packages SET updated_at = updated_at WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ServiceError::NotFound {
            entity: "package",
            id,
        });
    }
    Ok(())
}

/// Write-lock every block; auto-assignment may pick any of them.
async fn lock_all_blocks(conn: &mut SqliteConnection) -> ServiceResult<()> {
    sqlx::query("UPDATE storage_blocks SET name = name")
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn record_history(
    conn: &mut SqliteConnection,
    package_id: Uuid,
    action: &str,
    notes: &str,
) -> ServiceResult<()> {
    sqlx::query(
        "INSERT INTO package_history (id, package_id, action, notes, timestamp)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4())
    .bind(package_id)
    .bind(action)
    .bind(notes)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    Ok(())
}
