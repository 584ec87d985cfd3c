//! Row fixtures for tests. Inserts go straight to SQL so service tests can
//! set up state without going through the code under test.

use crate::models::{package::Package, package_rate::PackageRate, storage_block::StorageBlock};
use chrono::Utc;
use sqlx::SqliteConnection;
use uuid::Uuid;

pub async fn insert_block(
    conn: &mut SqliteConnection,
    max_weight: f64,
    max_size: f64,
    max_package: i64,
) -> StorageBlock {
    let block = StorageBlock {
        id: Uuid::new_v4(),
        name: format!("block-{}", &Uuid::new_v4().to_string()[..8]),
        max_weight,
        max_size,
        max_package,
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
    .execute(&mut *conn)
    .await
    .unwrap();
    block
}

/// base 10000, base weight 5 kg, oversize 8000, 2000/kg, fragile 5000, urgent 6000.
pub async fn insert_rate(conn: &mut SqliteConnection) -> PackageRate {
    let rate = PackageRate {
        id: Uuid::new_v4(),
        name: "standard".into(),
        base_rate: 10_000.0,
        base_weight: 5.0,
        oversize_rate: 8_000.0,
        overweight_rate_per_kg: 2_000.0,
        fragile_rate: 5_000.0,
        urgent_rate: 6_000.0,
        created_at: Utc::now(),
    };
    sqlx::query(
        "INSERT INTO package_rates (id, name, base_rate, base_weight, oversize_rate,
                                    overweight_rate_per_kg, fragile_rate, urgent_rate, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(rate.id)
    .bind(&rate.name)
    .bind(rate.base_rate)
    .bind(rate.base_weight)
    .bind(rate.oversize_rate)
    .bind(rate.overweight_rate_per_kg)
    .bind(rate.fragile_rate)
    .bind(rate.urgent_rate)
    .bind(rate.created_at)
    .execute(&mut *conn)
    .await
    .unwrap();
    rate
}

pub async fn insert_package(
    conn: &mut SqliteConnection,
    block_id: Option<Uuid>,
    package_rate_id: Uuid,
    (width, height, length): (f64, f64, f64),
    weight: f64,
) -> Package {
    try_insert_package(conn, block_id, package_rate_id, (width, height, length), weight)
        .await
        .unwrap()
}

/// Raw insert that surfaces the database error, for exercising the triggers.
pub async fn try_insert_package(
    conn: &mut SqliteConnection,
    block_id: Option<Uuid>,
    package_rate_id: Uuid,
    (width, height, length): (f64, f64, f64),
    weight: f64,
) -> Result<Package, sqlx::Error> {
    let now = Utc::now();
    sqlx::query_as::<_, Package>(
        "INSERT INTO packages (id, block_id, package_rate_id, description, status,
                               width, height, length, weight, is_fragile, is_urgent,
                               shipping_cost, cod_cost, created_at, updated_at)
         VALUES (?, ?, ?, '', 'ORDERED', ?, ?, ?, ?, 0, 0, 0, 0, ?, ?)
         RETURNING id, block_id, package_rate_id, description, status, width, height,
                   length, weight, is_fragile, is_urgent, shipping_cost, cod_cost,
                   created_at, updated_at",
    )
    .bind(Uuid::new_v4())
    .bind(block_id)
    .bind(package_rate_id)
    .bind(width)
    .bind(height)
    .bind(length)
    .bind(weight)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
}
