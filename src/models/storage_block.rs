//! Represents a storage block: a capacity-limited compartment in the warehouse.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A physical storage compartment.
///
/// The sum of weights and volumes of all packages assigned to a block, and the
/// number of those packages, never exceed the block's limits.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct StorageBlock {
    /// Unique identifier for this block.
    pub id: Uuid,

    /// Human-readable label (e.g. "storage_block_7").
    pub name: String,

    /// Maximum total weight in kilograms.
    pub max_weight: f64,

    /// Maximum total volume in cubic centimetres.
    pub max_size: f64,

    /// Maximum number of packages.
    pub max_package: i64,

    /// When this block was created.
    pub created_at: DateTime<Utc>,
}

/// Payload for creating a block.
#[derive(Deserialize, Clone, Debug)]
pub struct NewStorageBlock {
    pub name: String,
    pub max_weight: f64,
    pub max_size: f64,
    pub max_package: i64,
}

/// Partial update of a block. Absent fields are left untouched.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct StorageBlockPatch {
    pub name: Option<String>,
    pub max_weight: Option<f64>,
    pub max_size: Option<f64>,
    pub max_package: Option<i64>,
}

impl StorageBlockPatch {
    pub fn touches_limits(&self) -> bool {
        self.max_weight.is_some() || self.max_size.is_some() || self.max_package.is_some()
    }
}
