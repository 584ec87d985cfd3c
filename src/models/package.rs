//! Represents a physical parcel and the payloads that create or modify one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Delivery state of a package.
#[derive(Serialize, Deserialize, sqlx::Type, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PackageStatus {
    #[default]
    Ordered,
    Delivering,
    Delivered,
    Cancelled,
    Missing,
}

/// A parcel, optionally placed in a storage block.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct Package {
    pub id: Uuid,

    /// Block the package is stored in. Unassigned packages count against no block.
    pub block_id: Option<Uuid>,

    /// Rate the package is billed against.
    pub package_rate_id: Uuid,

    pub description: String,

    pub status: PackageStatus,

    /// Dimensions in centimetres.
    pub width: f64,
    pub height: f64,
    pub length: f64,

    /// Weight in kilograms.
    pub weight: f64,

    pub is_fragile: bool,

    pub is_urgent: bool,

    /// Derived from the package rate when the package is created or re-rated.
    pub shipping_cost: f64,

    /// Cash-on-delivery amount collected from the recipient.
    pub cod_cost: f64,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Package {
    pub fn volume(&self) -> f64 {
        self.width * self.height * self.length
    }

    /// The attributes pricing and capacity checks look at.
    pub fn metrics(&self) -> PackageMetrics {
        PackageMetrics {
            width: self.width,
            height: self.height,
            length: self.length,
            weight: self.weight,
            is_fragile: self.is_fragile,
            is_urgent: self.is_urgent,
        }
    }
}

/// Physical attributes of a package, detached from its row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PackageMetrics {
    pub width: f64,
    pub height: f64,
    pub length: f64,
    pub weight: f64,
    pub is_fragile: bool,
    pub is_urgent: bool,
}

impl PackageMetrics {
    pub fn volume(&self) -> f64 {
        self.width * self.height * self.length
    }
}

/// Payload for creating a package.
#[derive(Deserialize, Clone, Debug)]
pub struct NewPackage {
    pub block_id: Option<Uuid>,

    /// Place the package in the best-fitting block when `block_id` is absent.
    #[serde(default)]
    pub auto_assign: bool,

    pub package_rate_id: Uuid,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub status: PackageStatus,

    pub width: f64,
    pub height: f64,
    pub length: f64,
    pub weight: f64,

    #[serde(default)]
    pub is_fragile: bool,

    #[serde(default)]
    pub is_urgent: bool,

    #[serde(default)]
    pub cod_cost: f64,
}

impl NewPackage {
    pub fn metrics(&self) -> PackageMetrics {
        PackageMetrics {
            width: self.width,
            height: self.height,
            length: self.length,
            weight: self.weight,
            is_fragile: self.is_fragile,
            is_urgent: self.is_urgent,
        }
    }
}

/// Partial update of a package. Absent fields keep their stored value.
///
/// `block_id` distinguishes "absent" (`None`), "explicit null" (`Some(None)`,
/// unassign) and "move" (`Some(Some(id))`).
#[derive(Deserialize, Clone, Debug, Default)]
pub struct PackagePatch {
    #[serde(default, deserialize_with = "present")]
    pub block_id: Option<Option<Uuid>>,
    pub package_rate_id: Option<Uuid>,
    pub description: Option<String>,
    pub status: Option<PackageStatus>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub length: Option<f64>,
    pub weight: Option<f64>,
    pub is_fragile: Option<bool>,
    pub is_urgent: Option<bool>,
    pub cod_cost: Option<f64>,
}

impl PackagePatch {
    /// True when the patch can change the package's footprint or placement.
    pub fn touches_capacity(&self) -> bool {
        self.block_id.is_some()
            || self.width.is_some()
            || self.height.is_some()
            || self.length.is_some()
            || self.weight.is_some()
    }

    /// Overlay this patch onto `package`, returning the resulting row.
    /// Derived fields (`shipping_cost`, timestamps) are not touched.
    pub fn apply_to(&self, package: &Package) -> Package {
        let mut merged = package.clone();
        if let Some(block_id) = self.block_id {
            merged.block_id = block_id;
        }
        if let Some(rate_id) = self.package_rate_id {
            merged.package_rate_id = rate_id;
        }
        if let Some(description) = &self.description {
            merged.description = description.clone();
        }
        if let Some(status) = self.status {
            merged.status = status;
        }
        merged.width = self.width.unwrap_or(package.width);
        merged.height = self.height.unwrap_or(package.height);
        merged.length = self.length.unwrap_or(package.length);
        merged.weight = self.weight.unwrap_or(package.weight);
        merged.is_fragile = self.is_fragile.unwrap_or(package.is_fragile);
        merged.is_urgent = self.is_urgent.unwrap_or(package.is_urgent);
        merged.cod_cost = self.cod_cost.unwrap_or(package.cod_cost);
        merged
    }
}

/// Marks a field as present even when its value is `null`.
fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}
