//! Represents a pricing tier that packages are billed against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A named row of the rate table.
///
/// Rates are reference data: packages point at a rate but never own it, and a
/// rate is not edited once created.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct PackageRate {
    pub id: Uuid,

    pub name: String,

    /// Fixed cost charged for every package.
    pub base_rate: f64,

    /// Weight (kg) included in the base rate.
    pub base_weight: f64,

    /// Flat surcharge for packages above the oversize threshold.
    pub oversize_rate: f64,

    /// Surcharge per whole kilogram above `base_weight`.
    pub overweight_rate_per_kg: f64,

    pub fragile_rate: f64,

    pub urgent_rate: f64,

    pub created_at: DateTime<Utc>,
}

/// Payload for creating a rate.
#[derive(Deserialize, Clone, Debug)]
pub struct NewPackageRate {
    pub name: String,
    pub base_rate: f64,
    pub base_weight: f64,
    pub oversize_rate: f64,
    pub overweight_rate_per_kg: f64,
    pub fragile_rate: f64,
    pub urgent_rate: f64,
}
