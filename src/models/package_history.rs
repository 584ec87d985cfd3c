//! Audit trail entries written alongside package mutations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct PackageHistory {
    pub id: Uuid,

    pub package_id: Uuid,

    /// One of `CREATED`, `MOVED`, `REPRICED`, `UPDATED`.
    pub action: String,

    pub notes: String,

    pub timestamp: DateTime<Utc>,
}
