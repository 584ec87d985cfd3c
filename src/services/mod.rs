//! Domain services and the error type they share.
//!
//! `pricing` and `capacity` hold the rules; the `*_service` modules own the
//! transactions that apply them.

pub mod capacity;
pub mod package_rate_service;
pub mod package_service;
pub mod pricing;
pub mod storage_block_service;

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// A storage block limit.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CapacityDimension {
    Weight,
    Volume,
    Count,
}

impl CapacityDimension {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "weight" => Some(Self::Weight),
            "volume" => Some(Self::Volume),
            "count" => Some(Self::Count),
            _ => None,
        }
    }
}

impl fmt::Display for CapacityDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Weight => "weight",
            Self::Volume => "volume",
            Self::Count => "count",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("storage block `{block_id}` would exceed its {dimension} limit")]
    CapacityExceeded {
        block_id: Uuid,
        dimension: CapacityDimension,
    },
    #[error("storage block `{block_id}` {dimension} limit cannot be lowered below its current load")]
    LimitLoweringRejected {
        block_id: Uuid,
        dimension: CapacityDimension,
    },
    #[error("invalid {field} `{value}`: {reason}")]
    InvalidMetric {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Abort messages raised by the schema triggers; see `migrations/0001_init.sql`.
const CAPACITY_ABORT: &str = "storage block capacity exceeded:";
const LOWERING_ABORT: &str = "storage block limit lowering rejected:";

/// Translate a trigger abort on `block_id` back into its typed error.
/// Anything else passes through as `Sqlx`.
pub(crate) fn trigger_error(err: sqlx::Error, block_id: Uuid) -> ServiceError {
    if let sqlx::Error::Database(db_err) = &err {
        let message = db_err.message();
        if let Some(rest) = message.strip_prefix(CAPACITY_ABORT) {
            if let Some(dimension) = CapacityDimension::parse(rest) {
                return ServiceError::CapacityExceeded {
                    block_id,
                    dimension,
                };
            }
        }
        if let Some(rest) = message.strip_prefix(LOWERING_ABORT) {
            if let Some(dimension) = CapacityDimension::parse(rest) {
                return ServiceError::LimitLoweringRejected {
                    block_id,
                    dimension,
                };
            }
        }
    }
    ServiceError::Sqlx(err)
}

/// Return true if SQLx error indicates a foreign key constraint violation.
pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("foreign key")
    )
}

/// Reject zero, negative and non-finite physical measurements.
pub(crate) fn ensure_positive(field: &'static str, value: f64) -> ServiceResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ServiceError::InvalidMetric {
            field,
            value,
            reason: "must be a positive number",
        })
    }
}

/// Reject negative and non-finite amounts of money.
pub(crate) fn ensure_non_negative(field: &'static str, value: f64) -> ServiceResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ServiceError::InvalidMetric {
            field,
            value,
            reason: "must be zero or greater",
        })
    }
}
