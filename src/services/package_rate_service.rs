//! The rate table packages are priced against.

use super::{ServiceError, ServiceResult, ensure_non_negative, is_foreign_key_violation};
use crate::models::package_rate::{NewPackageRate, PackageRate};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const RATE_COLUMNS: &str = "id, name, base_rate, base_weight, oversize_rate, \
     overweight_rate_per_kg, fragile_rate, urgent_rate, created_at";

#[derive(Clone)]
pub struct PackageRateService {
    pub db: Arc<SqlitePool>,
}

impl PackageRateService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Insert a new rate. Every amount must be finite and non-negative.
    pub async fn create_rate(&self, new: NewPackageRate) -> ServiceResult<PackageRate> {
        ensure_non_negative("base_rate", new.base_rate)?;
        ensure_non_negative("base_weight", new.base_weight)?;
        ensure_non_negative("oversize_rate", new.oversize_rate)?;
        ensure_non_negative("overweight_rate_per_kg", new.overweight_rate_per_kg)?;
        ensure_non_negative("fragile_rate", new.fragile_rate)?;
        ensure_non_negative("urgent_rate", new.urgent_rate)?;

        let rate = sqlx::query_as::<_, PackageRate>(&format!(
            "INSERT INTO package_rates ({RATE_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {RATE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(new.base_rate)
        .bind(new.base_weight)
        .bind(new.oversize_rate)
        .bind(new.overweight_rate_per_kg)
        .bind(new.fragile_rate)
        .bind(new.urgent_rate)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?;

        info!("created package rate {} ({})", rate.id, rate.name);
        Ok(rate)
    }

    pub async fn get_rate(&self, id: Uuid) -> ServiceResult<PackageRate> {
        let mut conn = self.db.acquire().await?;
        fetch_rate(&mut conn, id).await
    }

    pub async fn list_rates(&self) -> ServiceResult<Vec<PackageRate>> {
        let rates = sqlx::query_as::<_, PackageRate>(&format!(
            "SELECT {RATE_COLUMNS} FROM package_rates ORDER BY name ASC, id ASC"
        ))
        .fetch_all(&*self.db)
        .await?;
        Ok(rates)
    }

    /// Delete a rate no package is billed against.
    pub async fn delete_rate(&self, id: Uuid) -> ServiceResult<PackageRate> {
        let deleted = sqlx::query_as::<_, PackageRate>(&format!(
            "DELETE FROM package_rates WHERE id = ? RETURNING {RATE_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&*self.db)
        .await
        .map_err(|err| {
            if is_foreign_key_violation(&err) {
                ServiceError::Conflict(format!("package rate `{id}` is still in use"))
            } else {
                ServiceError::Sqlx(err)
            }
        })?;

        let rate = deleted.ok_or(ServiceError::NotFound {
            entity: "package rate",
            id,
        })?;
        info!("deleted package rate {}", id);
        Ok(rate)
    }
}

/// Resolve a rate on the caller's connection.
pub async fn fetch_rate(conn: &mut SqliteConnection, id: Uuid) -> ServiceResult<PackageRate> {
    sqlx::query_as::<_, PackageRate>(&format!(
        "SELECT {RATE_COLUMNS} FROM package_rates WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(ServiceError::NotFound {
        entity: "package rate",
        id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::memory_pool, test_support};

    fn new_rate() -> NewPackageRate {
        NewPackageRate {
            name: "express".into(),
            base_rate: 21_000.0,
            base_weight: 2.0,
            oversize_rate: 10_000.0,
            overweight_rate_per_kg: 5_000.0,
            fragile_rate: 15_000.0,
            urgent_rate: 20_000.0,
        }
    }

    #[tokio::test]
    async fn create_then_get_returns_same_row() {
        let service = PackageRateService::new(Arc::new(memory_pool().await));
        let created = service.create_rate(new_rate()).await.unwrap();
        let fetched = service.get_rate(created.id).await.unwrap();
        assert_eq!(created, fetched);
        assert_eq!(service.list_rates().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn negative_amount_is_rejected() {
        let service = PackageRateService::new(Arc::new(memory_pool().await));
        let err = service
            .create_rate(NewPackageRate {
                fragile_rate: -1.0,
                ..new_rate()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidMetric { field: "fragile_rate", .. }));
        assert!(service.list_rates().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_rate_is_not_found() {
        let service = PackageRateService::new(Arc::new(memory_pool().await));
        assert!(matches!(
            service.get_rate(Uuid::new_v4()).await,
            Err(ServiceError::NotFound { entity: "package rate", .. })
        ));
        assert!(matches!(
            service.delete_rate(Uuid::new_v4()).await,
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn rate_in_use_cannot_be_deleted() {
        let pool = Arc::new(memory_pool().await);
        let service = PackageRateService::new(pool.clone());
        let rate = {
            let mut conn = pool.acquire().await.unwrap();
            let rate = test_support::insert_rate(&mut conn).await;
            test_support::insert_package(&mut conn, None, rate.id, (1.0, 1.0, 1.0), 1.0).await;
            rate
        };

        assert!(matches!(
            service.delete_rate(rate.id).await,
            Err(ServiceError::Conflict(_))
        ));
        assert!(service.get_rate(rate.id).await.is_ok());
    }
}
