use crate::services::{
    package_rate_service::PackageRateService, package_service::PackageService,
    storage_block_service::StorageBlockService,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared router state: one pool, one handle per service.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub rates: PackageRateService,
    pub blocks: StorageBlockService,
    pub packages: PackageService,
}

impl AppState {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self {
            rates: PackageRateService::new(db.clone()),
            blocks: StorageBlockService::new(db.clone()),
            packages: PackageService::new(db.clone()),
            db,
        }
    }
}
