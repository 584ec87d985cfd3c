//! HTTP handlers for the rate table.

use crate::{
    errors::AppError,
    models::package_rate::{NewPackageRate, PackageRate},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

/// POST `/package_rates`
pub async fn create_rate(
    State(state): State<AppState>,
    Json(new): Json<NewPackageRate>,
) -> Result<(StatusCode, Json<PackageRate>), AppError> {
    let rate = state.rates.create_rate(new).await?;
    Ok((StatusCode::CREATED, Json(rate)))
}

/// GET `/package_rates`
pub async fn list_rates(State(state): State<AppState>) -> Result<Json<Vec<PackageRate>>, AppError> {
    Ok(Json(state.rates.list_rates().await?))
}

/// GET `/package_rates/{id}`
pub async fn get_rate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PackageRate>, AppError> {
    Ok(Json(state.rates.get_rate(id).await?))
}

/// DELETE `/package_rates/{id}`, 409 while packages are billed against it.
pub async fn delete_rate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.rates.delete_rate(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
