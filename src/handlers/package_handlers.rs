//! HTTP handlers for packages and their history.

use crate::{
    errors::AppError,
    models::{
        package::{NewPackage, Package, PackagePatch, PackageStatus},
        package_history::PackageHistory,
    },
    services::package_service::PackageFilter,
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_PAGE_SIZE: usize = 50;

/// Query params accepted by `GET /packages`.
#[derive(Debug, Default, Deserialize)]
pub struct ListPackagesQuery {
    pub block_id: Option<Uuid>,
    pub is_urgent: Option<bool>,
    pub is_fragile: Option<bool>,
    pub status: Option<PackageStatus>,
    pub min_weight: Option<f64>,
    pub max_weight: Option<f64>,
    pub limit: Option<usize>,
    pub continuation_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListPackagesResponse {
    pub packages: Vec<Package>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

/// POST `/packages`
pub async fn create_package(
    State(state): State<AppState>,
    Json(new): Json<NewPackage>,
) -> Result<(StatusCode, Json<Package>), AppError> {
    let package = state.packages.create_package(new).await?;
    Ok((StatusCode::CREATED, Json(package)))
}

/// GET `/packages`
pub async fn list_packages(
    State(state): State<AppState>,
    Query(q): Query<ListPackagesQuery>,
) -> Result<Json<ListPackagesResponse>, AppError> {
    let after = q
        .continuation_token
        .as_deref()
        .map(decode_continuation_token)
        .transpose()?;

    let page = state
        .packages
        .list_packages(PackageFilter {
            block_id: q.block_id,
            is_urgent: q.is_urgent,
            is_fragile: q.is_fragile,
            status: q.status,
            min_weight: q.min_weight,
            max_weight: q.max_weight,
            after,
            limit: q.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        })
        .await?;

    Ok(Json(ListPackagesResponse {
        is_truncated: page.next_after.is_some(),
        next_continuation_token: page.next_after.map(encode_continuation_token),
        packages: page.packages,
    }))
}

/// GET `/packages/{id}`
pub async fn get_package(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Package>, AppError> {
    Ok(Json(state.packages.get_package(id).await?))
}

/// PATCH `/packages/{id}`: `"block_id": null` unassigns, absent keeps.
pub async fn update_package(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<PackagePatch>,
) -> Result<Json<Package>, AppError> {
    Ok(Json(state.packages.update_package(id, patch).await?))
}

/// DELETE `/packages/{id}`
pub async fn delete_package(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.packages.delete_package(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/packages/{id}/history`, newest first.
pub async fn package_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PackageHistory>>, AppError> {
    Ok(Json(state.packages.package_history(id).await?))
}

fn encode_continuation_token(after: Uuid) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(after.as_bytes())
}

fn decode_continuation_token(token: &str) -> Result<Uuid, AppError> {
    general_purpose::URL_SAFE_NO_PAD
        .decode(token)
        .ok()
        .and_then(|bytes| Uuid::from_slice(&bytes).ok())
        .ok_or_else(|| AppError::bad_request(format!("invalid continuation token `{}`", token)))
}
