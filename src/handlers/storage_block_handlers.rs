//! HTTP handlers for storage blocks, their load and the best-fit search.

use crate::{
    errors::AppError,
    models::storage_block::{NewStorageBlock, StorageBlock, StorageBlockPatch},
    services::storage_block_service::BlockUsage,
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Query params for `GET /storage_blocks/best_fit`.
#[derive(Debug, Deserialize)]
pub struct BestFitQuery {
    pub volume: f64,
    pub weight: f64,
    #[serde(default = "one")]
    pub count: i64,
}

fn one() -> i64 {
    1
}

#[derive(Debug, Serialize)]
pub struct BestFitResponse {
    pub block: Option<StorageBlock>,
}

/// POST `/storage_blocks`
pub async fn create_block(
    State(state): State<AppState>,
    Json(new): Json<NewStorageBlock>,
) -> Result<(StatusCode, Json<StorageBlock>), AppError> {
    let block = state.blocks.create_block(new).await?;
    Ok((StatusCode::CREATED, Json(block)))
}

/// GET `/storage_blocks`
pub async fn list_blocks(
    State(state): State<AppState>,
) -> Result<Json<Vec<StorageBlock>>, AppError> {
    Ok(Json(state.blocks.list_blocks().await?))
}

/// GET `/storage_blocks/{id}`
pub async fn get_block(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StorageBlock>, AppError> {
    Ok(Json(state.blocks.get_block(id).await?))
}

/// PATCH `/storage_blocks/{id}`: rename or change limits.
pub async fn update_block(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<StorageBlockPatch>,
) -> Result<Json<StorageBlock>, AppError> {
    Ok(Json(state.blocks.update_block(id, patch).await?))
}

/// DELETE `/storage_blocks/{id}`
pub async fn delete_block(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.blocks.delete_block(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/storage_blocks/{id}/load`
pub async fn block_load(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BlockUsage>, AppError> {
    Ok(Json(state.blocks.block_load(id).await?))
}

/// GET `/storage_blocks/best_fit?volume=&weight=&count=`
///
/// `block` is `null` when no block can take the footprint.
pub async fn best_fit(
    State(state): State<AppState>,
    Query(q): Query<BestFitQuery>,
) -> Result<Json<BestFitResponse>, AppError> {
    let block = state.blocks.best_fit(q.volume, q.weight, q.count).await?;
    Ok(Json(BestFitResponse { block }))
}
