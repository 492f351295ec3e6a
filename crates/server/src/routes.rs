use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tally_core::{RawTransaction, SpendingSummary, StoredTransaction, TransactionEdit};

use crate::auth::Owner;
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub transactions: Vec<RawTransaction>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImportResponse {
    pub success: bool,
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionList {
    pub data: Vec<StoredTransaction>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub success: bool,
    pub data: StoredTransaction,
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    pub id: Option<i64>,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// `POST /api/transactions`
pub async fn import_transactions(
    State(state): State<AppState>,
    Owner(owner): Owner,
    payload: Result<Json<ImportRequest>, JsonRejection>,
) -> Result<Json<ImportResponse>, ApiError> {
    let Json(request) = payload?;

    let rows = tally_import::normalize_batch(&owner, &request.transactions)?;
    let count = tally_storage::upsert_transactions(&state.db, &rows).await?;

    tracing::info!(
        owner = %owner,
        submitted = rows.len(),
        persisted = count,
        "Imported transactions"
    );

    Ok(Json(ImportResponse {
        success: true,
        count,
    }))
}

/// `GET /api/transactions`
pub async fn list_transactions(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Json<TransactionList>, ApiError> {
    let data = tally_storage::get_transactions(&state.db, &owner).await?;
    Ok(Json(TransactionList { data }))
}

/// `PATCH /api/transactions`
pub async fn update_transaction(
    State(state): State<AppState>,
    Owner(owner): Owner,
    payload: Result<Json<TransactionEdit>, JsonRejection>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let Json(edit) = payload?;
    let update = tally_import::normalize_edit(&edit)?;

    if !tally_storage::update_transaction(&state.db, &owner, edit.id, &update).await? {
        return Err(not_found(edit.id));
    }

    let data = tally_storage::get_transaction_by_id(&state.db, &owner, edit.id)
        .await?
        .ok_or_else(|| not_found(edit.id))?;

    tracing::info!(owner = %owner, id = edit.id, "Updated transaction");
    Ok(Json(UpdateResponse {
        success: true,
        data,
    }))
}

/// `DELETE /api/transactions?id=N`
pub async fn delete_transaction(
    State(state): State<AppState>,
    Owner(owner): Owner,
    params: Result<Query<DeleteParams>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(params) = params?;
    let id = params
        .id
        .ok_or_else(|| ApiError::BadRequest(r#"Missing "id" parameter"#.to_string()))?;

    if !tally_storage::delete_transaction(&state.db, &owner, id).await? {
        return Err(not_found(id));
    }

    tracing::info!(owner = %owner, id, "Deleted transaction");
    Ok(Json(json!({ "success": true })))
}

/// `GET /api/transactions/summary`
pub async fn spending_summary(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Json<SpendingSummary>, ApiError> {
    let summary = tally_storage::get_spending_summary(&state.db, &owner).await?;
    Ok(Json(summary))
}

fn not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("Transaction {id} not found"))
}
