//! Per-force lookup tables backing the UI dropdowns.

use serde::Serialize;

use crate::error::{ApiError, ApiResponse};
use crate::pipeline::RequestContext;

use super::rows_to_json;

#[derive(Debug, Serialize, sqlx::FromRow)]
struct PatentRow {
    id: i64,
    name: String,
    max_evaluation: Option<i64>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
struct StatusRow {
    id: i64,
    name: String,
    color: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
struct IntentRow {
    name: String,
    description: Option<String>,
}

/// GET /util/patents
pub async fn patents(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    let rows = ctx
        .fetch("SELECT id, name, max_evaluation FROM patents ORDER BY id", ())
        .await?;
    Ok(ApiResponse::ok("Operação bem sucedida.").with_data(rows_to_json::<PatentRow>(&rows)?))
}

/// GET /util/statuses
pub async fn statuses(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    let rows = ctx
        .fetch("SELECT id, name, color FROM statuses ORDER BY id", ())
        .await?;
    Ok(ApiResponse::ok("Operação bem sucedida.").with_data(rows_to_json::<StatusRow>(&rows)?))
}

/// GET /util/intents
pub async fn intents(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    let rows = ctx
        .fetch("SELECT name, description FROM intents ORDER BY name", ())
        .await?;
    Ok(ApiResponse::ok("Operação bem sucedida.").with_data(rows_to_json::<IntentRow>(&rows)?))
}
