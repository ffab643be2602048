//! Officer evaluations, written by a more senior officer.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{ApiError, ApiResponse};
use crate::filter::{date_to_datetime, FilterSet, Suffix};
use crate::pipeline::RequestContext;

use super::{check_supervises, rows_to_json};

#[derive(Debug, Serialize, sqlx::FromRow)]
struct EvaluationRow {
    id: i64,
    target: i64,
    author: i64,
    grade: i64,
    comments: Option<String>,
    timestamp: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub struct CreateEvaluationBody {
    pub grade: i64,
    pub comments: Option<String>,
}

pub fn list_filters() -> FilterSet {
    FilterSet::new()
        .with("author", "author = ?")
        .with_transform("after", "timestamp >= ?", date_to_datetime)
        .with_transform("before", "timestamp <= ?", date_to_datetime)
}

/// GET /officers/{nif}/evaluations
pub async fn list(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    let nif = ctx.capture_i64(0)?;
    let suffix = Suffix { clause: "target = ?".to_string(), params: vec![nif.into()] };
    let built = list_filters().build(&ctx.query, Some(suffix))?;

    let sql = format!(
        "SELECT id, target, author, grade, comments, timestamp FROM evaluations {} \
         ORDER BY timestamp DESC",
        built.where_clause
    );
    let rows = ctx.fetch(&sql, built.params).await?;
    Ok(ApiResponse::ok("Operação bem sucedida.")
        .with_data(rows_to_json::<EvaluationRow>(&rows)?))
}

/// POST /officers/{nif}/evaluations — only a more senior officer
/// (numerically lower patent) may evaluate the target.
pub async fn create(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    use sqlx::Row;

    let target = ctx.capture_i64(0)?;
    let body: CreateEvaluationBody = ctx.body_as()?;
    let author = ctx.officer()?;

    let rows = ctx.fetch("SELECT patent FROM officers WHERE nif = ?", target).await?;
    let Some(row) = rows.first() else {
        return Err(ApiError::not_found("Efetivo não encontrado."));
    };
    let target_patent: i64 = row.try_get("patent").map_err(ApiError::from)?;
    check_supervises(author, target_patent)?;

    if !(0..=10).contains(&body.grade) {
        return Err(ApiError::bad_request("Avaliação tem de estar entre 0 e 10."));
    }

    let result = ctx
        .exec(
            "INSERT INTO evaluations (target, author, grade, comments, timestamp) \
             VALUES (?, ?, ?, ?, NOW())",
            vec![
                target.into(),
                author.nif.into(),
                body.grade.into(),
                body.comments.into(),
            ],
        )
        .await?;

    Ok(ApiResponse::created("Avaliação registada.")
        .with_data(json!({ "id": result.last_insert_id() })))
}
