//! Absence justifications: creation by the officer, decision by a
//! supervisor. A decided justification is immutable.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::Row;

use crate::error::{ApiError, ApiResponse};
use crate::filter::{FilterSet, Suffix};
use crate::pipeline::RequestContext;

use super::rows_to_json;

#[derive(Debug, Serialize, sqlx::FromRow)]
struct JustificationRow {
    id: i64,
    officer: i64,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    kind: i64,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    description: String,
    status: String,
    managed_by: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateJustificationBody {
    #[serde(rename = "type")]
    pub kind: i64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct DecideJustificationBody {
    pub approved: bool,
}

pub fn list_filters() -> FilterSet {
    FilterSet::new()
        .with("status", "status = ?")
        .with("type", "type = ?")
}

/// GET /officers/{nif}/justifications
pub async fn list(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    let nif = ctx.capture_i64(0)?;
    let suffix = Suffix { clause: "officer = ?".to_string(), params: vec![nif.into()] };
    let built = list_filters().build(&ctx.query, Some(suffix))?;

    let sql = format!(
        "SELECT id, officer, type, start_date, end_date, description, status, managed_by \
         FROM justifications {} ORDER BY start_date DESC",
        built.where_clause
    );
    let rows = ctx.fetch(&sql, built.params).await?;
    Ok(ApiResponse::ok("Operação bem sucedida.")
        .with_data(rows_to_json::<JustificationRow>(&rows)?))
}

/// POST /officers/{nif}/justifications — an open-ended justification
/// (no end date) is allowed; inactivity-type justifications are capped
/// by the force's maximum non-working days.
pub async fn create(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    let nif = ctx.capture_i64(0)?;
    let body: CreateJustificationBody = ctx.body_as()?;
    let entry = ctx.force_entry()?;

    if let Some(end) = body.end_date {
        if end < body.start_date {
            return Err(ApiError::bad_request("Intervalo de datas inválido."));
        }
        if body.kind == entry.inactivity_justification_type {
            let days = (end - body.start_date).num_days() + 1;
            if days > entry.max_non_working_days {
                return Err(ApiError::bad_request(
                    "Justificação excede o número máximo de dias de inatividade.",
                ));
            }
        }
    }

    let result = ctx
        .exec(
            "INSERT INTO justifications (officer, type, start_date, end_date, description, status) \
             VALUES (?, ?, ?, ?, ?, 'pending')",
            vec![
                nif.into(),
                body.kind.into(),
                body.start_date.into(),
                body.end_date.into(),
                body.description.into(),
            ],
        )
        .await?;

    Ok(ApiResponse::created("Justificação submetida.")
        .with_data(json!({ "id": result.last_insert_id() })))
}

/// PATCH /officers/{nif}/justifications/{id} — approve or deny once.
pub async fn decide(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    let nif = ctx.capture_i64(0)?;
    let id = ctx.capture_i64(1)?;
    let body: DecideJustificationBody = ctx.body_as()?;

    let rows = ctx
        .fetch(
            "SELECT status FROM justifications WHERE id = ? AND officer = ?",
            vec![id.into(), nif.into()],
        )
        .await?;
    let Some(row) = rows.first() else {
        return Err(ApiError::not_found("Justificação não encontrada."));
    };
    let status: String = row.try_get("status").map_err(ApiError::from)?;
    if status != "pending" {
        return Err(ApiError::forbidden("Justificação já foi decidida."));
    }

    let new_status = if body.approved { "approved" } else { "denied" };
    ctx.exec(
        "UPDATE justifications SET status = ?, managed_by = ? WHERE id = ?",
        vec![new_status.into(), ctx.officer()?.nif.into(), id.into()],
    )
    .await?;

    Ok(ApiResponse::ok("Justificação decidida com sucesso."))
}
