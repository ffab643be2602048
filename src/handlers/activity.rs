//! Weekly work-hour records for an officer. Weeks are stored as unix
//! second bounds; the force's minimum weekly minutes travels in the
//! response meta so the UI can flag short weeks.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{ApiError, ApiResponse};
use crate::filter::{date_to_unix, FilterSet, Suffix};
use crate::pipeline::RequestContext;

use super::rows_to_json;

#[derive(Debug, Serialize, sqlx::FromRow)]
struct HoursRow {
    id: i64,
    officer: i64,
    week_start: i64,
    week_end: i64,
    minutes: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateHoursBody {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub minutes: i64,
}

pub fn list_filters() -> FilterSet {
    FilterSet::new()
        .with_transform("after", "week_start >= ?", date_to_unix)
        .with_transform("before", "week_end <= ?", date_to_unix)
}

/// GET /officers/{nif}/hours — the officer scoping is a suffix
/// condition, never exposed as a client filter.
pub async fn list(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    let nif = ctx.capture_i64(0)?;
    let suffix = Suffix { clause: "officer = ?".to_string(), params: vec![nif.into()] };
    let built = list_filters().build(&ctx.query, Some(suffix))?;

    let sql = format!(
        "SELECT id, officer, week_start, week_end, minutes FROM hours {} ORDER BY week_start DESC",
        built.where_clause
    );
    let rows = ctx.fetch(&sql, built.params).await?;

    let min_week_minutes = ctx.force_entry()?.min_week_minutes;
    Ok(ApiResponse::ok("Operação bem sucedida.")
        .with_data(rows_to_json::<HoursRow>(&rows)?)
        .with_meta(json!({ "min_week_minutes": min_week_minutes })))
}

/// POST /officers/{nif}/hours
pub async fn create(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    let nif = ctx.capture_i64(0)?;
    let body: CreateHoursBody = ctx.body_as()?;

    if body.week_start >= body.week_end {
        return Err(ApiError::bad_request("Intervalo de datas inválido."));
    }
    if body.minutes <= 0 {
        return Err(ApiError::bad_request("Minutos registados têm de ser positivos."));
    }

    let start = body.week_start.and_hms_opt(0, 0, 0).map(|t| t.and_utc().timestamp());
    let end = body.week_end.and_hms_opt(0, 0, 0).map(|t| t.and_utc().timestamp());
    let result = ctx
        .exec(
            "INSERT INTO hours (officer, week_start, week_end, minutes) VALUES (?, ?, ?, ?)",
            vec![nif.into(), start.into(), end.into(), body.minutes.into()],
        )
        .await?;

    Ok(ApiResponse::created("Registo de horas adicionado.")
        .with_data(json!({ "id": result.last_insert_id() })))
}

/// DELETE /officers/{nif}/hours/{id}
pub async fn delete(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    let nif = ctx.capture_i64(0)?;
    let id = ctx.capture_i64(1)?;
    let result = ctx
        .exec(
            "DELETE FROM hours WHERE id = ? AND officer = ?",
            vec![id.into(), nif.into()],
        )
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Registo de horas não encontrado."));
    }
    Ok(ApiResponse::ok("Registo de horas removido."))
}
