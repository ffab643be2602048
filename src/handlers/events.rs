//! Calendar events shown on the force's shared agenda.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::database::SqlValue;
use crate::error::{ApiError, ApiResponse};
use crate::filter::{date_to_datetime, FilterSet};
use crate::pipeline::RequestContext;

use super::rows_to_json;

#[derive(Debug, Serialize, sqlx::FromRow)]
struct EventRow {
    id: i64,
    title: String,
    description: Option<String>,
    start: NaiveDateTime,
    #[sqlx(rename = "end")]
    #[serde(rename = "end")]
    finish: NaiveDateTime,
    author: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateEventBody {
    pub title: String,
    pub description: Option<String>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// `"YYYY-MM"` → the month's first-day bounds, spread into a
/// `start >= ? AND start < ?` window.
fn month_bounds(raw: &Value) -> Result<Vec<SqlValue>, String> {
    let text = raw.as_str().ok_or_else(|| "expected a month string".to_string())?;
    let first = NaiveDate::parse_from_str(&format!("{}-01", text), "%Y-%m-%d")
        .map_err(|e| format!("invalid month '{}': {}", text, e))?;
    let next = first
        .checked_add_months(chrono::Months::new(1))
        .ok_or_else(|| "month out of range".to_string())?;
    let at_midnight = |d: NaiveDate| d.and_hms_opt(0, 0, 0).map(SqlValue::DateTime);
    match (at_midnight(first), at_midnight(next)) {
        (Some(a), Some(b)) => Ok(vec![a, b]),
        _ => Err("invalid month".to_string()),
    }
}

pub fn list_filters() -> FilterSet {
    FilterSet::new()
        .with_transform("month", "(start >= ? AND start < ?)", month_bounds)
        .with_transform("after", "start >= ?", date_to_datetime)
        .with_transform("before", "start <= ?", date_to_datetime)
}

/// GET /events
pub async fn list(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    let built = list_filters().build(&ctx.query, None)?;
    let sql = format!(
        "SELECT id, title, description, start, `end`, author FROM events {} ORDER BY start",
        built.where_clause
    );
    let rows = ctx.fetch(&sql, built.params).await?;
    Ok(ApiResponse::ok("Operação bem sucedida.").with_data(rows_to_json::<EventRow>(&rows)?))
}

/// POST /events
pub async fn create(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    let body: CreateEventBody = ctx.body_as()?;
    if body.start >= body.end {
        return Err(ApiError::bad_request("Intervalo de datas inválido."));
    }

    let result = ctx
        .exec(
            "INSERT INTO events (title, description, start, `end`, author) VALUES (?, ?, ?, ?, ?)",
            vec![
                body.title.into(),
                body.description.into(),
                body.start.into(),
                body.end.into(),
                ctx.officer()?.nif.into(),
            ],
        )
        .await?;

    Ok(ApiResponse::created("Evento criado.").with_data(json!({ "id": result.last_insert_id() })))
}

/// DELETE /events/{id}
pub async fn delete(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    let id = ctx.capture_i64(0)?;
    let result = ctx.exec("DELETE FROM events WHERE id = ?", id).await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Evento não encontrado."));
    }
    Ok(ApiResponse::ok("Evento removido."))
}
