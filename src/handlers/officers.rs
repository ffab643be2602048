//! Officer records: listing with declarative filters, detail with the
//! force's configured promotion derivation, and supervised mutations.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::{FromRow, Row};

use crate::database::SqlValue;
use crate::error::{ApiError, ApiResponse};
use crate::filter::FilterSet;
use crate::pipeline::RequestContext;

use super::{check_supervises, rows_to_json};

#[derive(Debug, Serialize, sqlx::FromRow)]
struct OfficerRow {
    nif: i64,
    name: String,
    patent: i64,
    status: i64,
    callsign: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
struct OfficerDetailRow {
    nif: i64,
    name: String,
    patent: i64,
    status: i64,
    callsign: Option<String>,
    entry_date: Option<NaiveDate>,
    promotion_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOfficerBody {
    pub nif: i64,
    pub name: String,
    pub patent: i64,
    pub callsign: Option<String>,
    pub entry_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct SpecialUnitAssignment {
    pub unit: i64,
    pub role: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOfficerBody {
    pub name: Option<String>,
    pub patent: Option<i64>,
    pub status: Option<i64>,
    pub callsign: Option<String>,
    pub special_units: Option<Vec<SpecialUnitAssignment>>,
}

fn search_like(raw: &Value) -> Result<Vec<SqlValue>, String> {
    let text = raw.as_str().ok_or_else(|| "expected a search string".to_string())?;
    Ok(vec![SqlValue::Text(format!("%{}%", text))])
}

pub fn list_filters() -> FilterSet {
    FilterSet::new()
        .with_transform("search", "(name LIKE ? OR callsign LIKE ?)", search_both)
        .with("status", "status = ?")
        .with("patent", "patent = ?")
}

fn search_both(raw: &Value) -> Result<Vec<SqlValue>, String> {
    let mut values = search_like(raw)?;
    values.push(values[0].clone());
    Ok(values)
}

/// GET /officers
pub async fn list(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    let built = list_filters().build(&ctx.query, None)?;
    let sql = format!(
        "SELECT nif, name, patent, status, callsign FROM officers {} ORDER BY patent, name",
        built.where_clause
    );
    let rows = ctx.fetch(&sql, built.params).await?;
    Ok(ApiResponse::ok("Operação bem sucedida.").with_data(rows_to_json::<OfficerRow>(&rows)?))
}

/// GET /officers/{nif} — the promotion date comes from the force's
/// configured derivation expression (trusted config, never user input).
pub async fn get(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    let nif = ctx.capture_i64(0)?;
    let promotion_expression = ctx.force_entry()?.promotion_expression.clone();
    let sql = format!(
        "SELECT nif, name, patent, status, callsign, entry_date, {} AS promotion_date \
         FROM officers WHERE nif = ?",
        promotion_expression
    );
    let rows = ctx.fetch(&sql, nif).await?;
    let Some(row) = rows.first() else {
        return Err(ApiError::not_found("Efetivo não encontrado."));
    };
    let detail = OfficerDetailRow::from_row(row).map_err(ApiError::from)?;
    Ok(ApiResponse::ok("Operação bem sucedida.").with_data(json!(detail)))
}

/// POST /officers
pub async fn create(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    let body: CreateOfficerBody = ctx.body_as()?;
    ctx.exec(
        "INSERT INTO officers (nif, name, patent, status, callsign, entry_date) \
         VALUES (?, ?, ?, 1, ?, ?)",
        vec![
            body.nif.into(),
            body.name.into(),
            body.patent.into(),
            body.callsign.into(),
            body.entry_date.into(),
        ],
    )
    .await?;
    Ok(ApiResponse::created("Efetivo contratado com sucesso.")
        .with_data(json!({ "nif": body.nif })))
}

async fn target_patent(ctx: &RequestContext, nif: i64) -> Result<i64, ApiError> {
    let rows = ctx.fetch("SELECT patent FROM officers WHERE nif = ?", nif).await?;
    let Some(row) = rows.first() else {
        return Err(ApiError::not_found("Efetivo não encontrado."));
    };
    row.try_get("patent").map_err(ApiError::from)
}

/// PATCH /officers/{nif}
pub async fn update(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    let nif = ctx.capture_i64(0)?;
    let body: UpdateOfficerBody = ctx.body_as()?;

    check_supervises(ctx.officer()?, target_patent(ctx, nif).await?)?;

    let mut assignments: Vec<&'static str> = vec![];
    let mut params: Vec<SqlValue> = vec![];
    if let Some(name) = body.name {
        assignments.push("name = ?");
        params.push(name.into());
    }
    if let Some(patent) = body.patent {
        assignments.push("patent = ?");
        params.push(patent.into());
    }
    if let Some(status) = body.status {
        assignments.push("status = ?");
        params.push(status.into());
    }
    if let Some(callsign) = body.callsign {
        assignments.push("callsign = ?");
        params.push(callsign.into());
    }

    if !assignments.is_empty() {
        let sql = format!("UPDATE officers SET {} WHERE nif = ?", assignments.join(", "));
        params.push(nif.into());
        ctx.exec(&sql, params).await?;
    }

    // Replacing the unit assignments is a delete-then-insert sequence,
    // kept atomic inside one transaction.
    if let Some(units) = body.special_units {
        let force = ctx.force()?;
        let mut tx = ctx.state.registry.begin(force).await.map_err(ApiError::from)?;
        sqlx::query("DELETE FROM special_units_officers WHERE officer = ?")
            .bind(nif)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::from)?;
        for assignment in &units {
            sqlx::query(
                "INSERT INTO special_units_officers (officer, unit, role) VALUES (?, ?, ?)",
            )
            .bind(nif)
            .bind(assignment.unit)
            .bind(assignment.role)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::from)?;
        }
        tx.commit().await.map_err(ApiError::from)?;
    }

    Ok(ApiResponse::ok("Efetivo editado com sucesso."))
}

/// DELETE /officers/{nif}
pub async fn delete(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    let nif = ctx.capture_i64(0)?;
    check_supervises(ctx.officer()?, target_patent(ctx, nif).await?)?;

    ctx.exec("DELETE FROM sessions WHERE nif = ?", nif).await?;
    ctx.exec("DELETE FROM accounts WHERE nif = ?", nif).await?;
    let result = ctx.exec("DELETE FROM officers WHERE nif = ?", nif).await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Efetivo não encontrado."));
    }
    Ok(ApiResponse::ok("Efetivo despedido com sucesso."))
}
