//! Patrol lifecycle. Patrols may mix officers from the acting force and
//! any patrol-compatible force; an officer can be in at most one active
//! patrol at a time, and an ended patrol is immutable.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::Row;

use crate::database::SqlValue;
use crate::error::{ApiError, ApiResponse};
use crate::filter::{date_to_datetime, option_flag, FilterSet};
use crate::pipeline::RequestContext;

use super::rows_to_json;

#[derive(Debug, Serialize, sqlx::FromRow)]
struct PatrolRow {
    id: i64,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    kind: i64,
    special_unit: Option<i64>,
    start: NaiveDateTime,
    end: Option<NaiveDateTime>,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePatrolBody {
    #[serde(rename = "type")]
    pub kind: i64,
    pub special_unit: Option<i64>,
    pub officers: Vec<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePatrolBody {
    pub notes: Option<String>,
    #[serde(default)]
    pub end: bool,
}

pub fn list_filters() -> FilterSet {
    FilterSet::new()
        .with_transform("active", "(`end` IS NULL) = ?", option_flag)
        .with("type", "type = ?")
        .with_transform("after", "start >= ?", date_to_datetime)
        .with_transform("before", "start <= ?", date_to_datetime)
}

/// GET /patrols
pub async fn list(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    let built = list_filters().build(&ctx.query, None)?;
    let sql = format!(
        "SELECT id, type, special_unit, start, `end`, notes FROM patrols {} ORDER BY start DESC",
        built.where_clause
    );
    let rows = ctx.fetch(&sql, built.params).await?;
    Ok(ApiResponse::ok("Operação bem sucedida.").with_data(rows_to_json::<PatrolRow>(&rows)?))
}

/// Every listed officer must exist either in the acting force or in one
/// of its patrol-compatible forces.
async fn check_members_known(ctx: &RequestContext, officers: &[i64]) -> Result<(), ApiError> {
    let own = ctx.force()?.to_string();
    let mut forces = vec![own];
    forces.extend(ctx.force_entry()?.patrol_forces.iter().cloned());

    'officers: for nif in officers {
        for force in &forces {
            let rows = ctx
                .state
                .registry
                .query(force, "SELECT nif FROM officers WHERE nif = ?", *nif)
                .await?;
            if !rows.is_empty() {
                continue 'officers;
            }
        }
        return Err(ApiError::bad_request("Efetivo não pertence a uma força compatível."));
    }
    Ok(())
}

async fn check_no_active_patrol(ctx: &RequestContext, officers: &[i64]) -> Result<(), ApiError> {
    if officers.is_empty() {
        return Err(ApiError::bad_request("Patrulha tem de incluir pelo menos um efetivo."));
    }
    let placeholders = vec!["?"; officers.len()].join(", ");
    let sql = format!(
        "SELECT po.officer FROM patrol_officers po \
         JOIN patrols p ON p.id = po.patrol \
         WHERE p.`end` IS NULL AND po.officer IN ({})",
        placeholders
    );
    let params: Vec<SqlValue> = officers.iter().map(|n| (*n).into()).collect();
    let rows = ctx.fetch(&sql, params).await?;
    if !rows.is_empty() {
        return Err(ApiError::bad_request("Efetivo já se encontra numa patrulha ativa."));
    }
    Ok(())
}

/// POST /patrols — the patrol row and its member rows are inserted
/// inside one transaction.
pub async fn create(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    let body: CreatePatrolBody = ctx.body_as()?;

    check_members_known(ctx, &body.officers).await?;
    check_no_active_patrol(ctx, &body.officers).await?;

    let force = ctx.force()?;
    let mut tx = ctx.state.registry.begin(force).await.map_err(ApiError::from)?;
    let inserted = sqlx::query(
        "INSERT INTO patrols (type, special_unit, start, notes) VALUES (?, ?, NOW(), ?)",
    )
    .bind(body.kind)
    .bind(body.special_unit)
    .bind(&body.notes)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::from)?;
    let id = inserted.last_insert_id();
    for nif in &body.officers {
        sqlx::query("INSERT INTO patrol_officers (patrol, officer) VALUES (?, ?)")
            .bind(id)
            .bind(nif)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::from)?;
    }
    tx.commit().await.map_err(ApiError::from)?;

    Ok(ApiResponse::created("Patrulha iniciada.").with_data(json!({ "id": id })))
}

/// PATCH /patrols/{id} — edit notes or end the patrol. A patrol that
/// already ended cannot be touched again.
pub async fn update(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    let id = ctx.capture_i64(0)?;
    let body: UpdatePatrolBody = ctx.body_as()?;

    let rows = ctx.fetch("SELECT `end` FROM patrols WHERE id = ?", id).await?;
    let Some(row) = rows.first() else {
        return Err(ApiError::not_found("Patrulha não encontrada."));
    };
    let ended: Option<NaiveDateTime> = row.try_get("end").map_err(ApiError::from)?;
    if ended.is_some() {
        return Err(ApiError::forbidden("Patrulha já terminou."));
    }

    if let Some(notes) = body.notes {
        ctx.exec(
            "UPDATE patrols SET notes = ? WHERE id = ?",
            vec![notes.into(), id.into()],
        )
        .await?;
    }
    if body.end {
        ctx.exec("UPDATE patrols SET `end` = NOW() WHERE id = ?", id).await?;
    }

    Ok(ApiResponse::ok("Patrulha atualizada."))
}
