//! Force-wide announcements, broadcast to connected clients on
//! creation.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::FromRow;

use crate::error::{ApiError, ApiResponse};
use crate::filter::FilterSet;
use crate::pipeline::RequestContext;

use super::rows_to_json;

#[derive(Debug, Serialize, sqlx::FromRow)]
struct AnnouncementRow {
    id: i64,
    title: String,
    body: String,
    author: i64,
    created: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub struct CreateAnnouncementBody {
    pub title: String,
    pub body: String,
}

pub fn list_filters() -> FilterSet {
    FilterSet::new().with("author", "author = ?")
}

/// GET /announcements
pub async fn list(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    let built = list_filters().build(&ctx.query, None)?;
    let sql = format!(
        "SELECT id, title, body, author, created FROM announcements {} ORDER BY created DESC",
        built.where_clause
    );
    let rows = ctx.fetch(&sql, built.params).await?;
    Ok(ApiResponse::ok("Operação bem sucedida.")
        .with_data(rows_to_json::<AnnouncementRow>(&rows)?))
}

/// GET /announcements/{id}
pub async fn get(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    let id = ctx.capture_i64(0)?;
    let rows = ctx
        .fetch(
            "SELECT id, title, body, author, created FROM announcements WHERE id = ?",
            id,
        )
        .await?;
    let Some(row) = rows.first() else {
        return Err(ApiError::not_found("Anúncio não encontrado."));
    };
    let announcement = AnnouncementRow::from_row(row).map_err(ApiError::from)?;
    Ok(ApiResponse::ok("Operação bem sucedida.").with_data(json!(announcement)))
}

/// POST /announcements
pub async fn create(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    let body: CreateAnnouncementBody = ctx.body_as()?;
    if body.title.trim().is_empty() {
        return Err(ApiError::bad_request("Título do anúncio em falta."));
    }

    let result = ctx
        .exec(
            "INSERT INTO announcements (title, body, author, created) VALUES (?, ?, ?, NOW())",
            vec![
                body.title.into(),
                body.body.into(),
                ctx.officer()?.nif.into(),
            ],
        )
        .await?;

    Ok(ApiResponse::created("Anúncio publicado.")
        .with_data(json!({ "id": result.last_insert_id() })))
}
