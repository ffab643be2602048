// HTTP API error types and the uniform response envelopes
use axum::{http::StatusCode, response::IntoResponse, Json};
use rand::Rng;
use serde_json::{json, Value};

/// HTTP API error with appropriate status codes and client-facing
/// Portuguese messages. Validation and permission failures are produced
/// inline by the pipeline or the services; only unexpected errors go
/// through the `Internal` variant with a support reference code.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError { message: String, details: String },

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 405 Method Not Allowed
    MethodNotAllowed,

    // 409 Conflict
    Conflict(String),

    // 500 Internal Server Error, carries an opaque reference code the
    // caller can quote in a support report
    Internal { code: String, detail: String },
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::MethodNotAllowed => "Método não permitido.",
            ApiError::Conflict(msg) => msg,
            ApiError::Internal { .. } => "Ocorreu um erro inesperado. Contacta o suporte com o código fornecido.",
        }
    }

    pub fn to_json(&self) -> Value {
        let mut body = json!({ "message": self.message() });
        match self {
            ApiError::ValidationError { details, .. } => {
                body["details"] = json!(details);
            }
            ApiError::Internal { code, .. } => {
                body["code"] = json!(code);
            }
            _ => {}
        }
        body
    }

    /// Envelope with the internal detail included. Only for
    /// non-production responses.
    pub fn to_json_with_details(&self) -> Value {
        let mut body = self.to_json();
        if let ApiError::Internal { detail, .. } = self {
            body["details"] = json!(detail);
        }
        body
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(message: impl Into<String>, details: impl Into<String>) -> Self {
        ApiError::ValidationError { message: message.into(), details: details.into() }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        ApiError::Internal { code: reference_code(), detail: detail.into() }
    }
}

/// Short alphanumeric code returned on unhandled errors and persisted to
/// the force's error log so support can cross-reference the report.
pub fn reference_code() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    (0..8)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

// MySQL constraint violations get a client-friendly mapping; everything
// else becomes an opaque 500 with a reference code.
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                // ER_DUP_ENTRY
                Some("1062") => return ApiError::conflict("Registo duplicado."),
                // ER_ROW_IS_REFERENCED_2 / ER_NO_REFERENCED_ROW_2
                Some("1451") | Some("1452") => {
                    return ApiError::bad_request("Operação viola restrições de integridade.")
                }
                _ => {}
            }
        }
        tracing::error!("database error: {}", err);
        ApiError::internal(err.to_string())
    }
}

impl From<crate::database::DbError> for ApiError {
    fn from(err: crate::database::DbError) -> Self {
        match err {
            crate::database::DbError::UnknownForce(_) => {
                ApiError::bad_request("Força inválida.")
            }
            crate::database::DbError::Sqlx(e) => e.into(),
            other => {
                tracing::error!("database error: {}", other);
                ApiError::internal(other.to_string())
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}

/// Successful response envelope: `{message, data?, meta?}`.
#[derive(Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub message: String,
    pub data: Option<Value>,
    pub meta: Option<Value>,
    pub set_cookie: Option<String>,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            message: message.into(),
            data: None,
            meta: None,
            set_cookie: None,
        }
    }

    pub fn created(message: impl Into<String>) -> Self {
        Self { status: StatusCode::CREATED, ..Self::ok(message) }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.set_cookie = Some(cookie.into());
        self
    }

    pub fn to_json(&self) -> Value {
        let mut body = json!({ "message": self.message });
        if let Some(data) = &self.data {
            body["data"] = data.clone();
        }
        if let Some(meta) = &self.meta {
            body["meta"] = meta.clone();
        }
        body
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> axum::response::Response {
        let mut response = (self.status, Json(self.to_json())).into_response();
        if let Some(cookie) = self.set_cookie {
            if let Ok(value) = axum::http::HeaderValue::from_str(&cookie) {
                response.headers_mut().insert(axum::http::header::SET_COOKIE, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_has_message() {
        let err = ApiError::bad_request("Força inválida.");
        let body = err.to_json();
        assert_eq!(body["message"], "Força inválida.");
        assert!(body.get("code").is_none());
    }

    #[test]
    fn validation_error_carries_details() {
        let err = ApiError::validation_error("Corpo do pedido inválido.", "missing field `nif`");
        let body = err.to_json();
        assert_eq!(body["details"], "missing field `nif`");
    }

    #[test]
    fn internal_error_hides_detail_behind_code() {
        let err = ApiError::internal("connection reset");
        let body = err.to_json();
        let code = body["code"].as_str().unwrap();
        assert_eq!(code.len(), 8);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(!body["message"].as_str().unwrap().contains("connection"));
    }

    #[test]
    fn internal_detail_is_exposed_only_on_request() {
        let err = ApiError::internal("connection reset");
        assert!(err.to_json().get("details").is_none());
        assert_eq!(err.to_json_with_details()["details"], "connection reset");
        assert_eq!(err.to_json()["message"], err.to_json_with_details()["message"]);
        assert_eq!(err.to_json()["code"], err.to_json_with_details()["code"]);
    }

    #[test]
    fn reference_codes_are_random() {
        assert_ne!(reference_code(), reference_code());
    }
}
