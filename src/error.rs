//! Typed errors and HTTP mapping.

use crate::response::Envelope;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("duplicate model: {0}")]
    DuplicateModel(String),
    #[error("duplicate attribute '{attribute}' on model {model}")]
    DuplicateAttribute { model: String, attribute: String },
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no route for {0}")]
    Routing(String),
    #[error("unknown model: {0}")]
    UnknownModel(String),
    #[error("unknown association '{association}' on model {model}")]
    UnknownAssociation { model: String, association: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("method {method} not allowed on {path}")]
    MethodNotAllowed { method: String, path: String },
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("provider: {0}")]
    Provider(String),
}

impl AppError {
    /// Stable machine-readable code carried in error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::Routing(_) => "routing_error",
            AppError::UnknownModel(_) | AppError::UnknownAssociation { .. } | AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::InvalidQuery(_) => "invalid_query",
            AppError::MethodNotAllowed { .. } => "method_not_allowed",
            AppError::Db(sqlx::Error::RowNotFound) => "not_found",
            AppError::Db(_) => "database_error",
            AppError::Provider(_) => "provider_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        status_for_code(self.code())
    }
}

/// Maps an envelope error code to the HTTP status the binding layer answers with.
pub fn status_for_code(code: &str) -> StatusCode {
    match code {
        "not_found" | "routing_error" => StatusCode::NOT_FOUND,
        "bad_request" | "invalid_query" => StatusCode::BAD_REQUEST,
        "method_not_allowed" => StatusCode::METHOD_NOT_ALLOWED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(Envelope::error(&self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_statuses() {
        assert_eq!(AppError::NotFound("Photos/9".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::UnknownModel("Cats".into()).code(), "not_found");
        assert_eq!(AppError::InvalidQuery("bad".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Db(sqlx::Error::RowNotFound).code(), "not_found");
        assert_eq!(
            AppError::Provider("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn config_errors_are_transparent() {
        let e: AppError = ConfigError::DuplicateModel("Photo".into()).into();
        assert_eq!(e.to_string(), "duplicate model: Photo");
        assert_eq!(e.code(), "config_error");
    }
}
