pub mod auth;
pub mod groups;
pub mod health;
pub mod profile;
pub mod resources;
pub mod settings;

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::Response,
    Json,
};
use uuid::Uuid;

use crate::error::{respond, AppError, AppResult, ApiResponse};

pub type HandlerResult = AppResult<Response>;

pub fn ok<T: serde::Serialize>(data: T, message: &str) -> HandlerResult {
    Ok(respond(StatusCode::OK, ApiResponse::ok(data, message)))
}

pub fn created<T: serde::Serialize>(data: T, message: &str) -> HandlerResult {
    Ok(respond(StatusCode::CREATED, ApiResponse::ok(data, message)))
}

pub fn done(message: &str) -> HandlerResult {
    Ok(respond(StatusCode::OK, ApiResponse::empty(message)))
}

/// Parses a path id, naming the entity in the error.
pub fn parse_id(raw: &str, entity: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::bad_request(format!("Invalid {} ID", entity)))
}

/// Unwraps a JSON body, reporting malformed input through the envelope.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| AppError::bad_request(e.body_text()))
}

pub fn query_params<T>(
    params: Result<axum::extract::Query<T>, QueryRejection>,
) -> AppResult<T> {
    params
        .map(|axum::extract::Query(q)| q)
        .map_err(|e| AppError::bad_request(e.body_text()))
}

pub async fn not_found() -> AppError {
    AppError::not_found("Route not found")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_names_entity() {
        let err = parse_id("not-a-uuid", "study group").unwrap_err();
        assert_eq!(err.to_string(), "Invalid study group ID");
        assert!(parse_id(&Uuid::new_v4().to_string(), "resource").is_ok());
    }
}
