//! Shared JSON error envelope helpers, grounded on
//! `services/server/src/http/response.rs`'s `json_error`/`bad_request`/
//! `not_found` family.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use radar_protocol::HttpErrorEnvelope;

pub type HttpResponse = Response;

fn json_error(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> HttpResponse {
    (
        status,
        Json(HttpErrorEnvelope {
            code: code.into(),
            message: message.into(),
            details: None,
        }),
    )
        .into_response()
}

pub fn bad_request(message: impl Into<String>) -> HttpResponse {
    json_error(StatusCode::BAD_REQUEST, radar_protocol::error_codes::BAD_ARGUMENT, message)
}

pub fn store_unavailable(message: impl Into<String>) -> HttpResponse {
    json_error(
        StatusCode::SERVICE_UNAVAILABLE,
        radar_protocol::error_codes::STORE_UNAVAILABLE,
        message,
    )
}
