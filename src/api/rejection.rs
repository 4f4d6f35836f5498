use std::convert::Infallible;

use serde::Serialize;
use warp::{
    filters::body::BodyDeserializeError,
    http::StatusCode,
    reject::{InvalidQuery, MethodNotAllowed, PayloadTooLarge, UnsupportedMediaType},
    reply::Response,
    Rejection,
};

use crate::error::ServiceError;

use super::state::json_reply;

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub detail: String,
}

/// Renders every rejection as `{"detail": "..."}` with its status code.
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, detail) = if let Some(e) = err.find::<ServiceError>() {
        (e.status(), e.to_string())
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid request body: {e}"))
    } else if let Some(e) = err.find::<InvalidQuery>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            String::from("Request body is too large"),
        )
    } else if err.find::<UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            String::from("Request body must be JSON"),
        )
    } else if err.find::<MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            String::from("Method not allowed"),
        )
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, String::from("Not found"))
    } else {
        log::error!("Unhandled rejection: {err:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            String::from("Internal server error"),
        )
    };

    Ok(json_reply(&ErrorBody { detail }, status))
}
