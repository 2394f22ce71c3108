use std::convert::Infallible;

use warp::{
    filters::body::BodyDeserializeError,
    http::StatusCode,
    reject::{
        InvalidQuery, LengthRequired, MethodNotAllowed, PayloadTooLarge, Rejection,
        UnsupportedMediaType,
    },
    Reply,
};

use crate::error::ApiError;

fn detail(message: &str) -> serde_json::Value {
    serde_json::json!({ "detail": message })
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, body) = if let Some(e) = err.find::<ApiError>() {
        if let ApiError::Internal(info) = e {
            log::error!("Request failed: {info}");
        }
        (e.status(), e.body())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, detail("Not found."))
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        (
            StatusCode::BAD_REQUEST,
            detail(&format!("JSON parse error - {e}")),
        )
    } else if err.find::<InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, detail("Malformed query string."))
    } else if err.find::<LengthRequired>().is_some() {
        (
            StatusCode::LENGTH_REQUIRED,
            detail("A Content-Length header is required."),
        )
    } else if err.find::<PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            detail("Request body is too large."),
        )
    } else if err.find::<UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            detail("Unsupported media type in request."),
        )
    } else if err.find::<MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            detail("Method not allowed."),
        )
    } else {
        log::error!("Unhandled rejection: {err:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            detail("A server error occurred."),
        )
    };

    Ok(warp::reply::with_status(warp::reply::json(&body), status))
}
