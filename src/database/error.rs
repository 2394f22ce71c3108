use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use warp::{http::StatusCode, reject::Reject};

/// Per-field validation messages, rendered as `{"field": ["message", ...]}`.
#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct FieldErrors {
    inner: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: &str) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: &str) {
        self.inner
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    pub fn extend(&mut self, other: FieldErrors) {
        for (field, messages) in other.inner {
            self.inner.entry(field).or_default().extend(messages);
        }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.inner.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Turns the collected messages into an error, or `Ok` when nothing was collected.
    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("Authentication credentials were not provided.")]
    Unauthorized,

    #[error("Invalid token.")]
    InvalidToken,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Reject for ApiError {}

impl ApiError {
    pub fn bad_request(info: &str) -> Self {
        Self::BadRequest(info.to_string())
    }

    pub fn not_found(info: &str) -> Self {
        Self::NotFound(info.to_string())
    }

    pub fn forbidden() -> Self {
        Self::Forbidden(String::from(
            "You do not have permission to perform this action.",
        ))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body sent to the client.
    pub fn body(&self) -> serde_json::Value {
        match self {
            ApiError::Validation(errors) => serde_json::json!(errors),
            ApiError::BadRequest(info) => serde_json::json!({ "errors": info }),
            ApiError::Internal(_) => {
                serde_json::json!({ "detail": "A server error occurred." })
            }
            other => serde_json::json!({ "detail": other.to_string() }),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::RowNotFound => Self::not_found("Not found."),
            sqlx::Error::Database(e) if e.is_unique_violation() => {
                Self::bad_request("Object with these values already exists.")
            }
            sqlx::Error::Database(e) if e.is_check_violation() => {
                Self::bad_request("Value violates a constraint.")
            }
            sqlx::Error::Database(e) if e.is_foreign_key_violation() => {
                Self::bad_request("Referenced object does not exist.")
            }
            sqlx::Error::PoolTimedOut => Self::Internal(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::Internal(String::from("Pool closed")),
            e => Self::Internal(format!("{e}")),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(value: std::io::Error) -> Self {
        Self::Internal(format!("{value}"))
    }
}

impl From<argon2::password_hash::Error> for ApiError {
    fn from(value: argon2::password_hash::Error) -> Self {
        Self::Internal(format!("password hash: {value}"))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {info}")]
    Invalid { key: &'static str, info: String },
}
