use std::any::Any;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use odata_core::{pipeline::rejection_message, Error as ODataError};
use serde::{Deserialize, Serialize};

/// Body of every 400 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessage {
    pub error_message: String,
}

/// Axum response wrapper that renders [`ErrorMessage`] with a status.
#[derive(Debug, Clone)]
pub struct ErrorResponse {
    pub status: StatusCode,
    pub body: ErrorMessage,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorMessage {
                error_message: message.into(),
            },
        }
    }

    pub fn message(&self) -> &str {
        &self.body.error_message
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub fn bad_request(message: impl Into<String>) -> ErrorResponse {
    ErrorResponse::new(StatusCode::BAD_REQUEST, message)
}

/// Map OData errors to 400 responses. Engine faults are logged and not echoed.
pub fn odata_error_to_response(e: &ODataError) -> ErrorResponse {
    bad_request(rejection_message(e))
}

type Panic = Box<dyn Any + Send + 'static>;

/// `CatchPanicLayer` handler: a panicking handler still answers with a 400 body.
pub fn catch_panic(err: Panic) -> Response {
    if let Some(panic) = err.downcast_ref::<String>() {
        tracing::error!("handler panic: {}", panic);
    } else if let Some(panic) = err.downcast_ref::<&str>() {
        tracing::error!("handler panic: {}", panic);
    } else {
        tracing::error!("handler panic: unknown panic type");
    }

    bad_request("The request could not be processed").into_response()
}
