use axum::{
    http, Json,
    response::{IntoResponse, Response},
};
use ctod_core::ErrorKind;
use serde_json::json;

use crate::Error;

/// Our app's top level error type.
#[derive(Debug)]
pub struct AppError(pub Error);

impl From<Error> for AppError {
    fn from(inner: Error) -> Self {
        AppError(inner)
    }
}

/// Maps `ErrorKind` to an HTTP status code per spec.md 7.
fn status_for(kind: ErrorKind) -> http::StatusCode {
    match kind {
        ErrorKind::BadRequest => http::StatusCode::BAD_REQUEST,
        ErrorKind::NoSuchDataset => http::StatusCode::NOT_FOUND,
        ErrorKind::UnsafeRequest => http::StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::SourceUnavailable => http::StatusCode::BAD_GATEWAY,
        ErrorKind::Timeout => http::StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Overloaded => http::StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::OutOfBounds | ErrorKind::MeshingFailed | ErrorKind::EncodingFailed | ErrorKind::Internal => http::StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let err = self.0;
        let kind = err.kind();
        let status = status_for(kind);

        if status.is_server_error() {
            log::error!("{kind}: {err}");
        } else {
            log::debug!("{kind}: {err}");
        }

        let body = Json(json!({
            "error": kind.to_string(),
            "message": err.to_string(),
        }));

        (status, body).into_response()
    }
}
