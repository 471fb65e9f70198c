use crate::application_port::AuthError;
use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{debug, warn};
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let status = if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else if let Some(code) = err.find::<ApiErrorCode>() {
        code.status()
    } else if let Some(e) = err.find::<warp::body::BodyDeserializeError>() {
        debug!("rejected request body: {}", e);
        StatusCode::BAD_REQUEST
    } else if err.find::<warp::reject::InvalidQuery>().is_some()
        || err.find::<warp::reject::InvalidHeader>().is_some()
        || err.find::<warp::reject::UnsupportedMediaType>().is_some()
        || err.find::<warp::reject::LengthRequired>().is_some()
    {
        StatusCode::BAD_REQUEST
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        StatusCode::PAYLOAD_TOO_LARGE
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        StatusCode::METHOD_NOT_ALLOWED
    } else {
        warn!("unhandled rejection: {:?}", err);
        StatusCode::INTERNAL_SERVER_ERROR
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "success": false })),
        status,
    ))
}

#[derive(Debug, Clone, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Payload too large")]
    PayloadTooLarge,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl reject::Reject for ApiErrorCode {}

/// Status for a failed service call. Client-caused kinds are all 400 so callers
/// cannot tell which part of their request was wrong.
pub fn status_of(error: &AuthError) -> StatusCode {
    if error.is_server_side() {
        warn!(kind = error.kind(), "internal error: {}", error);
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        debug!(kind = error.kind(), "request rejected");
        StatusCode::BAD_REQUEST
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infrastructure_errors_are_5xx_and_the_rest_4xx() {
        assert_eq!(
            status_of(&AuthError::StoreUnavailable("down".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        for e in [
            AuthError::InvalidCredentials,
            AuthError::NoMatchingPair,
            AuthError::TokenMismatch,
            AuthError::Revoked,
            AuthError::RefreshExpired,
            AuthError::RotationConflict,
        ] {
            assert_eq!(status_of(&e), StatusCode::BAD_REQUEST, "{}", e.kind());
        }
    }
}
