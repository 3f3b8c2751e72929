use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Errors raised while pulling a channel's history from one of the two systems.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {system} failed: {source}")]
    RequestError {
        system: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{system} responded with status {status}")]
    BadStatus {
        system: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("{system} returned a body we could not read: {reason}")]
    MalformedBody {
        system: &'static str,
        reason: String,
    },
    #[error("cannot build a {system} request url: {reason}")]
    InvalidUrl {
        system: &'static str,
        reason: String,
    },
    #[error("{system} kept paging past {pages} pages")]
    TooManyPages { system: &'static str, pages: usize },
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("team directory request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("team directory responded with status {0}")]
    BadStatus(reqwest::StatusCode),
    #[error("team directory returned a body we could not read: {0}")]
    MalformedBody(String),
}

#[derive(Error, Debug)]
pub enum TargetFileError {
    #[error("file is empty")]
    Empty,
    #[error("failed to parse JSON file: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("invalid JSON format: expected object or array")]
    UnexpectedShape,
    #[error("JSON file must contain teamIds and/or channelIds")]
    NoTargets,
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ThresholdError {
    #[error("failed to read thresholds file: {0}")]
    Io(#[from] std::io::Error),
    #[error("thresholds file is not a JSON object of numbers: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("no channels or teams provided for comparison")]
    NoTargets,
    #[error("no teams known and discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("missing filePath query parameter")]
    MissingFilePath,
    #[error(transparent)]
    InvalidTargets(#[from] TargetFileError),
    #[error(transparent)]
    ComparisonFailed(#[from] SchedulerError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::MissingFilePath => (StatusCode::BAD_REQUEST, "Missing file path"),
            ApiError::InvalidTargets(TargetFileError::Io(_)) => {
                (StatusCode::BAD_REQUEST, "Failed to read file")
            }
            ApiError::InvalidTargets(_) => (StatusCode::BAD_REQUEST, "Invalid file"),
            ApiError::ComparisonFailed(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Comparison failed")
            }
        };

        let body = ErrorBody {
            error,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::MissingFilePath.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(TargetFileError::Empty).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(SchedulerError::NoTargets)
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
