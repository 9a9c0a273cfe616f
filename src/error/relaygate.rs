use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error as ThisError;

use super::IsRetryable;
use super::oauth::OauthError;

/// Unified error taxonomy for everything between an inbound request and an
/// upstream response. Each variant maps to exactly one kind from the error
/// handling design: client-caused, no credential available, credential
/// rejected by upstream, quota exhausted, transient, or an unexpected
/// internal fault.
#[derive(Debug, ThisError)]
pub enum RelayGateError {
    /// Malformed inbound payload or unknown model. Never retried.
    #[error("client error: {0}")]
    ClientError(String),

    /// No eligible credential in the live set for the requested model.
    #[error("no credential available for this model")]
    NoAvailableCredential,

    /// Access Gate: the client presented no credential at all.
    #[error("missing API key")]
    MissingApiKey,

    /// Access Gate: the client's credential doesn't match any configured
    /// provider's key set.
    #[error("invalid API key")]
    InvalidApiKey,

    /// Upstream rejected the credential (expired/invalid token, revoked key).
    #[error("upstream rejected credential with status: {0}")]
    AuthInvalid(StatusCode),

    /// Upstream reported a rate-limit/quota signal.
    #[error("upstream quota exhausted with status: {0}")]
    QuotaExhausted(StatusCode),

    /// Network error, 5xx, or timeout — eligible for retry on another Auth.
    #[error("transient upstream error with status: {0}")]
    UpstreamStatus(StatusCode),

    #[error(transparent)]
    Oauth(#[from] OauthError),

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("stream protocol error: {0}")]
    StreamProtocolError(String),

    #[error("missing access token; refresh first")]
    MissingAccessToken,

    #[error("missing expiry; refresh first")]
    MissingExpiry,

    /// Fatal — unexpected internal state (translator bug, poisoned lock, …).
    #[error("unexpected internal error: {0}")]
    UnexpectedError(String),
}

impl IntoResponse for RelayGateError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_body) = match self {
            RelayGateError::UnexpectedError(_)
            | RelayGateError::Oauth(OauthError::Other { .. })
            | RelayGateError::IoError(_)
            | RelayGateError::MissingAccessToken
            | RelayGateError::MissingExpiry => {
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                let body = ApiErrorObject {
                    code: "INTERNAL_ERROR".to_string(),
                    message: "An internal server error occurred.".to_string(),
                    details: None,
                };
                (status, body)
            }

            RelayGateError::ClientError(message) => {
                let status = StatusCode::BAD_REQUEST;
                let body = ApiErrorObject {
                    code: "CLIENT_ERROR".to_string(),
                    message,
                    details: None,
                };
                (status, body)
            }

            RelayGateError::NoAvailableCredential => {
                let status = StatusCode::SERVICE_UNAVAILABLE;
                let body = ApiErrorObject {
                    code: "NO_CREDENTIAL".to_string(),
                    message: "No available credentials to process the request.".to_string(),
                    details: None,
                };
                (status, body)
            }

            RelayGateError::MissingApiKey => {
                let status = StatusCode::UNAUTHORIZED;
                let body = ApiErrorObject {
                    code: "UNAUTHORIZED".to_string(),
                    message: "Missing API key".to_string(),
                    details: None,
                };
                (status, body)
            }

            RelayGateError::InvalidApiKey => {
                let status = StatusCode::UNAUTHORIZED;
                let body = ApiErrorObject {
                    code: "UNAUTHORIZED".to_string(),
                    message: "Invalid API key".to_string(),
                    details: None,
                };
                (status, body)
            }

            RelayGateError::Oauth(OauthError::Flow {
                code,
                message,
                details,
            }) => {
                let status = StatusCode::FORBIDDEN;
                let body = ApiErrorObject {
                    code,
                    message,
                    details,
                };
                (status, body)
            }

            RelayGateError::JsonError(_) | RelayGateError::Oauth(OauthError::Parse { .. }) => {
                let status = StatusCode::BAD_GATEWAY;
                let body = ApiErrorObject {
                    code: "BAD_UPSTREAM_PAYLOAD".to_string(),
                    message: "Failed to parse upstream response.".to_string(),
                    details: None,
                };
                (status, body)
            }

            RelayGateError::StreamProtocolError(_)
            | RelayGateError::Oauth(OauthError::Request(_))
            | RelayGateError::Oauth(OauthError::ServerResponse { .. })
            | RelayGateError::ReqwestError(_)
            | RelayGateError::UrlError(_) => {
                let status = StatusCode::BAD_GATEWAY;
                let body = ApiErrorObject {
                    code: "UPSTREAM_ERROR".to_string(),
                    message: "Upstream service error.".to_string(),
                    details: None,
                };
                (status, body)
            }

            RelayGateError::AuthInvalid(code) => (
                code,
                ApiErrorObject {
                    code: "AUTH_INVALID".to_string(),
                    message: "Upstream rejected the credential.".to_string(),
                    details: None,
                },
            ),

            RelayGateError::QuotaExhausted(code) => (
                code,
                ApiErrorObject {
                    code: "QUOTA_EXHAUSTED".to_string(),
                    message: "Upstream quota exhausted.".to_string(),
                    details: None,
                },
            ),

            RelayGateError::UpstreamStatus(code)
            | RelayGateError::Oauth(OauthError::UpstreamStatus(code)) => {
                let (err_code, msg) = match code {
                    StatusCode::TOO_MANY_REQUESTS => {
                        ("RATE_LIMIT", "Upstream rate limit exceeded.")
                    }
                    StatusCode::UNAUTHORIZED => ("UNAUTHORIZED", "Upstream authentication failed."),
                    StatusCode::FORBIDDEN => ("FORBIDDEN", "Upstream permission denied."),
                    StatusCode::NOT_FOUND => ("NOT_FOUND", "Upstream resource not found."),
                    _ => ("UPSTREAM_ERROR", "An upstream error occurred."),
                };
                (
                    code,
                    ApiErrorObject {
                        code: err_code.to_string(),
                        message: msg.to_string(),
                        details: None,
                    },
                )
            }
        };
        (status, Json(ApiErrorBody { inner: error_body })).into_response()
    }
}

/// Standardized API error response payload, always rendered in the inbound
/// dialect's envelope by the route handler even when this struct is shared.
#[derive(Serialize)]
pub struct ApiErrorObject {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Serialize)]
pub struct ApiErrorBody {
    #[serde(rename = "error")]
    pub inner: ApiErrorObject,
}

impl IsRetryable for RelayGateError {
    fn is_retryable(&self) -> bool {
        match self {
            RelayGateError::ReqwestError(_) => true,
            RelayGateError::UpstreamStatus(_) | RelayGateError::QuotaExhausted(_) => true,
            RelayGateError::AuthInvalid(_) => true,
            RelayGateError::Oauth(OauthError::ServerResponse { .. }) => false,
            RelayGateError::UnexpectedError(_) => false,
            RelayGateError::ClientError(_) => false,
            RelayGateError::MissingApiKey | RelayGateError::InvalidApiKey => false,
            _ => false,
        }
    }
}
