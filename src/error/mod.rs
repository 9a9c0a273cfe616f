mod oauth;
mod relaygate;

pub use oauth::OauthError;
pub use relaygate::{ApiErrorBody, ApiErrorObject, RelayGateError};

/// Whether retrying the same operation again has any chance of succeeding.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}
