use super::client::{self, TokenResponse};
use super::{RefreshAdapter, RefreshOutcome};
use crate::auth::Auth;
use crate::error::{IsRetryable, OauthError, RelayGateError};
use crate::utils::jwt::attach_email_from_id_token;
use backon::{ExponentialBuilder, Retryable};
use oauth2::{RefreshToken, TokenResponse as _};
use std::sync::LazyLock;
use std::time::Duration;

/// Public OAuth client id/secret for the Gemini CLI installed app, the same
/// pair every `gemini` CLI install ships — not a secret in the
/// confidential-client sense, so it is a plain constant rather than a
/// config field or an `env!`-sourced build-time value.
const GEMINI_CLI_CLIENT_ID: &str =
    "681255809395-oo8ft2oprdrnp9e3aqf6av3hmdib135j.apps.googleusercontent.com";
const GEMINI_CLI_CLIENT_SECRET: &str = "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";

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

static CLIENT: LazyLock<client::RefreshClient> = LazyLock::new(|| {
    client::build(
        GEMINI_CLI_CLIENT_ID,
        Some(GEMINI_CLI_CLIENT_SECRET),
        GOOGLE_AUTH_URL,
        GOOGLE_TOKEN_URL,
    )
    .expect("valid Google OAuth endpoints")
});

/// Refreshes Gemini-CLI and Vertex-via-Gemini-CLI credentials against
/// Google's OAuth2 token endpoint. Gemini-CLI virtual children delegate
/// here through their shared parent (see `auth_manager::refresh`).
pub struct GeminiCliRefreshAdapter;

#[async_trait::async_trait]
impl RefreshAdapter for GeminiCliRefreshAdapter {
    async fn refresh(
        &self,
        auth: &mut Auth,
        client: &reqwest::Client,
    ) -> Result<RefreshOutcome, RelayGateError> {
        let Some(refresh_token) = auth.metadata.refresh_token.clone() else {
            return Ok(RefreshOutcome::FailedPermanent);
        };

        let policy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(3))
            .with_max_times(2);

        let result: Result<TokenResponse, OauthError> = (|| async {
            CLIENT
                .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
                .request_async(client)
                .await
                .map_err(OauthError::from)
        })
        .retry(policy)
        .when(IsRetryable::is_retryable)
        .await;

        let token = match result {
            Ok(token) => token,
            Err(oauth_err) => return Ok(classify_failure(&oauth_err)),
        };

        let mut payload = serde_json::json!({
            "access_token": token.access_token().secret(),
            "expires_in": token.expires_in().map(|d| d.as_secs() as i64).unwrap_or(3600),
        });
        if let Some(refresh_token) = token.refresh_token() {
            payload["refresh_token"] = serde_json::Value::String(refresh_token.secret().clone());
        }
        if let Some(id_token) = &token.extra_fields().id_token {
            payload["id_token"] = serde_json::Value::String(id_token.clone());
        }
        attach_email_from_id_token(&mut payload);

        auth.apply_oauth_patch(payload)
            .map_err(RelayGateError::JsonError)?;
        Ok(RefreshOutcome::RefreshedOk)
    }
}

fn classify_failure(err: &OauthError) -> RefreshOutcome {
    use crate::error::IsRetryable;
    match err {
        OauthError::ServerResponse { .. } => RefreshOutcome::FailedPermanent,
        other if other.is_retryable() => RefreshOutcome::FailedTransient,
        _ => RefreshOutcome::FailedPermanent,
    }
}
