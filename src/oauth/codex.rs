use super::client::{self, TokenResponse};
use super::{RefreshAdapter, RefreshOutcome};
use crate::auth::Auth;
use crate::error::{IsRetryable, OauthError, RelayGateError};
use backon::{ExponentialBuilder, Retryable};
use oauth2::{RefreshToken, TokenResponse as _};
use std::sync::LazyLock;
use std::time::Duration;

/// Fixed Codex CLI OAuth client id (public client, no secret) — matches the
/// `codex` CLI's own OAuth app registration.
const CODEX_CLIENT_ID: &str = "app_EMoamEEZ73f0CkXaXp7hrann";
const OPENAI_AUTH_URL: &str = "https://auth.openai.com/oauth/authorize";
const OPENAI_TOKEN_URL: &str = "https://auth.openai.com/oauth/token";

static CLIENT: LazyLock<client::RefreshClient> = LazyLock::new(|| {
    client::build(CODEX_CLIENT_ID, None, OPENAI_AUTH_URL, OPENAI_TOKEN_URL)
        .expect("valid OpenAI OAuth endpoints")
});

/// Refreshes Codex (ChatGPT-backed) credentials against OpenAI's OAuth2
/// token endpoint.
pub struct CodexRefreshAdapter;

#[async_trait::async_trait]
impl RefreshAdapter for CodexRefreshAdapter {
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
        if let Some(id_token) = &token.extra_fields().id_token
            && let Some(claims) = crate::utils::jwt::decode_claims(id_token)
            && let Some(account_id) = claims
                .get("https://api.openai.com/auth")
                .and_then(|auth| auth.get("chatgpt_account_id"))
                .and_then(|v| v.as_str())
        {
            payload["account_id"] = serde_json::Value::String(account_id.to_string());
        }

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
