//! Refresh-only OAuth adapters, one per `RefreshAdapter` tag in the
//! Provider Registry's capability triple. Initiation (device codes, PKCE,
//! browser callbacks) is out of scope per spec.md §1 — only refreshing
//! already-issued tokens is implemented here.

mod apikey;
mod codex;
mod geminicli;

pub use apikey::ApiKeyRefreshAdapter;
pub use codex::CodexRefreshAdapter;
pub use geminicli::GeminiCliRefreshAdapter;

use crate::auth::Auth;
use crate::error::RelayGateError;
use async_trait::async_trait;

/// Observable outcome of one refresh attempt, per §4.9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    RefreshedOk,
    RefreshedNoopAlreadyCurrent,
    FailedTransient,
    FailedPermanent,
}

/// One provider's refresh strategy. Implementors mutate `auth` in place
/// (via `Auth::apply_oauth_patch`) on success; the caller (the Auth
/// Manager's refresh coordinator) is responsible for the single-flight
/// mutex and the Token Store write-through.
#[async_trait]
pub trait RefreshAdapter: Send + Sync {
    async fn refresh(
        &self,
        auth: &mut Auth,
        client: &reqwest::Client,
    ) -> Result<RefreshOutcome, RelayGateError>;
}

/// Builds an extra-token-fields-aware OAuth2 client sharing the standard
/// token response shape every Google/OpenAI-style refresh endpoint uses.
pub(crate) mod client {
    use oauth2::basic::{
        BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
        BasicTokenType,
    };
    use oauth2::{
        AuthUrl, Client as OAuth2Client, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
        ExtraTokenFields, StandardRevocableToken, StandardTokenResponse, TokenUrl,
    };
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, Deserialize, Serialize)]
    pub(crate) struct TokenExtraFields {
        pub id_token: Option<String>,
        #[serde(flatten)]
        pub extra: BTreeMap<String, serde_json::Value>,
    }

    impl ExtraTokenFields for TokenExtraFields {}

    pub(crate) type TokenResponse = StandardTokenResponse<TokenExtraFields, BasicTokenType>;

    pub(crate) type RefreshClient = OAuth2Client<
        BasicErrorResponse,
        TokenResponse,
        BasicTokenIntrospectionResponse,
        StandardRevocableToken,
        BasicRevocationErrorResponse,
        EndpointSet,
        EndpointNotSet,
        EndpointNotSet,
        EndpointNotSet,
        EndpointSet,
    >;

    /// Builds a refresh-only OAuth2 client: auth URL is required by the
    /// type but never hit (no authorization code flow happens here).
    pub(crate) fn build(
        client_id: &str,
        client_secret: Option<&str>,
        auth_url: &str,
        token_url: &str,
    ) -> Result<RefreshClient, oauth2::url::ParseError> {
        let mut client = OAuth2Client::new(ClientId::new(client_id.to_string()))
            .set_auth_uri(AuthUrl::new(auth_url.to_string())?)
            .set_token_uri(TokenUrl::new(token_url.to_string())?);
        if let Some(secret) = client_secret {
            client = client.set_client_secret(ClientSecret::new(secret.to_string()));
        }
        Ok(client)
    }
}
