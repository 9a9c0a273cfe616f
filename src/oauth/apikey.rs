use super::{RefreshAdapter, RefreshOutcome};
use crate::auth::Auth;
use crate::error::RelayGateError;
use async_trait::async_trait;

/// Static API keys have nothing to refresh; every call is a no-op success
/// so the Auth Manager's refresh coordinator can treat every provider
/// uniformly instead of special-casing the API-key kind.
pub struct ApiKeyRefreshAdapter;

#[async_trait]
impl RefreshAdapter for ApiKeyRefreshAdapter {
    async fn refresh(
        &self,
        _auth: &mut Auth,
        _client: &reqwest::Client,
    ) -> Result<RefreshOutcome, RelayGateError> {
        Ok(RefreshOutcome::RefreshedNoopAlreadyCurrent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Metadata, Provider, Quota, Runtime, Status};
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn refresh_is_always_a_noop() {
        let mut auth = Auth {
            id: "a1".into(),
            provider: Provider::Gemini,
            label: "gemini".into(),
            status: Status::Active,
            disabled: false,
            attributes: BTreeMap::new(),
            metadata: Metadata::default(),
            proxy_url: None,
            quota: Quota::default(),
            runtime: Runtime::default(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            last_refreshed_at: None,
            next_refresh_after: None,
        };
        let outcome = ApiKeyRefreshAdapter
            .refresh(&mut auth, &reqwest::Client::new())
            .await
            .unwrap();
        assert_eq!(outcome, RefreshOutcome::RefreshedNoopAlreadyCurrent);
    }
}
