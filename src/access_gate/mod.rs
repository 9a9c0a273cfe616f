//! Access Gate: verifies the identity of inbound clients before a request
//! reaches the Executor, per spec.md §4.8. A request carries exactly one
//! presented credential (bearer token, `x-goog-api-key` header, or `key`
//! query parameter); the gate resolves it against a pluggable set of access
//! providers and attaches the resolved identity to the request extensions.
//!
//! Grounded on the teacher's `server/guards/auth.rs` `RequireKeyAuth`
//! extractor, generalized from a single fixed key to a reconcilable list of
//! providers since our config accepts `keys.api-keys` as a `Vec<String>`
//! rather than one key.

use crate::config::Config;
use crate::error::RelayGateError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use std::collections::BTreeMap;
use std::sync::RwLock;
use subtle::ConstantTimeEq;

/// One named group of accepted inbound keys. Today the Config Loader only
/// produces a single `"default"` provider from `keys.api-keys`, but the
/// type keeps room for per-key provider tagging without a reshape.
#[derive(Debug, Clone)]
pub struct AccessProvider {
    pub name: String,
    pub keys: Vec<String>,
}

impl AccessProvider {
    fn contains(&self, presented: &str) -> bool {
        self.keys
            .iter()
            .any(|k| k.as_bytes().ct_eq(presented.as_bytes()).into())
    }
}

/// Resolved client identity, attached to the request so downstream handlers
/// and the Executor can log/attribute without re-parsing credentials.
#[derive(Debug, Clone)]
pub struct Identity {
    pub api_key: String,
    pub access_provider: String,
}

/// Live, reconcilable set of access providers. Holds a `Vec` rather than a
/// map keyed by provider name plus a name→provider map for O(1) lookup by
/// name during reconciliation; authentication itself is a linear scan since
/// the provider count is expected to stay small (tens, not thousands).
pub struct AccessGate {
    providers: RwLock<BTreeMap<String, AccessProvider>>,
}

const DEFAULT_PROVIDER: &str = "default";

impl AccessGate {
    pub fn from_config(config: &Config) -> Self {
        let gate = AccessGate {
            providers: RwLock::new(BTreeMap::new()),
        };
        gate.reconcile(config);
        gate
    }

    /// Rebuilds the provider list from `config`, replacing only providers
    /// whose key set actually changed rather than clearing and reinserting
    /// everything — so an in-flight `authenticate` call never observes an
    /// empty provider set during a config hot-reload.
    pub fn reconcile(&self, config: &Config) {
        let desired = Self::providers_from_config(config);
        let mut providers = self.providers.write().expect("access gate lock poisoned");

        providers.retain(|name, _| desired.contains_key(name));
        for (name, provider) in desired {
            match providers.get(&name) {
                Some(existing) if existing.keys == provider.keys => {}
                _ => {
                    providers.insert(name, provider);
                }
            }
        }
    }

    fn providers_from_config(config: &Config) -> BTreeMap<String, AccessProvider> {
        let mut providers = BTreeMap::new();
        if !config.keys.api_keys.is_empty() {
            providers.insert(
                DEFAULT_PROVIDER.to_string(),
                AccessProvider {
                    name: DEFAULT_PROVIDER.to_string(),
                    keys: config.keys.api_keys.clone(),
                },
            );
        }
        providers
    }

    /// Resolves a presented credential to an `Identity`. `None` means no
    /// credential was presented at all (Missing); `Some(Err(..))` never
    /// happens — an unrecognized key yields `InvalidApiKey` directly.
    pub fn authenticate(&self, presented: Option<&str>) -> Result<Identity, RelayGateError> {
        let Some(key) = presented else {
            return Err(RelayGateError::MissingApiKey);
        };

        let providers = self.providers.read().expect("access gate lock poisoned");
        for provider in providers.values() {
            if provider.contains(key) {
                return Ok(Identity {
                    api_key: key.to_string(),
                    access_provider: provider.name.clone(),
                });
            }
        }
        Err(RelayGateError::InvalidApiKey)
    }
}

/// Extracts a presented credential from headers (`Authorization: Bearer`,
/// `x-goog-api-key`) or the `key` query parameter, mirroring the four
/// inbound dialects' distinct conventions for carrying a client key.
pub fn extract_presented_key(parts: &Parts) -> Option<String> {
    if let Some(key) = parts
        .headers
        .get("x-goog-api-key")
        .and_then(|v| v.to_str().ok())
    {
        return Some(key.to_string());
    }
    if let Some(auth) = parts.headers.typed_get::<Authorization<Bearer>>() {
        return Some(auth.token().to_string());
    }
    parts.uri.query().and_then(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .find(|(k, _)| k == "key")
            .map(|(_, v)| v.into_owned())
    })
}

/// Axum extractor requiring a verified `Identity`, usable directly in route
/// handler signatures. `S` only needs to produce a `&AccessGate`; see
/// `server::RelayGateState` for the concrete state type.
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
    S: AsRef<AccessGate>,
{
    type Rejection = RelayGateError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let presented = extract_presented_key(parts);
        state.as_ref().authenticate(presented.as_deref())
    }
}
