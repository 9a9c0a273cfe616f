//! Executor: translate -> dispatch -> translate, per spec.md §4.6. Given an
//! `Auth` and an inbound request, runs the provider's capability-triple
//! translators, applies the Auth's credential to the outbound HTTP request,
//! and classifies any fault for the Auth Manager's state machine.
//!
//! Grounded on the teacher's `server/router.rs` (`PolluxState::build_client`)
//! for HTTP client construction and `providers/policy.rs`
//! (`ActionForError`/`classify_upstream_error`) for fault classification,
//! generalized from per-provider structured error bodies to the status-code
//! fallback every upstream shares.

mod stream_bridge;

pub use stream_bridge::stream_exchange;

use crate::auth::{Auth, Provider};
use crate::config::BasicConfig;
use crate::error::RelayGateError;
use crate::provider_registry::ProviderRegistry;
use crate::translator::{self, Dialect, IrRequest};
use moka::sync::Cache;
use reqwest::StatusCode;
use std::time::Duration;

/// One inbound exchange the Executor is asked to run, already identified by
/// dialect and target model by the caller (the Auth Manager, which also
/// picked `auth`).
pub struct ExecutionRequest<'a> {
    pub inbound_dialect: Dialect,
    pub model: &'a str,
    pub body: &'a [u8],
}

/// How one Executor attempt failed. Mirrors §4.5's quota-state-machine
/// inputs and retry policy exactly so the Auth Manager never needs to
/// re-derive a classification from a raw status code.
#[derive(Debug)]
pub enum Failure {
    /// Connection error, 5xx, or 429 — eligible for retry on another Auth.
    Transient(RelayGateError),
    /// Explicit quota/rate-limit signal distinct from a generic 429 retry
    /// (kept separate so the Manager can apply the configured backoff).
    Quota(RelayGateError),
    /// Upstream rejected the credential (401) — triggers refresh-then-retry.
    AuthInvalid(RelayGateError),
    /// 4xx other than 401/429 — surfaced to the client immediately.
    ClientError(RelayGateError),
    /// Internal/translator fault — never retried.
    Fatal(RelayGateError),
}

impl Failure {
    pub fn into_inner(self) -> RelayGateError {
        match self {
            Failure::Transient(e)
            | Failure::Quota(e)
            | Failure::AuthInvalid(e)
            | Failure::ClientError(e)
            | Failure::Fatal(e) => e,
        }
    }

    /// Whether the Auth Manager's retry policy (§4.5: "applied only for
    /// transient upstream failures") permits re-entry on a fresh lease.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Failure::Transient(_) | Failure::Quota(_))
    }
}

/// Shared HTTP dispatch layer. One default client built from the config's
/// top-level proxy; per-Auth proxy overrides get their own cached client
/// rather than rebuilding one per request.
pub struct Executor {
    default_client: reqwest::Client,
    proxied_clients: Cache<String, reqwest::Client>,
}

const USER_AGENT: &str = concat!("relaygate/", env!("CARGO_PKG_VERSION"));

impl Executor {
    pub fn new(basic: &BasicConfig) -> Self {
        Self {
            default_client: build_client(basic.proxy_url.as_ref()),
            proxied_clients: Cache::builder()
                .max_capacity(64)
                .time_to_idle(Duration::from_secs(3600))
                .build(),
        }
    }

    fn client_for(&self, auth: &Auth) -> reqwest::Client {
        let Some(proxy) = &auth.proxy_url else {
            return self.default_client.clone();
        };
        if let Some(client) = self.proxied_clients.get(proxy) {
            return client;
        }
        let url = url::Url::parse(proxy).ok();
        let client = build_client(url.as_ref());
        self.proxied_clients.insert(proxy.clone(), client.clone());
        client
    }

    /// Runs one unary exchange: decode the inbound request, apply
    /// provider-specific normalisations, encode to the upstream dialect,
    /// dispatch, and translate the response back to the inbound dialect.
    pub async fn execute_unary(
        &self,
        auth: &Auth,
        registry: &ProviderRegistry,
        request: &ExecutionRequest<'_>,
    ) -> Result<Vec<u8>, Failure> {
        let triple = registry.capability_triple(&auth.provider);
        let ir = translator::decode_request(request.inbound_dialect, request.body)
            .map_err(Failure::Fatal)?;
        let ir = normalize_request(ir, auth, registry, request.model);
        let upstream_body =
            translator::encode_request(triple.request_translator, &ir).map_err(Failure::Fatal)?;
        let upstream_body = reshape_for_provider(&auth.provider, upstream_body).map_err(Failure::Fatal)?;

        let url = upstream_url(auth, registry, request.model, UrlMode::Unary).map_err(Failure::Fatal)?;
        let response = self
            .dispatch(auth, &url, &upstream_body)
            .await
            .map_err(Failure::Transient)?;

        if !response.status().is_success() {
            return Err(classify_failed_response(response.status(), response_body(response).await));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Failure::Transient(RelayGateError::ReqwestError(e)))?;
        let ir_response =
            translator::decode_response(triple.response_translator, &bytes).map_err(Failure::Fatal)?;
        translator::encode_response(request.inbound_dialect, &ir_response).map_err(Failure::Fatal)
    }

    /// Runs a token-count exchange (Anthropic's `/v1/messages/count_tokens`,
    /// per spec.md §6's inbound surface). Only the request side goes through
    /// the Translator Pipeline; the count response upstream returns is a
    /// small provider-native object with no IR counterpart, so it is relayed
    /// to the client verbatim rather than round-tripped through a response
    /// translator.
    pub async fn execute_count(
        &self,
        auth: &Auth,
        registry: &ProviderRegistry,
        request: &ExecutionRequest<'_>,
    ) -> Result<Vec<u8>, Failure> {
        let triple = registry.capability_triple(&auth.provider);
        let ir = translator::decode_request(request.inbound_dialect, request.body)
            .map_err(Failure::Fatal)?;
        let ir = normalize_request(ir, auth, registry, request.model);
        let upstream_body =
            translator::encode_request(triple.request_translator, &ir).map_err(Failure::Fatal)?;
        let upstream_body = reshape_for_provider(&auth.provider, upstream_body).map_err(Failure::Fatal)?;

        let url = upstream_url(auth, registry, request.model, UrlMode::Count).map_err(Failure::Fatal)?;
        let response = self
            .dispatch(auth, &url, &upstream_body)
            .await
            .map_err(Failure::Transient)?;

        if !response.status().is_success() {
            return Err(classify_failed_response(response.status(), response_body(response).await));
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| Failure::Transient(RelayGateError::ReqwestError(e)))
    }

    /// Issues the upstream POST with the Auth's credential applied, per the
    /// provider-specific convention (query-param key for Gemini API keys,
    /// bearer token otherwise, plus any per-Auth custom headers).
    async fn dispatch(
        &self,
        auth: &Auth,
        url: &url::Url,
        body: &[u8],
    ) -> Result<reqwest::Response, RelayGateError> {
        let client = self.client_for(auth);
        let mut request = client
            .post(url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .body(body.to_vec());
        request = apply_credential(request, auth);
        request.send().await.map_err(RelayGateError::ReqwestError)
    }
}

fn build_client(proxy: Option<&url::Url>) -> reqwest::Client {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(10 * 60))
        .http2_adaptive_window(true);
    if let Some(proxy_url) = proxy {
        let proxy = reqwest::Proxy::all(proxy_url.as_str()).expect("invalid proxy url");
        builder = builder.proxy(proxy);
    }
    builder.build().expect("failed to build reqwest client")
}

/// Applies the Auth's credential and custom headers to an outbound request,
/// per §4.6 step 2. Gemini's API carries the key as a `key` query parameter;
/// every other provider (including Gemini-CLI/Vertex OAuth) uses a bearer
/// token.
fn apply_credential(request: reqwest::RequestBuilder, auth: &Auth) -> reqwest::RequestBuilder {
    let mut request = request;
    for (name, value) in auth.attributes.iter().filter_map(|(k, v)| {
        k.strip_prefix("header:").map(|name| (name, v))
    }) {
        request = request.header(name, value);
    }

    let token = auth
        .metadata
        .access_token
        .clone()
        .or_else(|| auth.metadata.api_key.clone());
    let Some(token) = token else {
        return request;
    };

    match &auth.provider {
        Provider::Gemini if auth.metadata.access_token.is_none() => {
            request.query(&[("key", token)])
        }
        _ => request.bearer_auth(token),
    }
}

/// Which upstream action a call targets; see `upstream_url`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UrlMode {
    Unary,
    Streaming,
    Count,
}

/// Builds the upstream URL for a unary, streaming, or count-tokens call.
/// `base_url` defaults to the provider's well-known endpoint unless the Auth
/// overrides it (config-derived OpenAI-compatible/Vertex entries always do).
fn upstream_url(
    auth: &Auth,
    registry: &ProviderRegistry,
    model: &str,
    mode: UrlMode,
) -> Result<url::Url, RelayGateError> {
    let _ = registry;
    let base = auth
        .attributes
        .get("base_url")
        .cloned()
        .unwrap_or_else(|| crate::provider_registry::catalog::default_base_url(&auth.provider).to_string());

    let path = match &auth.provider {
        Provider::Gemini | Provider::GeminiCli | Provider::GeminiWeb | Provider::Vertex => {
            let action = match mode {
                UrlMode::Streaming => "streamGenerateContent",
                UrlMode::Count => "countTokens",
                UrlMode::Unary => "generateContent",
            };
            // Gemini's `streamGenerateContent` returns a JSON array by
            // default; only `?alt=sse` switches the wire format to the
            // `data:`-framed SSE stream `stream_bridge`'s eventsource
            // decoder expects.
            match mode {
                UrlMode::Streaming => format!("/v1beta/models/{model}:{action}?alt=sse"),
                _ => format!("/v1beta/models/{model}:{action}"),
            }
        }
        Provider::Claude => match mode {
            UrlMode::Count => "/v1/messages/count_tokens".to_string(),
            _ => "/v1/messages".to_string(),
        },
        Provider::Codex => "/responses".to_string(),
        Provider::Qwen | Provider::Iflow | Provider::Other(_) => "/chat/completions".to_string(),
    };

    url::Url::parse(&format!("{base}{path}")).map_err(RelayGateError::UrlError)
}

/// Applies provider-specific request normalisations: thinking-budget
/// clamping via the model's registered `Thinking` capability and model-name
/// rewriting to the upstream's canonical ID (identity today — every
/// registered model name already matches its upstream ID).
fn normalize_request(
    mut ir: IrRequest,
    auth: &Auth,
    registry: &ProviderRegistry,
    model: &str,
) -> IrRequest {
    let _ = auth;
    if let Some(info) = registry.model_info(model) {
        if let Some(budget) = ir.thinking_budget {
            ir.thinking_budget = Some(info.thinking.normalize_budget(budget));
        }
    }
    ir.model = model.to_string();
    ir
}

/// Codex's upstream (`chatgpt.com/backend-api/codex`) does not accept a
/// plain OpenAI Responses body: it requires `store=false`/`stream=true`/
/// `parallel_tool_calls=true` to be forced, system messages folded into
/// `instructions`, and `reasoning.encrypted_content` added to `include`
/// whenever `reasoning` is present, per the teacher's own Codex client.
/// Every other provider's translator output already *is* its upstream wire
/// shape, so this is a no-op passthrough for them.
fn reshape_for_provider(provider: &Provider, body: Vec<u8>) -> Result<Vec<u8>, RelayGateError> {
    if !matches!(provider, Provider::Codex) {
        return Ok(body);
    }
    let generic: relaygate_schema::openai::OpenaiRequestBody = serde_json::from_slice(&body)?;
    let codex: relaygate_schema::codex::CodexRequestBody = generic.into();
    Ok(serde_json::to_vec(&codex)?)
}

async fn response_body(response: reqwest::Response) -> String {
    response
        .bytes()
        .await
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .unwrap_or_default()
}

/// Classifies a non-2xx upstream response by status code, generalised from
/// the teacher's `action_from_status` fallback (the structured-error-body
/// branch is provider-specific and out of scope for this non-exhaustive
/// translator slice — see `SPEC_FULL.md` §4.6 note).
fn classify_failed_response(status: StatusCode, body: String) -> Failure {
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            Failure::Quota(RelayGateError::QuotaExhausted(status))
        }
        StatusCode::UNAUTHORIZED => Failure::AuthInvalid(RelayGateError::AuthInvalid(status)),
        s if s.is_server_error() => Failure::Transient(RelayGateError::UpstreamStatus(s)),
        s if s.is_client_error() => {
            Failure::ClientError(RelayGateError::ClientError(format!("upstream {s}: {body}")))
        }
        s => Failure::Transient(RelayGateError::UpstreamStatus(s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Metadata, Quota, Runtime, Status};
    use std::collections::BTreeMap;

    fn sample_auth(provider: Provider) -> Auth {
        Auth {
            id: "a1".into(),
            provider,
            label: "l".into(),
            status: Status::Active,
            disabled: false,
            attributes: BTreeMap::new(),
            metadata: Metadata {
                api_key: Some("sk-test".into()),
                ..Default::default()
            },
            proxy_url: None,
            quota: Quota::default(),
            runtime: Runtime::default(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            last_refreshed_at: None,
            next_refresh_after: None,
        }
    }

    #[test]
    fn gemini_url_uses_generate_content_action() {
        let auth = sample_auth(Provider::Gemini);
        let registry = ProviderRegistry::new();
        let url = upstream_url(&auth, &registry, "gemini-2.5-pro", UrlMode::Unary).unwrap();
        assert!(url.path().ends_with(":generateContent"));
    }

    #[test]
    fn gemini_streaming_url_uses_stream_action() {
        let auth = sample_auth(Provider::Gemini);
        let registry = ProviderRegistry::new();
        let url = upstream_url(&auth, &registry, "gemini-2.5-pro", UrlMode::Streaming).unwrap();
        assert!(url.path().ends_with(":streamGenerateContent"));
    }

    #[test]
    fn gemini_streaming_url_requests_sse_framing() {
        let auth = sample_auth(Provider::Gemini);
        let registry = ProviderRegistry::new();
        let url = upstream_url(&auth, &registry, "gemini-2.5-pro", UrlMode::Streaming).unwrap();
        assert_eq!(url.query(), Some("alt=sse"));

        let unary = upstream_url(&auth, &registry, "gemini-2.5-pro", UrlMode::Unary).unwrap();
        assert_eq!(unary.query(), None);
    }

    #[test]
    fn reshape_for_provider_is_noop_for_non_codex() {
        let body = br#"{"model":"gemini-2.5-pro"}"#.to_vec();
        let reshaped = reshape_for_provider(&Provider::Gemini, body.clone()).unwrap();
        assert_eq!(reshaped, body);
    }

    #[test]
    fn reshape_for_provider_forces_codex_wire_shape() {
        let body = serde_json::to_vec(&serde_json::json!({
            "model": "gpt-5-codex",
            "input": [],
            "parallel_tool_calls": false,
            "store": true,
            "stream": false,
        }))
        .unwrap();
        let reshaped = reshape_for_provider(&Provider::Codex, body).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&reshaped).unwrap();
        assert_eq!(value["store"], false);
        assert_eq!(value["stream"], true);
        assert_eq!(value["parallel_tool_calls"], true);
    }

    #[test]
    fn codex_url_targets_responses_path() {
        let auth = sample_auth(Provider::Codex);
        let registry = ProviderRegistry::new();
        let url = upstream_url(&auth, &registry, "gpt-5", UrlMode::Unary).unwrap();
        assert!(url.path().ends_with("/responses"));
    }

    #[test]
    fn classify_too_many_requests_as_quota() {
        let failure = classify_failed_response(StatusCode::TOO_MANY_REQUESTS, String::new());
        assert!(matches!(failure, Failure::Quota(_)));
        assert!(failure.is_retryable());
    }

    #[test]
    fn classify_unauthorized_as_auth_invalid_and_not_retryable_by_default_policy() {
        let failure = classify_failed_response(StatusCode::UNAUTHORIZED, String::new());
        assert!(matches!(failure, Failure::AuthInvalid(_)));
        assert!(!failure.is_retryable());
    }

    #[test]
    fn classify_bad_request_as_client_error() {
        let failure = classify_failed_response(StatusCode::BAD_REQUEST, "bad".into());
        assert!(matches!(failure, Failure::ClientError(_)));
    }

    #[test]
    fn classify_server_error_as_transient() {
        let failure = classify_failed_response(StatusCode::BAD_GATEWAY, String::new());
        assert!(failure.is_retryable());
    }
}
