//! Refresh Coordinator (logically part of the Auth Manager, per spec.md
//! §4.9): provider-adapter dispatch plus a process-wide rate limiter so a
//! burst of simultaneous refresh needs never hammers an upstream OAuth
//! endpoint. Single-flight itself lives in `auth_manager::mod` (one mutex
//! per Auth, held for the duration of one call here); this module only
//! knows how to run a single refresh attempt.
//!
//! Grounded on the teacher's `providers/codex/workers/refresher.rs`, which
//! wraps its OAuth token-endpoint call in a `governor::RateLimiter`;
//! generalized from a dedicated actor-per-provider worker pool to a plain
//! async function the Manager calls directly under the Auth's own
//! `runtime.refresh_lock`, since this Manager isn't actor-based.

use crate::auth::Auth;
use crate::oauth::{
    ApiKeyRefreshAdapter, CodexRefreshAdapter, GeminiCliRefreshAdapter, RefreshAdapter, RefreshOutcome,
};
use crate::provider_registry::catalog::RefreshAdapter as RefreshAdapterTag;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

pub type RefreshLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// One token bucket shared by every Auth's refresh attempt; `per_second` is
/// deliberately small (OAuth token endpoints are not meant for bursts).
pub fn build_limiter(per_second: u32) -> Arc<RefreshLimiter> {
    let per_second = per_second.max(1);
    Arc::new(RateLimiter::direct(Quota::per_second(
        NonZeroU32::new(per_second).expect("per_second clamped to at least 1"),
    )))
}

fn adapter_for(tag: RefreshAdapterTag) -> Box<dyn RefreshAdapter> {
    match tag {
        RefreshAdapterTag::ApiKey => Box::new(ApiKeyRefreshAdapter),
        RefreshAdapterTag::Codex => Box::new(CodexRefreshAdapter),
        RefreshAdapterTag::GeminiCli => Box::new(GeminiCliRefreshAdapter),
    }
}

/// Runs one refresh attempt against `auth` in place. The caller holds
/// `auth.runtime.refresh_lock` and is responsible for the Token Store
/// write-through afterward — this function only talks to the upstream OAuth
/// endpoint and applies the resulting patch to `auth.metadata`.
pub async fn refresh_once(
    auth: &mut Auth,
    tag: RefreshAdapterTag,
    client: &reqwest::Client,
    limiter: &RefreshLimiter,
) -> Result<RefreshOutcome, crate::error::RelayGateError> {
    limiter.until_ready().await;
    adapter_for(tag).refresh(auth, client).await
}
