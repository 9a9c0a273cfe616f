use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Provider tag. OpenAI-compatible entries that don't match a well-known
/// upstream get `Other(name)` so the registry can still key capability and
/// refresh-adapter lookups off them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    Gemini,
    GeminiCli,
    GeminiWeb,
    Claude,
    Codex,
    Qwen,
    Iflow,
    Vertex,
    Other(String),
}

impl Provider {
    pub fn as_str(&self) -> &str {
        match self {
            Provider::Gemini => "gemini",
            Provider::GeminiCli => "gemini-cli",
            Provider::GeminiWeb => "gemini-web",
            Provider::Claude => "claude",
            Provider::Codex => "codex",
            Provider::Qwen => "qwen",
            Provider::Iflow => "iflow",
            Provider::Vertex => "vertex",
            Provider::Other(name) => name,
        }
    }

    pub fn parse(tag: &str) -> Self {
        match tag {
            "gemini" => Provider::Gemini,
            "gemini-cli" => Provider::GeminiCli,
            "gemini-web" => Provider::GeminiWeb,
            "claude" => Provider::Claude,
            "codex" => Provider::Codex,
            "qwen" => Provider::Qwen,
            "iflow" => Provider::Iflow,
            "vertex" => Provider::Vertex,
            other => Provider::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Active,
    Disabled,
    Pending,
    Invalid,
}

/// `{Exhausted, NextRecoverAt, ConsecutiveFailures}` from the spec's data
/// model — the quota-local part of an Auth's execution state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quota {
    pub exhausted: bool,
    pub next_recover_at: DateTime<Utc>,
    pub consecutive_failures: u32,
}

impl Default for Quota {
    fn default() -> Self {
        Self {
            exhausted: false,
            next_recover_at: Utc::now(),
            consecutive_failures: 0,
        }
    }
}

impl Quota {
    pub fn is_recovered(&self, now: DateTime<Utc>) -> bool {
        !self.exhausted || now >= self.next_recover_at
    }

    pub fn mark_exhausted(&mut self, until: DateTime<Utc>) {
        self.exhausted = true;
        self.next_recover_at = until;
        self.consecutive_failures += 1;
    }

    pub fn reset(&mut self) {
        self.exhausted = false;
        self.consecutive_failures = 0;
    }
}

/// Runtime-only state installed by the Auth Manager. Never serialised;
/// rebuilt fresh whenever an Auth is (re)registered. The shared-credential
/// back-reference is modelled explicitly (parent-id, project-id) per the
/// "runtime-only back-references" redesign note, instead of a hidden pointer.
#[derive(Debug, Clone, Default)]
pub struct Runtime {
    pub refresh_lock: Arc<Mutex<()>>,
    pub shared_with: Option<SharedCredentialRef>,
}

#[derive(Debug, Clone)]
pub struct SharedCredentialRef {
    pub parent_id: String,
    pub project_id: String,
}

/// The central entity: one credential eligible for selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auth {
    pub id: String,
    pub provider: Provider,
    pub label: String,
    pub status: Status,
    pub disabled: bool,

    /// Small string->string attributes: `source`, `api_key`, `base_url`,
    /// `header:<Name>`, `excluded_models_hash`, `auth_kind`, `models_hash`,
    /// and (for virtual Gemini-CLI parents) `virtual_children`.
    pub attributes: BTreeMap<String, String>,

    /// Opaque, provider-shaped metadata: raw OAuth token material for
    /// file-derived records (access/refresh token, expiry, project id,
    /// account id, api key).
    pub metadata: Metadata,

    pub proxy_url: Option<String>,

    #[serde(default)]
    pub quota: Quota,

    #[serde(skip)]
    pub runtime: Runtime,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub next_refresh_after: Option<DateTime<Utc>>,
}

/// Typed metadata in place of `map[string]any`; the storage layer is the
/// only place that needs opaque JSON (see Token Store), so this is a
/// concrete struct with an `extra` catch-all for provider-specific fields
/// that aren't material to any invariant.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Metadata {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

const REFRESH_SAFETY_MARGIN_SECONDS: i64 = 300;

impl Auth {
    /// Invariant 4: `next_refresh_after`, when set, precedes the upstream
    /// expiry by a non-zero safety margin.
    pub fn recompute_next_refresh_after(&mut self) {
        self.next_refresh_after = self
            .metadata
            .expiry
            .map(|expiry| expiry - chrono::Duration::seconds(REFRESH_SAFETY_MARGIN_SECONDS));
    }

    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match self.next_refresh_after {
            Some(at) => now >= at,
            None => false,
        }
    }

    pub fn is_leasable(&self, now: DateTime<Utc>) -> bool {
        !self.disabled && self.status == Status::Active && self.quota.is_recovered(now)
    }

    /// Merge-patches OAuth token material the way `update_credential` does
    /// in the file-backed credential's refresh path: only fields present in
    /// `payload` are applied, `expires_in` (relative) takes priority over an
    /// absolute `expiry` when both are present.
    pub fn apply_oauth_patch(
        &mut self,
        payload: serde_json::Value,
    ) -> Result<(), serde_json::Error> {
        #[derive(Debug, Default, Deserialize)]
        struct Patch {
            access_token: Option<String>,
            refresh_token: Option<String>,
            expiry: Option<DateTime<Utc>>,
            expires_in: Option<i64>,
            project_id: Option<String>,
            account_id: Option<String>,
        }

        let patch: Patch = serde_json::from_value(payload)?;

        if let Some(v) = patch.access_token {
            self.metadata.access_token = Some(v);
        }
        if let Some(v) = patch.refresh_token {
            self.metadata.refresh_token = Some(v);
        }
        if let Some(v) = patch.project_id {
            self.metadata.project_id = Some(v);
        }
        if let Some(v) = patch.account_id {
            self.metadata.account_id = Some(v);
        }
        if let Some(secs) = patch.expires_in {
            self.metadata.expiry = Some(Utc::now() + chrono::Duration::seconds(secs));
        } else if let Some(dt) = patch.expiry {
            self.metadata.expiry = Some(dt);
        }

        let now = Utc::now();
        self.last_refreshed_at = Some(now);
        self.updated_at = now;
        self.recompute_next_refresh_after();
        Ok(())
    }

    /// Normalises a copy of `self` for structural-equality comparisons by
    /// zeroing every field the design notes mark volatile, instead of
    /// reflection-based comparison: `created_at`, `updated_at`,
    /// `last_refreshed_at`, `next_refresh_after`, `runtime`, and
    /// `quota.next_recover_at`.
    pub fn normalized_for_compare(&self) -> Auth {
        let epoch = DateTime::<Utc>::from_timestamp(0, 0).expect("epoch is representable");
        let mut copy = self.clone();
        copy.created_at = epoch;
        copy.updated_at = epoch;
        copy.last_refreshed_at = None;
        copy.next_refresh_after = None;
        copy.runtime = Runtime::default();
        copy.quota.next_recover_at = epoch;
        copy
    }
}

/// `AuthUpdate{Action, ID, Auth?}` — the unit of change the Watcher emits
/// and the Auth Manager applies.
#[derive(Debug, Clone)]
pub struct AuthUpdate {
    pub action: UpdateAction,
    pub id: String,
    pub auth: Option<Auth>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateAction {
    Add,
    Modify,
    Delete,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_auth() -> Auth {
        Auth {
            id: "a1".into(),
            provider: Provider::Gemini,
            label: "alice@example.test".into(),
            status: Status::Active,
            disabled: false,
            attributes: BTreeMap::new(),
            metadata: Metadata::default(),
            proxy_url: None,
            quota: Quota::default(),
            runtime: Runtime::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_refreshed_at: None,
            next_refresh_after: None,
        }
    }

    #[test]
    fn normalized_compare_ignores_volatile_fields() {
        let mut a = sample_auth();
        let mut b = sample_auth();
        b.created_at += chrono::Duration::seconds(5);
        b.quota.next_recover_at += chrono::Duration::seconds(30);
        a.runtime.shared_with = Some(SharedCredentialRef {
            parent_id: "p".into(),
            project_id: "proj".into(),
        });

        let na = a.normalized_for_compare();
        let nb = b.normalized_for_compare();
        assert_eq!(
            serde_json::to_value(&na).unwrap(),
            serde_json::to_value(&nb).unwrap()
        );
    }

    #[test]
    fn refresh_safety_margin_precedes_expiry() {
        let mut a = sample_auth();
        let expiry = Utc::now() + chrono::Duration::minutes(30);
        a.metadata.expiry = Some(expiry);
        a.recompute_next_refresh_after();
        assert!(a.next_refresh_after.unwrap() < expiry);
    }

    #[test]
    fn apply_oauth_patch_prefers_expires_in_over_absolute_expiry() {
        let mut a = sample_auth();
        let payload = serde_json::json!({
            "access_token": "tok2",
            "expiry": (Utc::now() + chrono::Duration::days(1)).to_rfc3339(),
            "expires_in": 3600,
        });
        a.apply_oauth_patch(payload).unwrap();
        assert_eq!(a.metadata.access_token.as_deref(), Some("tok2"));
        let delta = a.metadata.expiry.unwrap() - Utc::now();
        assert!(delta.num_seconds() > 3000 && delta.num_seconds() <= 3600);
    }

    #[test]
    fn is_leasable_respects_disabled_status_and_quota() {
        let mut a = sample_auth();
        assert!(a.is_leasable(Utc::now()));
        a.disabled = true;
        assert!(!a.is_leasable(Utc::now()));
        a.disabled = false;
        a.status = Status::Invalid;
        assert!(!a.is_leasable(Utc::now()));
        a.status = Status::Active;
        a.quota.mark_exhausted(Utc::now() + chrono::Duration::seconds(60));
        assert!(!a.is_leasable(Utc::now()));
        assert!(a.is_leasable(Utc::now() + chrono::Duration::seconds(61)));
    }
}
