use crate::auth::{Auth, Metadata, Provider, Quota, Runtime, SharedCredentialRef, Status};
use crate::config::Config;
use crate::synth::stable_hash;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

/// One parsed entry from the auth directory, keyed by its path relative to
/// the directory root (the File synthesiser's `ID` for primary records).
#[derive(Debug, Clone)]
pub struct RawAuthFile {
    pub relative_path: String,
    pub json: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct FileSnapshot {
    pub files: Vec<RawAuthFile>,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "type")]
    kind: String,
    email: Option<String>,
    #[serde(default)]
    project_id: Option<String>,
    account_id: Option<String>,
    api_key: Option<String>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    expire: Option<DateTime<Utc>>,
    /// RFC3339, but some provider CLIs emit this with sub-second precision
    /// dropped or a trailing `Z` after an explicit offset; both parse fine
    /// through `DateTime::parse_from_rfc3339`, so no separate "variants"
    /// path is needed beyond that.
    last_refresh: Option<String>,
    proxy_url: Option<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

fn parse_last_refresh(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Attribute-level, human-inspectable rendering of a provider's excluded
/// model list so the Auth Manager's selection step can check membership
/// without re-reading configuration; `excluded_models_hash` (computed
/// alongside) only tells a consumer *that* the list changed, not what's in it.
fn excluded_models_attrs(config: &Config, provider_tag: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    let Some(models) = config.keys.oauth_excluded_models.get(provider_tag) else {
        return out;
    };
    if models.is_empty() {
        return out;
    }
    out.insert("excluded_models".to_string(), models.join(","));
    out.insert(
        "excluded_models_hash".to_string(),
        stable_hash(&models.iter().map(String::as_str).collect::<Vec<_>>()),
    );
    out
}

/// Walks a snapshot of the auth directory and emits one primary Auth per
/// file. `gemini` is rewritten to `gemini-cli` for the live manager's
/// provider taxonomy. A Gemini-CLI file with comma-delimited project IDs
/// emits one virtual Auth per project, sharing token material through an
/// explicit `(parent_id, project_id)` back-reference; the primary record is
/// kept (disabled) so filesystem hashing stays stable across reloads.
pub fn synthesize_from_files(snapshot: &FileSnapshot, config: &Config) -> Vec<Auth> {
    let mut out = Vec::new();

    for file in &snapshot.files {
        let Ok(raw) = serde_json::from_value::<RawRecord>(file.json.clone()) else {
            continue;
        };

        let kind = if raw.kind == "gemini" {
            "gemini-cli"
        } else {
            raw.kind.as_str()
        };
        let provider = Provider::parse(kind);

        let project_ids: Vec<String> = raw
            .project_id
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let metadata = Metadata {
            access_token: raw.access_token.clone(),
            refresh_token: raw.refresh_token.clone(),
            expiry: raw.expire,
            project_id: raw.project_id.clone(),
            account_id: raw.account_id.clone(),
            api_key: raw.api_key.clone(),
            extra: raw.extra.clone(),
        };

        let now = Utc::now();
        let last_refreshed_at = parse_last_refresh(raw.last_refresh.as_deref());
        let label = raw.email.clone().unwrap_or_else(|| kind.to_string());

        let mut attributes = BTreeMap::new();
        attributes.insert("source".to_string(), file.relative_path.clone());
        attributes.insert("auth_kind".to_string(), "oauth".to_string());
        attributes.extend(excluded_models_attrs(config, kind));

        if provider == Provider::GeminiCli && project_ids.len() > 1 {
            let child_ids: Vec<String> = project_ids
                .iter()
                .map(|p| format!("{}#{}", file.relative_path, p))
                .collect();
            attributes.insert("virtual_children".to_string(), child_ids.join(","));

            let mut primary = Auth {
                id: file.relative_path.clone(),
                provider: provider.clone(),
                label: label.clone(),
                status: Status::Active,
                disabled: true,
                attributes,
                metadata: metadata.clone(),
                proxy_url: raw.proxy_url.clone(),
                quota: Quota::default(),
                runtime: Runtime::default(),
                created_at: now,
                updated_at: now,
                last_refreshed_at: last_refreshed_at,
                next_refresh_after: None,
            };
            primary.recompute_next_refresh_after();
            out.push(primary);

            for (project_id, child_id) in project_ids.iter().zip(child_ids.iter()) {
                let mut child_attrs = BTreeMap::new();
                child_attrs.insert("source".to_string(), file.relative_path.clone());
                child_attrs.insert("auth_kind".to_string(), "oauth".to_string());
                child_attrs.insert("parent_id".to_string(), file.relative_path.clone());

                let mut child_metadata = metadata.clone();
                child_metadata.project_id = Some(project_id.clone());

                let mut child = Auth {
                    id: child_id.clone(),
                    provider: provider.clone(),
                    label: label.clone(),
                    status: Status::Active,
                    disabled: false,
                    attributes: child_attrs,
                    metadata: child_metadata,
                    proxy_url: raw.proxy_url.clone(),
                    quota: Quota::default(),
                    runtime: Runtime {
                        shared_with: Some(SharedCredentialRef {
                            parent_id: file.relative_path.clone(),
                            project_id: project_id.clone(),
                        }),
                        ..Runtime::default()
                    },
                    created_at: now,
                    updated_at: now,
                    last_refreshed_at: last_refreshed_at,
                    next_refresh_after: None,
                };
                child.recompute_next_refresh_after();
                out.push(child);
            }
            continue;
        }

        let mut primary = Auth {
            id: file.relative_path.clone(),
            provider,
            label,
            status: Status::Active,
            disabled: false,
            attributes,
            metadata,
            proxy_url: raw.proxy_url.clone(),
            quota: Quota::default(),
            runtime: Runtime::default(),
            created_at: now,
            updated_at: now,
            last_refreshed_at: last_refreshed_at,
            next_refresh_after: None,
        };
        primary.recompute_next_refresh_after();
        out.push(primary);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn file(path: &str, json: serde_json::Value) -> RawAuthFile {
        RawAuthFile {
            relative_path: path.to_string(),
            json,
        }
    }

    #[test]
    fn gemini_type_is_rewritten_to_gemini_cli() {
        let snapshot = FileSnapshot {
            files: vec![file(
                "gemini-alice.json",
                json!({"type": "gemini", "email": "alice@example.test", "refresh_token": "r1"}),
            )],
        };
        let auths = synthesize_from_files(&snapshot, &Config::default());
        assert_eq!(auths[0].provider.as_str(), "gemini-cli");
    }

    #[test]
    fn multi_project_file_emits_disabled_parent_and_virtual_children() {
        let snapshot = FileSnapshot {
            files: vec![file(
                "gemini-bob.json",
                json!({
                    "type": "gemini",
                    "email": "bob@example.test",
                    "project_id": "proj-a, proj-b",
                    "refresh_token": "r1",
                }),
            )],
        };
        let auths = synthesize_from_files(&snapshot, &Config::default());
        assert_eq!(auths.len(), 3);
        assert!(auths[0].disabled);
        assert_eq!(auths[0].attributes.get("virtual_children").unwrap(), "gemini-bob.json#proj-a,gemini-bob.json#proj-b");
        assert!(!auths[1].disabled);
        assert_eq!(
            auths[1].runtime.shared_with.as_ref().unwrap().project_id,
            "proj-a"
        );
    }

    #[test]
    fn single_project_file_emits_one_active_auth() {
        let snapshot = FileSnapshot {
            files: vec![file(
                "codex-alice.json",
                json!({"type": "codex", "account_id": "acct1", "refresh_token": "r1"}),
            )],
        };
        let auths = synthesize_from_files(&snapshot, &Config::default());
        assert_eq!(auths.len(), 1);
        assert!(!auths[0].disabled);
        assert_eq!(auths[0].provider.as_str(), "codex");
    }

    #[test]
    fn excluded_models_from_config_are_attached_to_matching_provider_tag() {
        let mut config = Config::default();
        config.keys.oauth_excluded_models.insert(
            "codex".to_string(),
            vec!["gpt-5".to_string(), "gpt-5-codex".to_string()],
        );
        let snapshot = FileSnapshot {
            files: vec![file(
                "codex-alice.json",
                json!({"type": "codex", "account_id": "acct1", "refresh_token": "r1"}),
            )],
        };
        let auths = synthesize_from_files(&snapshot, &config);
        assert_eq!(
            auths[0].attributes.get("excluded_models").unwrap(),
            "gpt-5,gpt-5-codex"
        );
        assert!(auths[0].attributes.contains_key("excluded_models_hash"));
    }

    #[test]
    fn no_excluded_models_entry_means_no_attributes() {
        let snapshot = FileSnapshot {
            files: vec![file(
                "codex-alice.json",
                json!({"type": "codex", "account_id": "acct1", "refresh_token": "r1"}),
            )],
        };
        let auths = synthesize_from_files(&snapshot, &Config::default());
        assert!(!auths[0].attributes.contains_key("excluded_models"));
    }
}
