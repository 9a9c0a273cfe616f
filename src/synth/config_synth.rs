use super::stable_hash;
use crate::auth::{Auth, Metadata, Provider, Quota, Runtime, Status};
use crate::config::{Config, ProviderKeyEntry};
use chrono::Utc;
use std::collections::BTreeMap;

/// Emits one API-key Auth per populated key-list entry. Duplicate `(kind,
/// key, base_url, proxy_url)` tuples within the same provider kind receive
/// an incrementing numeric suffix so IDs stay unique even when an operator
/// configures the same key twice (e.g. with different header overrides).
pub fn synthesize_from_config(config: &Config) -> Vec<Auth> {
    let mut out = Vec::new();
    let mut seen_ids: BTreeMap<String, u32> = BTreeMap::new();

    for key in &config.keys.gemini_api_key {
        push_flat(&mut out, &mut seen_ids, Provider::Gemini, key, "gemini-api-key");
    }
    for key in &config.keys.generative_language_api_key {
        push_flat(
            &mut out,
            &mut seen_ids,
            Provider::Gemini,
            key,
            "generative-language-api-key",
        );
    }
    for entry in &config.keys.claude_api_key {
        push_structured(&mut out, &mut seen_ids, Provider::Claude, entry);
    }
    for entry in &config.keys.codex_api_key {
        push_structured(&mut out, &mut seen_ids, Provider::Codex, entry);
    }
    for entry in &config.keys.vertex_compat_api_key {
        push_structured(&mut out, &mut seen_ids, Provider::Vertex, entry);
    }
    for entry in &config.keys.openai_compatibility {
        let name = compat_provider_name(entry);
        push_structured(&mut out, &mut seen_ids, Provider::Other(name), entry);
    }

    out
}

fn compat_provider_name(entry: &ProviderKeyEntry) -> String {
    entry
        .base_url
        .as_deref()
        .and_then(|u| url::Url::parse(u).ok())
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "openai-compatible".to_string())
}

fn push_flat(
    out: &mut Vec<Auth>,
    seen_ids: &mut BTreeMap<String, u32>,
    provider: Provider,
    key: &str,
    source: &str,
) {
    let entry = ProviderKeyEntry {
        api_key: key.to_string(),
        ..Default::default()
    };
    push_structured_with_source(out, seen_ids, provider, &entry, source);
}

fn push_structured(
    out: &mut Vec<Auth>,
    seen_ids: &mut BTreeMap<String, u32>,
    provider: Provider,
    entry: &ProviderKeyEntry,
) {
    push_structured_with_source(out, seen_ids, provider, entry, "config");
}

fn push_structured_with_source(
    out: &mut Vec<Auth>,
    seen_ids: &mut BTreeMap<String, u32>,
    provider: Provider,
    entry: &ProviderKeyEntry,
    source: &str,
) {
    let base_url = entry.base_url.clone().unwrap_or_default();
    let proxy_url = entry.proxy_url.clone().unwrap_or_default();
    let kind = provider.as_str().to_string();

    let base_id = stable_hash(&[&kind, &entry.api_key, &base_url, &proxy_url]);
    let counter = seen_ids.entry(base_id.clone()).or_insert(0);
    let id = if *counter == 0 {
        base_id.clone()
    } else {
        format!("{base_id}-{counter}")
    };
    *counter += 1;

    let mut attributes = BTreeMap::new();
    attributes.insert("source".to_string(), source.to_string());
    attributes.insert("auth_kind".to_string(), "apikey".to_string());
    attributes.insert("api_key".to_string(), entry.api_key.clone());
    if !base_url.is_empty() {
        attributes.insert("base_url".to_string(), base_url);
    }
    for (name, value) in &entry.headers {
        attributes.insert(format!("header:{name}"), value.clone());
    }
    if !entry.models.is_empty() {
        attributes.insert(
            "models_hash".to_string(),
            stable_hash(&entry.models.iter().map(String::as_str).collect::<Vec<_>>()),
        );
    }
    if !entry.excluded_models.is_empty() {
        attributes.insert(
            "excluded_models_hash".to_string(),
            stable_hash(
                &entry
                    .excluded_models
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>(),
            ),
        );
        attributes.insert("excluded_models".to_string(), entry.excluded_models.join(","));
    }

    let now = Utc::now();
    out.push(Auth {
        id,
        label: provider.as_str().to_string(),
        provider,
        status: Status::Active,
        disabled: false,
        attributes,
        metadata: Metadata {
            api_key: Some(entry.api_key.clone()),
            ..Default::default()
        },
        proxy_url: entry.proxy_url.clone(),
        quota: Quota::default(),
        runtime: Runtime::default(),
        created_at: now,
        updated_at: now,
        last_refreshed_at: None,
        next_refresh_after: None,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_keys(gemini: Vec<&str>) -> Config {
        let mut cfg = Config::default();
        cfg.keys.gemini_api_key = gemini.into_iter().map(String::from).collect();
        cfg
    }

    #[test]
    fn two_runs_over_identical_config_produce_identical_ids() {
        let cfg = config_with_keys(vec!["k1", "k2"]);
        let a = synthesize_from_config(&cfg);
        let b = synthesize_from_config(&cfg);
        assert_eq!(
            a.iter().map(|x| x.id.clone()).collect::<Vec<_>>(),
            b.iter().map(|x| x.id.clone()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn duplicate_keys_receive_incrementing_suffix() {
        let cfg = config_with_keys(vec!["dup", "dup"]);
        let auths = synthesize_from_config(&cfg);
        assert_eq!(auths.len(), 2);
        assert_ne!(auths[0].id, auths[1].id);
        assert!(auths[1].id.ends_with("-1"));
    }

    #[test]
    fn openai_compatible_entry_gets_free_form_provider_name() {
        let mut cfg = Config::default();
        cfg.keys.openai_compatibility.push(ProviderKeyEntry {
            api_key: "k1".into(),
            base_url: Some("https://api.example-upstream.test/v1".into()),
            ..Default::default()
        });
        let auths = synthesize_from_config(&cfg);
        assert_eq!(auths[0].provider.as_str(), "api.example-upstream.test");
    }
}
