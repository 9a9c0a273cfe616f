use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One configured upstream credential entry. Structured provider lists
/// (Claude/Codex/OpenAI-compatible/Vertex-compatible) accept this shape in
/// YAML, or a bare string — a legacy flat key is expanded into the richer
/// structured form with every other field left at its default.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProviderKeyEntry {
    #[serde(rename = "api-key")]
    pub api_key: String,

    #[serde(rename = "base-url", default)]
    pub base_url: Option<String>,

    #[serde(rename = "proxy-url", default)]
    pub proxy_url: Option<String>,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub models: Vec<String>,

    #[serde(rename = "excluded-models", default)]
    pub excluded_models: Vec<String>,
}

impl ProviderKeyEntry {
    fn from_bare_key(api_key: String) -> Self {
        Self {
            api_key,
            ..Default::default()
        }
    }

    /// Lowercases header names, per the Config Loader's header-flattening
    /// normalisation, and trims the key/base-url/proxy-url strings.
    pub fn normalize(&mut self) {
        self.api_key = self.api_key.trim().to_string();
        self.base_url = self.base_url.take().map(|s| s.trim().to_string());
        self.proxy_url = self.proxy_url.take().map(|s| s.trim().to_string());
        let lowered: BTreeMap<String, String> = std::mem::take(&mut self.headers)
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        self.headers = lowered;
    }
}

/// Deserializes a list of either bare strings or full `ProviderKeyEntry`
/// objects into a uniform `Vec<ProviderKeyEntry>`.
pub fn deserialize_key_entries<'de, D>(deserializer: D) -> Result<Vec<ProviderKeyEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    struct KeyEntriesVisitor;

    impl<'de> Visitor<'de> for KeyEntriesVisitor {
        type Value = Vec<ProviderKeyEntry>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a list of API key strings or structured key entries")
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            #[derive(Deserialize)]
            #[serde(untagged)]
            enum Entry {
                Bare(String),
                Structured(ProviderKeyEntry),
            }

            let mut out = Vec::new();
            while let Some(entry) = seq.next_element::<Entry>()? {
                out.push(match entry {
                    Entry::Bare(key) => ProviderKeyEntry::from_bare_key(key),
                    Entry::Structured(e) => e,
                });
            }
            Ok(out)
        }
    }

    deserializer.deserialize_seq(KeyEntriesVisitor)
}

fn default_empty_entries() -> Vec<ProviderKeyEntry> {
    Vec::new()
}

/// Upstream credential configuration — the flat/structured API-key lists
/// named in the external-interfaces config-file contract.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct UpstreamKeysConfig {
    /// Inbound client keys accepted by the Access Gate. Every entry yields
    /// the default access provider (no per-key provider tagging).
    #[serde(rename = "api-keys", default)]
    pub api_keys: Vec<String>,

    #[serde(rename = "generative-language-api-key", default)]
    pub generative_language_api_key: Vec<String>,

    #[serde(rename = "gemini-api-key", default)]
    pub gemini_api_key: Vec<String>,

    #[serde(
        rename = "claude-api-key",
        default = "default_empty_entries",
        deserialize_with = "deserialize_key_entries"
    )]
    pub claude_api_key: Vec<ProviderKeyEntry>,

    #[serde(
        rename = "codex-api-key",
        default = "default_empty_entries",
        deserialize_with = "deserialize_key_entries"
    )]
    pub codex_api_key: Vec<ProviderKeyEntry>,

    #[serde(
        rename = "vertex-compat-api-key",
        default = "default_empty_entries",
        deserialize_with = "deserialize_key_entries"
    )]
    pub vertex_compat_api_key: Vec<ProviderKeyEntry>,

    #[serde(
        rename = "openai-compatibility",
        default = "default_empty_entries",
        deserialize_with = "deserialize_key_entries"
    )]
    pub openai_compatibility: Vec<ProviderKeyEntry>,

    /// Per-provider excluded-model lists applied to OAuth-derived auths.
    #[serde(rename = "oauth-excluded-models", default)]
    pub oauth_excluded_models: BTreeMap<String, Vec<String>>,
}

impl UpstreamKeysConfig {
    /// Applies the Config Loader's normalisations: trims strings, drops
    /// OpenAI-compatible entries with an empty `base-url`, dedupes per-kind
    /// key lists, and lowercases header names.
    pub fn normalize(&mut self) {
        self.generative_language_api_key = dedupe_trimmed(&self.generative_language_api_key);
        self.gemini_api_key = dedupe_trimmed(&self.gemini_api_key);
        self.api_keys = dedupe_trimmed(&self.api_keys);

        for entry in self
            .claude_api_key
            .iter_mut()
            .chain(self.codex_api_key.iter_mut())
            .chain(self.vertex_compat_api_key.iter_mut())
            .chain(self.openai_compatibility.iter_mut())
        {
            entry.normalize();
        }

        self.openai_compatibility.retain(|e| {
            e.base_url
                .as_deref()
                .map(|u| !u.is_empty())
                .unwrap_or(false)
        });

        dedupe_by_key(&mut self.claude_api_key);
        dedupe_by_key(&mut self.codex_api_key);
        dedupe_by_key(&mut self.vertex_compat_api_key);
        dedupe_by_key(&mut self.openai_compatibility);
    }
}

fn dedupe_trimmed(values: &[String]) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    let mut out = Vec::new();
    for v in values {
        let trimmed = v.trim().to_string();
        if trimmed.is_empty() || !seen.insert(trimmed.clone()) {
            continue;
        }
        out.push(trimmed);
    }
    out
}

fn dedupe_by_key(entries: &mut Vec<ProviderKeyEntry>) {
    let mut seen = std::collections::BTreeSet::new();
    entries.retain(|e| seen.insert((e.api_key.clone(), e.base_url.clone())));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_string_expands_to_structured_entry() {
        let yaml = "- sk-abc\n- api-key: sk-def\n  base-url: https://example.test\n";
        let entries: Vec<ProviderKeyEntry> =
            deserialize_key_entries(serde_yaml::Deserializer::from_str(yaml)).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].api_key, "sk-abc");
        assert_eq!(entries[1].base_url.as_deref(), Some("https://example.test"));
    }

    #[test]
    fn normalize_drops_empty_base_url_openai_compat_entries() {
        let mut cfg = UpstreamKeysConfig {
            openai_compatibility: vec![
                ProviderKeyEntry {
                    api_key: "k1".into(),
                    base_url: Some(String::new()),
                    ..Default::default()
                },
                ProviderKeyEntry {
                    api_key: "k2".into(),
                    base_url: Some("https://api.example.test".into()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        cfg.normalize();
        assert_eq!(cfg.openai_compatibility.len(), 1);
        assert_eq!(cfg.openai_compatibility[0].api_key, "k2");
    }

    #[test]
    fn normalize_dedupes_and_trims_flat_lists() {
        let mut cfg = UpstreamKeysConfig {
            gemini_api_key: vec![" g1 ".into(), "g1".into(), "g2".into()],
            ..Default::default()
        };
        cfg.normalize();
        assert_eq!(cfg.gemini_api_key, vec!["g1".to_string(), "g2".to_string()]);
    }
}
