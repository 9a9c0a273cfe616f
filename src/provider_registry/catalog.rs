//! Static per-provider model catalogues and the provider -> capability
//! triple map. Populated once at startup; `ProviderRegistry::extend_models`
//! is the only thing that grows the model side at reload time (user-defined
//! OpenAI-compatible and Claude model aliases).

use crate::auth::Provider;
use crate::translator::Dialect;

use super::capabilities::Thinking;

/// Static metadata for one model this proxy knows how to route to.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: &'static str,
    pub provider: Provider,
    pub thinking: Thinking,
}

/// How a provider's requests/responses are translated and how its
/// credentials are refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityTriple {
    pub request_translator: Dialect,
    pub response_translator: Dialect,
    pub refresh_adapter: RefreshAdapter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshAdapter {
    /// Static API key; nothing to refresh.
    ApiKey,
    Codex,
    GeminiCli,
}

const THINKING_NONE: Thinking = Thinking::none();

const THINKING_GEMINI_25: Thinking = Thinking {
    min: 0,
    max: 24576,
    zero_allowed: true,
    dynamic_allowed: true,
    levels: None,
};

const THINKING_CLAUDE_EXTENDED: Thinking = Thinking {
    min: 1024,
    max: 32000,
    zero_allowed: true,
    dynamic_allowed: false,
    levels: None,
};

const THINKING_CODEX_EFFORT: Thinking = Thinking {
    min: 0,
    max: 0,
    zero_allowed: true,
    dynamic_allowed: false,
    levels: Some(&["low", "medium", "high"]),
};

/// Static Gemini (and Gemini-CLI/Vertex, which share the same model names)
/// catalogue.
pub const GEMINI_MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: "gemini-2.5-pro",
        provider: Provider::Gemini,
        thinking: THINKING_GEMINI_25,
    },
    ModelInfo {
        name: "gemini-2.5-flash",
        provider: Provider::Gemini,
        thinking: THINKING_GEMINI_25,
    },
    ModelInfo {
        name: "gemini-2.0-flash",
        provider: Provider::Gemini,
        thinking: THINKING_NONE,
    },
];

pub const CLAUDE_MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: "claude-opus-4-1",
        provider: Provider::Claude,
        thinking: THINKING_CLAUDE_EXTENDED,
    },
    ModelInfo {
        name: "claude-sonnet-4-5",
        provider: Provider::Claude,
        thinking: THINKING_CLAUDE_EXTENDED,
    },
    ModelInfo {
        name: "claude-3-5-haiku",
        provider: Provider::Claude,
        thinking: THINKING_NONE,
    },
];

pub const CODEX_MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: "gpt-5",
        provider: Provider::Codex,
        thinking: THINKING_CODEX_EFFORT,
    },
    ModelInfo {
        name: "gpt-5-codex",
        provider: Provider::Codex,
        thinking: THINKING_CODEX_EFFORT,
    },
];

pub const QWEN_MODELS: &[ModelInfo] = &[ModelInfo {
    name: "qwen3-coder-plus",
    provider: Provider::Qwen,
    thinking: THINKING_NONE,
}];

pub const IFLOW_MODELS: &[ModelInfo] = &[ModelInfo {
    name: "iflow-coder",
    provider: Provider::Iflow,
    thinking: THINKING_NONE,
}];

/// Vertex-compatible models share Gemini's wire dialect and model names but
/// route through a distinct provider tag so per-key Vertex credentials and
/// base URLs stay separate from plain Gemini API-key auths.
pub const VERTEX_MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: "vertex-gemini-2.5-pro",
        provider: Provider::Vertex,
        thinking: THINKING_GEMINI_25,
    },
    ModelInfo {
        name: "vertex-gemini-2.5-flash",
        provider: Provider::Vertex,
        thinking: THINKING_GEMINI_25,
    },
];

/// Antigravity ships no dedicated `Provider` tag; it's an OpenAI-compatible
/// surface in front of Gemini models, so its catalogue routes through
/// `Provider::Other` the same way a user-defined OpenAI-compatible alias
/// would, distinguished only by its fixed model list. `Provider::Other`
/// holds an owned `String`, so these entries can't live in a `const` slice
/// alongside the unit-variant catalogues above and are built on demand
/// instead.
pub fn antigravity_models() -> Vec<ModelInfo> {
    vec![ModelInfo {
        name: "antigravity-gemini-2.5-pro",
        provider: Provider::Other("antigravity".to_string()),
        thinking: THINKING_GEMINI_25,
    }]
}

pub fn static_catalogues() -> impl Iterator<Item = ModelInfo> {
    GEMINI_MODELS
        .iter()
        .chain(CLAUDE_MODELS)
        .chain(CODEX_MODELS)
        .chain(QWEN_MODELS)
        .chain(IFLOW_MODELS)
        .chain(VERTEX_MODELS)
        .cloned()
        .chain(antigravity_models())
}

/// Default upstream base URL for a provider, used when an Auth carries no
/// `base_url` attribute of its own (every file-derived OAuth credential and
/// every config-derived entry that left `base-url` unset).
pub fn default_base_url(provider: &Provider) -> &'static str {
    match provider {
        Provider::Gemini | Provider::GeminiCli | Provider::GeminiWeb => {
            "https://generativelanguage.googleapis.com"
        }
        Provider::Vertex => "https://aiplatform.googleapis.com",
        Provider::Claude => "https://api.anthropic.com",
        Provider::Codex => "https://chatgpt.com/backend-api/codex",
        Provider::Qwen => "https://dashscope.aliyuncs.com/compatible-mode",
        Provider::Iflow => "https://apis.iflow.cn",
        Provider::Other(_) => "",
    }
}

/// The sibling providers a model's registry entry should also be considered
/// eligible for, per §4.5 step 1's "candidate provider names (derived from
/// the target model's registry entry)". Only the Gemini family shares a
/// wire dialect and model catalogue across more than one provider tag.
pub fn provider_family(provider: &Provider) -> Vec<Provider> {
    match provider {
        Provider::Gemini | Provider::GeminiCli | Provider::GeminiWeb => {
            vec![Provider::Gemini, Provider::GeminiCli, Provider::GeminiWeb]
        }
        other => vec![other.clone()],
    }
}

pub fn capability_triple(provider: &Provider) -> CapabilityTriple {
    match provider {
        Provider::Gemini | Provider::GeminiCli | Provider::GeminiWeb | Provider::Vertex => {
            CapabilityTriple {
                request_translator: Dialect::Gemini,
                response_translator: Dialect::Gemini,
                refresh_adapter: match provider {
                    Provider::GeminiCli => RefreshAdapter::GeminiCli,
                    _ => RefreshAdapter::ApiKey,
                },
            }
        }
        Provider::Claude => CapabilityTriple {
            request_translator: Dialect::AnthropicMessages,
            response_translator: Dialect::AnthropicMessages,
            refresh_adapter: RefreshAdapter::ApiKey,
        },
        Provider::Codex => CapabilityTriple {
            request_translator: Dialect::OpenAiResponses,
            response_translator: Dialect::OpenAiResponses,
            refresh_adapter: RefreshAdapter::Codex,
        },
        Provider::Qwen | Provider::Iflow | Provider::Other(_) => CapabilityTriple {
            request_translator: Dialect::OpenAiChat,
            response_translator: Dialect::OpenAiChat,
            refresh_adapter: RefreshAdapter::ApiKey,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codex_capability_triple_uses_openai_responses_dialect() {
        let triple = capability_triple(&Provider::Codex);
        assert_eq!(triple.request_translator, Dialect::OpenAiResponses);
        assert_eq!(triple.refresh_adapter, RefreshAdapter::Codex);
    }

    #[test]
    fn geminicli_uses_oauth_refresh_while_gemini_uses_api_key() {
        assert_eq!(
            capability_triple(&Provider::GeminiCli).refresh_adapter,
            RefreshAdapter::GeminiCli
        );
        assert_eq!(
            capability_triple(&Provider::Gemini).refresh_adapter,
            RefreshAdapter::ApiKey
        );
    }

    #[test]
    fn static_catalogues_contains_every_provider_family() {
        let names: Vec<_> = static_catalogues().map(|m| m.name).collect();
        assert!(names.contains(&"gemini-2.5-pro"));
        assert!(names.contains(&"claude-opus-4-1"));
        assert!(names.contains(&"gpt-5-codex"));
    }

    #[test]
    fn default_base_url_covers_every_oauth_backed_provider() {
        assert_eq!(
            default_base_url(&Provider::Gemini),
            "https://generativelanguage.googleapis.com"
        );
        assert_eq!(
            default_base_url(&Provider::GeminiCli),
            "https://generativelanguage.googleapis.com"
        );
        assert_eq!(default_base_url(&Provider::Codex), "https://chatgpt.com/backend-api/codex");
        assert_eq!(default_base_url(&Provider::Other("x".to_string())), "");
    }

    #[test]
    fn provider_family_groups_the_gemini_tags_together() {
        let family = provider_family(&Provider::GeminiCli);
        assert!(family.contains(&Provider::Gemini));
        assert!(family.contains(&Provider::GeminiCli));
        assert!(family.contains(&Provider::GeminiWeb));
    }

    #[test]
    fn provider_family_is_a_singleton_outside_the_gemini_group() {
        assert_eq!(provider_family(&Provider::Codex), vec![Provider::Codex]);
    }
}
