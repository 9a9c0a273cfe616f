mod backend;

pub use backend::{LocalFsBackend, TokenStoreBackend};

use crate::auth::Auth;
use crate::error::RelayGateError;
use std::path::{Path, PathBuf};

/// Durable, atomic persistence of file-backed credentials under a single
/// auth directory. Thin facade over a pluggable `TokenStoreBackend`; only a
/// local filesystem backend ships (the remote-mirror hooks named in the
/// external interfaces are out of scope here, but the seam exists).
pub struct TokenStore {
    backend: Box<dyn TokenStoreBackend>,
}

impl TokenStore {
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            backend: Box::new(LocalFsBackend::new(base_dir)),
        }
    }

    pub fn with_backend(backend: Box<dyn TokenStoreBackend>) -> Self {
        Self { backend }
    }

    /// Resets the root directory; subsequent saves use the new directory.
    pub fn set_base_dir(&mut self, dir: PathBuf) {
        self.backend.set_base_dir(dir);
    }

    pub async fn save(&self, record: &Auth) -> Result<PathBuf, RelayGateError> {
        self.backend.save(record).await
    }

    pub async fn load(&self, path: &Path) -> Result<Auth, RelayGateError> {
        self.backend.load(path).await
    }

    pub async fn list(&self) -> Result<Vec<PathBuf>, RelayGateError> {
        self.backend.list().await
    }
}

/// Filename-safe rendering of an identifier (usually an email). Falls back
/// to a timestamp-derived unique tag when the identifier is empty. A single
/// sanitiser is used for every provider per the "unify filename sanitisation"
/// recommendation in `DESIGN.md`.
pub fn sanitize_identifier(identifier: &str) -> String {
    let trimmed = identifier.trim();
    if trimmed.is_empty() {
        return format!("anon-{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default());
    }
    trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_identifier_replaces_unsafe_characters() {
        assert_eq!(sanitize_identifier("alice@example.com"), "alice_example.com");
    }

    #[test]
    fn sanitize_identifier_falls_back_when_empty() {
        assert!(sanitize_identifier("  ").starts_with("anon-"));
    }
}
