use super::sanitize_identifier;
use crate::auth::Auth;
use crate::error::RelayGateError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Persistence seam for the Token Store. `PersistConfig`/`PersistAuthFiles`
/// from the spec map onto `save`/`list` here; a remote-mirror backend would
/// implement the same trait against e.g. a git-backed store.
#[async_trait]
pub trait TokenStoreBackend: Send + Sync {
    async fn save(&self, record: &Auth) -> Result<PathBuf, RelayGateError>;
    async fn load(&self, path: &Path) -> Result<Auth, RelayGateError>;
    async fn list(&self) -> Result<Vec<PathBuf>, RelayGateError>;
    fn set_base_dir(&mut self, dir: PathBuf);
}

pub struct LocalFsBackend {
    base_dir: PathBuf,
}

impl LocalFsBackend {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn path_for(&self, record: &Auth) -> PathBuf {
        let identifier = record
            .attributes
            .get("source")
            .cloned()
            .or_else(|| record.metadata.api_key.clone())
            .unwrap_or_else(|| record.id.clone());
        let file_name = format!(
            "{}-{}.json",
            record.provider.as_str(),
            sanitize_identifier(&identifier)
        );
        self.base_dir.join(file_name)
    }

    fn is_relevant_json_file(path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if name.starts_with('.') {
            // Transient OAuth callback staging files: `.oauth-<provider>-<state>.oauth`.
            return false;
        }
        name.ends_with(".json")
    }
}

#[async_trait]
impl TokenStoreBackend for LocalFsBackend {
    async fn save(&self, record: &Auth) -> Result<PathBuf, RelayGateError> {
        fs::create_dir_all(&self.base_dir).await?;

        let target = self.path_for(record);
        let tmp_name = format!(
            ".tmp-{}-{}",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        );
        let tmp_path = self.base_dir.join(tmp_name);

        let bytes = serde_json::to_vec_pretty(record)?;

        {
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)
                .await?;
            file.write_all(&bytes).await?;
            file.sync_all().await?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        fs::rename(&tmp_path, &target).await?;
        Ok(target)
    }

    async fn load(&self, path: &Path) -> Result<Auth, RelayGateError> {
        let bytes = fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn list(&self) -> Result<Vec<PathBuf>, RelayGateError> {
        let mut out = Vec::new();
        let mut entries = match fs::read_dir(&self.base_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_file() && Self::is_relevant_json_file(&path) {
                out.push(path);
            }
        }
        out.sort();
        Ok(out)
    }

    fn set_base_dir(&mut self, dir: PathBuf) {
        self.base_dir = dir;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Metadata, Provider, Quota, Runtime, Status};
    use std::collections::BTreeMap;

    fn sample_auth(id: &str) -> Auth {
        let now = chrono::Utc::now();
        Auth {
            id: id.to_string(),
            provider: Provider::GeminiCli,
            label: "alice@example.test".into(),
            status: Status::Active,
            disabled: false,
            attributes: BTreeMap::new(),
            metadata: Metadata::default(),
            proxy_url: None,
            quota: Quota::default(),
            runtime: Runtime::default(),
            created_at: now,
            updated_at: now,
            last_refreshed_at: None,
            next_refresh_after: None,
        }
    }

    #[tokio::test]
    async fn save_then_list_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::new(dir.path().to_path_buf());

        let auth = sample_auth("gemini-cli-alice");
        let path = backend.save(&auth).await.unwrap();

        let listed = backend.list().await.unwrap();
        assert_eq!(listed, vec![path.clone()]);

        let loaded = backend.load(&path).await.unwrap();
        assert_eq!(loaded.id, auth.id);
    }

    #[tokio::test]
    async fn list_ignores_dotfiles_and_non_json() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join(".oauth-codex-xyz.oauth"), b"{}")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("notes.txt"), b"hi").await.unwrap();
        let backend = LocalFsBackend::new(dir.path().to_path_buf());
        backend.save(&sample_auth("a1")).await.unwrap();

        let listed = backend.list().await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn save_writes_file_mode_0600() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let dir = tempfile::tempdir().unwrap();
            let backend = LocalFsBackend::new(dir.path().to_path_buf());
            let path = backend.save(&sample_auth("a1")).await.unwrap();
            let mode = tokio::fs::metadata(&path).await.unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
