mod debounce;

pub use debounce::{DebounceState, diff};

use crate::auth::{Auth, AuthUpdate};
use crate::config::Config;
use crate::synth::{FileSnapshot, RawAuthFile, synthesize};
use crate::token_store::TokenStore;
use notify::{Event, EventKind, RecursiveMode, Watcher as NotifyWatcher};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, warn};

const CONFIG_DEBOUNCE: Duration = Duration::from_millis(150);

/// Single-threaded event loop over filesystem notifications on the config
/// file and the auth directory. Emits `AuthUpdate` batches on `updates`.
pub struct Watcher {
    config_path: PathBuf,
    auth_dir: PathBuf,
    token_store: TokenStore,
    last_applied: BTreeMap<String, Auth>,
    state: DebounceState,
    /// Parsed-JSON cache keyed by relative path, kept in step with
    /// `state`'s content hash so an unchanged file is neither re-read from
    /// disk's page cache result nor re-parsed on every reconciliation pass
    /// (§4.4: "a bounded per-path hash cache short-circuits redundant
    /// reloads when file bytes are identical").
    file_cache: BTreeMap<String, serde_json::Value>,
    updates: mpsc::Sender<Vec<AuthUpdate>>,
}

impl Watcher {
    pub fn new(
        config_path: PathBuf,
        auth_dir: PathBuf,
        updates: mpsc::Sender<Vec<AuthUpdate>>,
    ) -> Self {
        Self {
            token_store: TokenStore::new(auth_dir.clone()),
            config_path,
            auth_dir,
            last_applied: BTreeMap::new(),
            state: DebounceState::default(),
            file_cache: BTreeMap::new(),
            updates,
        }
    }

    /// Runs one reconciliation pass: load config + snapshot the auth
    /// directory, synthesise, diff against the last-applied set, and emit
    /// the resulting batch (if non-empty).
    pub async fn reconcile(&mut self, force_refresh: bool) -> Result<(), crate::error::RelayGateError> {
        let config = Config::load_optional(&self.config_path, true).unwrap_or_default();

        let mut files = Vec::new();
        let mut seen_paths = std::collections::BTreeSet::new();
        for path in self.token_store.list().await? {
            let relative_path = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            let bytes = tokio::fs::read(&path).await?;
            if bytes.is_empty() {
                // Boundary: empty-byte writes never decrement the hash cache nor emit updates.
                continue;
            }
            seen_paths.insert(relative_path.clone());

            let hash = content_hash(&bytes);
            if !self.state.hash_changed(&relative_path, hash) {
                if let Some(cached) = self.file_cache.get(&relative_path) {
                    files.push(RawAuthFile { relative_path, json: cached.clone() });
                    continue;
                }
            }
            let Ok(json) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
                warn!(path = %path.display(), "skipping unparseable auth file");
                continue;
            };
            self.file_cache.insert(relative_path.clone(), json.clone());
            files.push(RawAuthFile { relative_path, json });
        }

        // Drop cache entries for files that no longer exist so a filename
        // reused later (same name, fresh content) is treated as new rather
        // than compared against a stale hash.
        let stale: Vec<String> =
            self.file_cache.keys().filter(|p| !seen_paths.contains(*p)).cloned().collect();
        for path in stale {
            self.file_cache.remove(&path);
            self.state.forget(&path);
        }

        let snapshot = FileSnapshot { files };
        let current = synthesize(&config, &snapshot);

        let batch = debounce::diff(&self.last_applied, &current, force_refresh);
        if batch.is_empty() {
            return Ok(());
        }

        for update in &batch {
            match &update.auth {
                Some(auth) => {
                    self.last_applied.insert(update.id.clone(), auth.clone());
                }
                None => {
                    self.last_applied.remove(&update.id);
                }
            }
        }

        debug!(count = batch.len(), "emitting auth update batch");
        let _ = self.updates.send(batch).await;
        Ok(())
    }

    /// Spawns the notify-backed watch task; returns the notify watcher which
    /// must be kept alive for as long as events are wanted.
    pub fn spawn_fs_watch(
        &self,
    ) -> Result<(notify::RecommendedWatcher, mpsc::Receiver<Event>), notify::Error> {
        let (tx, rx) = mpsc::channel(64);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                let _ = tx.blocking_send(event);
            }
        })?;
        watcher.watch(&self.auth_dir, RecursiveMode::NonRecursive)?;
        if let Some(parent) = self.config_path.parent() {
            let _ = watcher.watch(parent, RecursiveMode::NonRecursive);
        }
        Ok((watcher, rx))
    }

    /// Drives the debounced reconciliation loop until `rx` closes.
    pub async fn run(mut self, mut fs_events: mpsc::Receiver<Event>) {
        loop {
            let Some(event) = fs_events.recv().await else {
                return;
            };
            if !is_relevant(&event) {
                continue;
            }
            // §4.4: repeated remove events on the same path within the storm
            // window are absorbed before they ever trigger a reconciliation
            // pass, so a platform-specific remove-event storm on one path
            // costs at most one pass, not N.
            if matches!(event.kind, EventKind::Remove(_)) {
                let now = std::time::Instant::now();
                let all_suppressed = event
                    .paths
                    .iter()
                    .filter(|p| is_relevant_path(p))
                    .all(|p| self.state.should_suppress_remove(&p.to_string_lossy(), now));
                if all_suppressed {
                    continue;
                }
            }
            // Coalesce a burst of events into a single reconciliation pass.
            // An atomic replace (remove-then-recreate within this window)
            // settles into a single `Modify` once `reconcile` diffs the
            // post-debounce snapshot against the last-applied map — see
            // `debounce::DebounceState`'s doc comment.
            sleep(CONFIG_DEBOUNCE).await;
            while fs_events.try_recv().is_ok() {}
            if let Err(err) = self.reconcile(false).await {
                warn!(%err, "watcher reconciliation failed");
            }
        }
    }
}

fn is_relevant(event: &Event) -> bool {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => event
            .paths
            .iter()
            .any(|p| is_relevant_path(p)),
        _ => false,
    }
}

fn content_hash(bytes: &[u8]) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

fn is_relevant_path(path: &std::path::Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with('.') {
        return false;
    }
    name.ends_with(".json") || name == "config.yaml"
}
