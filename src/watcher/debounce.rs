use crate::auth::{Auth, AuthUpdate, UpdateAction};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Per-path hash cache plus the remove-storm disambiguation state. Pure
/// logic, no filesystem access, so it is exercised directly by tests without
/// touching a real directory. Atomic-replace disambiguation itself (§4.4:
/// "if the path re-appears with changed content, the event is converted to a
/// modify") falls out for free from `Watcher::reconcile`'s full-snapshot
/// diffing — a remove immediately followed by a recreate-with-new-content
/// settles, by the time the debounce window drains, into a single `Modify`
/// against the last-applied map, never a spurious `Delete`+`Add` pair. What
/// full-snapshot diffing does *not* give for free is dropping a storm of
/// redundant remove events on one path before they even trigger a
/// reconciliation pass; that's what `should_suppress_remove` is for.
#[derive(Debug, Default)]
pub struct DebounceState {
    last_hash: BTreeMap<String, u64>,
    recent_removes: BTreeMap<String, Instant>,
}

pub const REMOVE_STORM_WINDOW: Duration = Duration::from_secs(1);

impl DebounceState {
    /// Returns `true` when `path`'s content hash changed (or is new) since
    /// the last applied reload, short-circuiting redundant reloads.
    pub fn hash_changed(&mut self, path: &str, hash: u64) -> bool {
        let changed = self.last_hash.get(path) != Some(&hash);
        self.last_hash.insert(path.to_string(), hash);
        changed
    }

    pub fn forget(&mut self, path: &str) {
        self.last_hash.remove(path);
    }

    /// True when a remove event for `path` within `REMOVE_STORM_WINDOW` of a
    /// prior remove should be suppressed (platform event storms).
    pub fn should_suppress_remove(&mut self, path: &str, now: Instant) -> bool {
        if let Some(last) = self.recent_removes.get(path) {
            if now.duration_since(*last) < REMOVE_STORM_WINDOW {
                return true;
            }
        }
        self.recent_removes.insert(path.to_string(), now);
        false
    }
}

/// Diffs a freshly synthesised `Auth` set against the last-emitted set,
/// producing a minimal ordered sequence of updates: every `Add`/`Modify`
/// precedes every `Delete`, by construction, so deletes for an ID can never
/// overtake a prior add for the same ID within one batch.
pub fn diff(
    previous: &BTreeMap<String, Auth>,
    current: &[Auth],
    force_refresh: bool,
) -> Vec<AuthUpdate> {
    let mut updates = Vec::new();
    let mut seen = std::collections::BTreeSet::new();

    for auth in current {
        seen.insert(auth.id.clone());
        match previous.get(&auth.id) {
            None => updates.push(AuthUpdate {
                action: UpdateAction::Add,
                id: auth.id.clone(),
                auth: Some(auth.clone()),
            }),
            Some(prev) => {
                let changed = serde_json::to_value(prev.normalized_for_compare()).ok()
                    != serde_json::to_value(auth.normalized_for_compare()).ok();
                if changed || force_refresh {
                    updates.push(AuthUpdate {
                        action: UpdateAction::Modify,
                        id: auth.id.clone(),
                        auth: Some(auth.clone()),
                    });
                }
            }
        }
    }

    for id in previous.keys() {
        if !seen.contains(id) {
            updates.push(AuthUpdate {
                action: UpdateAction::Delete,
                id: id.clone(),
                auth: None,
            });
        }
    }

    updates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Metadata, Provider, Quota, Runtime, Status};

    fn auth(id: &str) -> Auth {
        let now = chrono::Utc::now();
        Auth {
            id: id.to_string(),
            provider: Provider::Gemini,
            label: id.to_string(),
            status: Status::Active,
            disabled: false,
            attributes: Default::default(),
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

    #[test]
    fn diff_emits_add_for_new_id() {
        let prev = BTreeMap::new();
        let updates = diff(&prev, &[auth("a1")], false);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].action, UpdateAction::Add);
    }

    #[test]
    fn diff_emits_delete_for_removed_id() {
        let mut prev = BTreeMap::new();
        prev.insert("a1".to_string(), auth("a1"));
        let updates = diff(&prev, &[], false);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].action, UpdateAction::Delete);
    }

    #[test]
    fn diff_skips_unchanged_records_unless_forced() {
        let mut prev = BTreeMap::new();
        prev.insert("a1".to_string(), auth("a1"));
        assert!(diff(&prev, &[auth("a1")], false).is_empty());
        assert_eq!(diff(&prev, &[auth("a1")], true).len(), 1);
    }

    #[test]
    fn diff_orders_adds_before_deletes() {
        let mut prev = BTreeMap::new();
        prev.insert("old".to_string(), auth("old"));
        let updates = diff(&prev, &[auth("new")], false);
        let positions: Vec<UpdateAction> = updates.iter().map(|u| u.action).collect();
        assert_eq!(positions, vec![UpdateAction::Add, UpdateAction::Delete]);
    }

    #[test]
    fn remove_storm_is_suppressed_within_window() {
        let mut state = DebounceState::default();
        let t0 = Instant::now();
        assert!(!state.should_suppress_remove("p", t0));
        assert!(state.should_suppress_remove("p", t0 + Duration::from_millis(10)));
    }
}
