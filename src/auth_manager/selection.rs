//! Pure eligibility and round-robin selection, split out from the Manager's
//! locking so the rotation logic is unit-testable without any async
//! machinery. Grounded on the teacher's
//! `providers/codex/manager/scheduler.rs` `CredentialManager` (per-model
//! `VecDeque` round robin, cooldown bookkeeping), generalized from a
//! per-model bitmask queue to a cursor keyed by the candidate-provider set
//! itself, since here every Auth lives in one flat map rather than a
//! per-provider actor with its own queues.

use crate::auth::{Auth, Provider, Status};
use chrono::{DateTime, Utc};

/// Cursor key for the per-candidate-set round robin: candidate tags sorted
/// and joined so models sharing a provider family share rotation state and
/// models in distinct families rotate independently.
pub fn cursor_key(candidates: &[Provider]) -> String {
    let mut tags: Vec<&str> = candidates.iter().map(Provider::as_str).collect();
    tags.sort_unstable();
    tags.join(",")
}

/// Per §4.5 step 1: `Auth.Provider ∈ candidates` ∧ `!Disabled` ∧
/// `Status = Active` ∧ quota recovered ∧ model not excluded.
pub fn is_eligible(auth: &Auth, candidates: &[Provider], model: &str, now: DateTime<Utc>) -> bool {
    !auth.disabled
        && auth.status == Status::Active
        && candidates.contains(&auth.provider)
        && auth.quota.is_recovered(now)
        && !is_model_excluded(auth, model)
}

fn is_model_excluded(auth: &Auth, model: &str) -> bool {
    auth.attributes
        .get("excluded_models")
        .is_some_and(|csv| csv.split(',').any(|m| m == model))
}

/// Picks the next eligible Auth id from `eligible` (already ID-sorted, e.g.
/// by iterating a `BTreeMap`) starting just after `cursor`, wrapping once.
/// Tie-break on ID lexicographic order falls out of `eligible` already being
/// sorted — this only has to find where to resume.
pub fn pick_round_robin<'a>(eligible: &[&'a str], cursor: Option<&str>) -> Option<&'a str> {
    if eligible.is_empty() {
        return None;
    }
    let start = match cursor {
        Some(last) => match eligible.iter().position(|id| *id > last) {
            Some(idx) => idx,
            None => 0,
        },
        None => 0,
    };
    Some(eligible[start])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Metadata, Quota, Runtime};
    use std::collections::BTreeMap;

    fn auth(id: &str, provider: Provider) -> Auth {
        Auth {
            id: id.to_string(),
            provider,
            label: id.to_string(),
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
    fn cursor_key_is_order_independent() {
        let a = cursor_key(&[Provider::GeminiCli, Provider::Gemini]);
        let b = cursor_key(&[Provider::Gemini, Provider::GeminiCli]);
        assert_eq!(a, b);
    }

    #[test]
    fn disabled_auth_is_never_eligible() {
        let mut a = auth("a1", Provider::Gemini);
        a.disabled = true;
        assert!(!is_eligible(&a, &[Provider::Gemini], "gemini-2.5-pro", Utc::now()));
    }

    #[test]
    fn exhausted_quota_before_recovery_is_ineligible() {
        let mut a = auth("a1", Provider::Gemini);
        a.quota.mark_exhausted(Utc::now() + chrono::Duration::seconds(30));
        assert!(!is_eligible(&a, &[Provider::Gemini], "gemini-2.5-pro", Utc::now()));
        assert!(is_eligible(
            &a,
            &[Provider::Gemini],
            "gemini-2.5-pro",
            Utc::now() + chrono::Duration::seconds(31)
        ));
    }

    #[test]
    fn excluded_model_is_ineligible() {
        let mut a = auth("a1", Provider::Gemini);
        a.attributes.insert("excluded_models".to_string(), "gemini-2.5-pro,gemini-2.5-flash".to_string());
        assert!(!is_eligible(&a, &[Provider::Gemini], "gemini-2.5-pro", Utc::now()));
        assert!(is_eligible(&a, &[Provider::Gemini], "gemini-2.0-flash", Utc::now()));
    }

    #[test]
    fn provider_outside_candidates_is_ineligible() {
        let a = auth("a1", Provider::Codex);
        assert!(!is_eligible(&a, &[Provider::Gemini], "gemini-2.5-pro", Utc::now()));
    }

    #[test]
    fn round_robin_resumes_after_cursor_and_wraps() {
        let ids = vec!["a1", "a2", "a3"];
        assert_eq!(pick_round_robin(&ids, None), Some("a1"));
        assert_eq!(pick_round_robin(&ids, Some("a1")), Some("a2"));
        assert_eq!(pick_round_robin(&ids, Some("a3")), Some("a1"));
    }

    #[test]
    fn round_robin_on_empty_set_yields_none() {
        assert_eq!(pick_round_robin(&[], None), None);
    }
}
