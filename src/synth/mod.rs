mod config_synth;
mod file_synth;

pub use config_synth::synthesize_from_config;
pub use file_synth::{FileSnapshot, synthesize_from_files};

use crate::auth::Auth;
use crate::config::Config;

/// Pure function: given a `Config` and a snapshot of the auth directory,
/// produce a deterministic list of `Auth` records. Never touches network
/// resources and never mutates state outside the returned list.
pub fn synthesize(config: &Config, files: &FileSnapshot) -> Vec<Auth> {
    let mut out = synthesize_from_config(config);
    out.extend(synthesize_from_files(files, config));
    out
}

/// Stable hash used for every config-derived `ID` and for the
/// `excluded_models_hash`/`models_hash` attributes. `DefaultHasher` is
/// SipHash with a fixed process-independent key, so two runs over
/// byte-identical input produce byte-identical digests (invariant 1).
pub(crate) fn stable_hash(parts: &[&str]) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    for part in parts {
        part.hash(&mut hasher);
        0u8.hash(&mut hasher); // separator so ("ab","c") != ("a","bc")
    }
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_hash_is_deterministic() {
        assert_eq!(
            stable_hash(&["gemini", "k1", "", ""]),
            stable_hash(&["gemini", "k1", "", ""])
        );
    }

    #[test]
    fn stable_hash_distinguishes_part_boundaries() {
        assert_ne!(stable_hash(&["ab", "c"]), stable_hash(&["a", "bc"]));
    }
}
