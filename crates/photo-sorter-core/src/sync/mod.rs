//! Content-hash reconciliation against the remote catalog.
//!
//! The remote system nondeterministically suffixes filenames with a unique
//! id, so every comparison happens on id-stripped names. The tracked hash
//! record stored remotely is only trusted while it still mirrors the
//! remote's actual filename set; otherwise it is discarded and the plan
//! degrades to a full resync.

pub mod executor;
pub mod remote;

use std::collections::{BTreeMap, BTreeSet};

use log::warn;

use crate::naming::strip_remote_id;
use remote::RemoteImage;

/// Canonical filename -> content hash.
pub type HashRecord = BTreeMap<String, String>;

/// Minimal set of mutations bringing the remote in line with the local set.
#[derive(Debug, Default)]
pub struct ReconciliationPlan {
    pub to_remove: Vec<RemoteImage>,
    pub to_add: Vec<String>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }
}

/// Decide whether the tracked record still describes the remote's actual
/// images. A drifted record is worse than none: discard it.
pub fn effective_tracked(tracked: Option<HashRecord>, actual: &[RemoteImage]) -> HashRecord {
    let Some(tracked) = tracked else {
        return HashRecord::new();
    };

    let tracked_names: BTreeSet<String> = tracked.keys().map(|k| strip_remote_id(k)).collect();
    let actual_names: BTreeSet<String> =
        actual.iter().map(|i| strip_remote_id(&i.filename)).collect();

    if tracked_names == actual_names {
        tracked
    } else {
        warn!("Tracked remote state does not match the remote's actual images; planning a full resync");
        HashRecord::new()
    }
}

/// Compute the add/remove plan. With no usable tracked state, everything
/// remote goes and everything local is uploaded.
pub fn compute_plan(
    local: &HashRecord,
    tracked: &HashRecord,
    actual: &[RemoteImage],
) -> ReconciliationPlan {
    if tracked.is_empty() {
        return ReconciliationPlan {
            to_remove: actual.to_vec(),
            to_add: local.keys().cloned().collect(),
        };
    }

    let tracked_stripped: HashRecord = tracked
        .iter()
        .map(|(name, hash)| (strip_remote_id(name), hash.clone()))
        .collect();

    let to_remove = actual
        .iter()
        .filter(|img| {
            let stripped = strip_remote_id(&img.filename);
            let stale_hash = match (local.get(&stripped), tracked_stripped.get(&stripped)) {
                (Some(local_hash), Some(recorded)) => local_hash != recorded,
                _ => true,
            };
            // A suffixed copy of a name that also exists unsuffixed is a
            // known remote duplication artifact: always clean it up.
            let duplicate_suffix =
                img.filename != stripped && actual.iter().any(|o| o.filename == stripped);

            stale_hash || duplicate_suffix
        })
        .cloned()
        .collect();

    let to_add = local
        .iter()
        .filter(|(name, hash)| tracked_stripped.get(*name) != Some(hash))
        .map(|(name, _)| name.clone())
        .collect();

    ReconciliationPlan { to_remove, to_add }
}

/// Post-apply check: the remote's id-stripped filename set must equal the
/// local canonical set.
pub fn verify_converged(local: &HashRecord, actual: &[RemoteImage]) -> bool {
    let remote_names: BTreeSet<String> =
        actual.iter().map(|i| strip_remote_id(&i.filename)).collect();
    let local_names: BTreeSet<String> = local.keys().cloned().collect();
    remote_names == local_names
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;

    fn img(id: u64, filename: &str) -> RemoteImage {
        RemoteImage {
            id,
            filename: filename.to_string(),
            src: format!("https://cdn.example.com/{}", filename),
        }
    }

    fn record(pairs: &[(&str, &str)]) -> HashRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_changed_hash_is_removed_and_readded() {
        let local = record(&[("a.jpg", "h1"), ("b.jpg", "h2")]);
        let tracked = record(&[("a.jpg", "h1"), ("b.jpg", "h3")]);
        let actual = vec![img(1, "a.jpg"), img(2, "b.jpg")];

        let plan = compute_plan(&local, &tracked, &actual);
        assert_eq!(plan.to_add, vec!["b.jpg".to_string()]);
        assert_eq!(plan.to_remove.len(), 1);
        assert_eq!(plan.to_remove[0].filename, "b.jpg");
    }

    #[test]
    fn test_suffixed_duplicate_is_cleaned_up() {
        let suffixed = "photo_550e8400-e29b-41d4-a716-446655440000.jpg";
        let local = record(&[("photo.jpg", "h1")]);
        let tracked = record(&[("photo.jpg", "h1"), (suffixed, "h1")]);
        let actual = vec![img(1, "photo.jpg"), img(2, suffixed)];

        let plan = compute_plan(&local, &tracked, &actual);
        assert!(plan.to_add.is_empty());
        assert_eq!(plan.to_remove.len(), 1);
        assert_eq!(plan.to_remove[0].filename, suffixed);
    }

    #[test]
    fn test_missing_tracked_state_means_full_resync() {
        let local = record(&[("a.jpg", "h1")]);
        let actual = vec![img(1, "x.jpg"), img(2, "y.jpg")];

        let plan = compute_plan(&local, &HashRecord::new(), &actual);
        assert_eq!(plan.to_add, vec!["a.jpg".to_string()]);
        assert_eq!(plan.to_remove.len(), 2);
    }

    #[test]
    fn test_stale_tracked_state_is_discarded() {
        let tracked = record(&[("a.jpg", "h1")]);
        let actual = vec![img(1, "a.jpg"), img(2, "stray.jpg")];

        assert!(effective_tracked(Some(tracked), &actual).is_empty());
    }

    #[test]
    fn test_tracked_state_with_suffixed_names_still_matches() {
        let suffixed = "a_550e8400-e29b-41d4-a716-446655440000.jpg";
        let tracked = record(&[(suffixed, "h1")]);
        let actual = vec![img(1, "a.jpg")];

        assert_eq!(effective_tracked(Some(tracked.clone()), &actual).len(), 1);
    }

    #[test]
    fn test_in_sync_plan_is_empty() {
        let local = record(&[("a.jpg", "h1")]);
        let tracked = record(&[("a.jpg", "h1")]);
        let actual = vec![img(1, "a.jpg")];

        assert!(compute_plan(&local, &tracked, &actual).is_empty());
    }

    #[test]
    fn test_verify_converged_ignores_id_suffixes() {
        let local = record(&[("a.jpg", "h1")]);
        let actual = vec![img(1, "a_550e8400-e29b-41d4-a716-446655440000.jpg")];
        assert!(verify_converged(&local, &actual));

        let actual = vec![img(1, "b.jpg")];
        assert!(!verify_converged(&local, &actual));
    }
}
