//! In-process Activity cache with an explicit lifecycle.
//!
//! The [`ActivityStore`] is the synchronous resolution path every tree walk
//! uses: building, updating, deriving, and cycle checking all resolve URNs
//! here and never suspend mid-traversal. Persistence is a separate, async
//! concern (see [`crate::repository`]); the store is warmed from a
//! repository up front and refreshed explicitly.
//!
//! The store is constructed once per session and injected into the sync
//! engine — there is no ambient global state.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::activity::{Activity, ActivityError};
use crate::repository::{Repository, RepositoryError};
use crate::types::Urn;

/// URN-keyed cache of resolved [`Activity`] definitions.
#[derive(Clone, Debug, Default)]
pub struct ActivityStore {
    activities: FxHashMap<Urn, Arc<Activity>>,
}

impl ActivityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and admit an Activity, replacing any previous definition
    /// under the same URN.
    ///
    /// # Errors
    ///
    /// Returns the validation failure; the store is left unchanged.
    pub fn insert(&mut self, activity: Activity) -> Result<Arc<Activity>, ActivityError> {
        activity.validate()?;
        let urn = activity.urn.clone();
        let shared = Arc::new(activity);
        self.activities.insert(urn, shared.clone());
        Ok(shared)
    }

    /// Resolve a URN to its cached Activity.
    #[must_use]
    pub fn resolve(&self, urn: &Urn) -> Option<Arc<Activity>> {
        self.activities.get(urn).cloned()
    }

    #[must_use]
    pub fn contains(&self, urn: &Urn) -> bool {
        self.activities.contains_key(urn)
    }

    /// Drop one definition. Trees referencing it will report the URN as
    /// missing on their next derive pass.
    pub fn remove(&mut self, urn: &Urn) -> Option<Arc<Activity>> {
        self.activities.remove(urn)
    }

    /// Drop every cached definition.
    pub fn clear(&mut self) {
        self.activities.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.activities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    /// All cached URNs, unordered.
    pub fn urns(&self) -> impl Iterator<Item = &Urn> {
        self.activities.keys()
    }

    /// All cached definitions, unordered.
    pub fn activities(&self) -> impl Iterator<Item = &Arc<Activity>> {
        self.activities.values()
    }

    /// Replace the cache contents with everything the repository holds.
    ///
    /// Records that fail validation are skipped with a warning rather than
    /// poisoning the whole load.
    pub async fn load_from(&mut self, repository: &dyn Repository) -> Result<usize, RepositoryError> {
        let records = repository.all_activities().await?;
        self.activities.clear();
        let mut loaded = 0;
        for activity in records {
            let urn = activity.urn.clone();
            match self.insert(activity) {
                Ok(_) => loaded += 1,
                Err(error) => {
                    tracing::warn!(%urn, %error, "skipping invalid activity during store load");
                }
            }
        }
        debug!(loaded, "activity store loaded");
        Ok(loaded)
    }

    /// The set of URNs reachable downward from `urn` through Activity
    /// child definitions, inclusive of `urn` itself.
    ///
    /// Follows definitions in the store, not instantiated LiveNodes, so a
    /// collapsed subtree still contributes everything it would expand to.
    /// URNs absent from the store terminate their branch. Iterative
    /// worklist; already-visited URNs are not re-expanded, which also
    /// bounds the walk on (invalid) cyclic definitions.
    #[must_use]
    pub fn descendant_closure(&self, urn: &Urn) -> FxHashSet<Urn> {
        let mut closure = FxHashSet::default();
        let mut work = vec![urn.clone()];
        while let Some(current) = work.pop() {
            if !closure.insert(current.clone()) {
                continue;
            }
            if let Some(activity) = self.activities.get(&current) {
                for child in activity.child_urns() {
                    if !closure.contains(child) {
                        work.push(child.clone());
                    }
                }
            }
        }
        closure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SlotId;

    fn urn(s: &str) -> Urn {
        Urn::parse(s).unwrap()
    }

    fn with_children(name: &str, children: &[&str]) -> Activity {
        let mut act = Activity::new(urn(name), name);
        for child in children {
            act.add_child(urn(child));
        }
        act
    }

    #[test]
    fn insert_rejects_invalid_records() {
        let mut store = ActivityStore::new();
        let mut bad = with_children("urn:jag:parent", &["urn:jag:a"]);
        bad.children.push(crate::activity::ChildSlot {
            slot_id: SlotId(0),
            urn: urn("urn:jag:b"),
        });
        assert!(store.insert(bad).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn closure_is_transitive_and_inclusive() {
        let mut store = ActivityStore::new();
        store
            .insert(with_children("urn:jag:top", &["urn:jag:mid"]))
            .unwrap();
        store
            .insert(with_children("urn:jag:mid", &["urn:jag:leaf"]))
            .unwrap();

        let closure = store.descendant_closure(&urn("urn:jag:top"));
        for expected in ["urn:jag:top", "urn:jag:mid", "urn:jag:leaf"] {
            assert!(closure.contains(&urn(expected)), "missing {expected}");
        }
        assert_eq!(closure.len(), 3);
    }

    #[test]
    fn closure_stops_at_unknown_urns() {
        let mut store = ActivityStore::new();
        store
            .insert(with_children("urn:jag:top", &["urn:jag:ghost"]))
            .unwrap();
        let closure = store.descendant_closure(&urn("urn:jag:top"));
        assert!(closure.contains(&urn("urn:jag:ghost")));
        assert_eq!(closure.len(), 2);
    }
}
