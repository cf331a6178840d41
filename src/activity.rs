//! Activity templates: the reusable building blocks of a Joint Activity
//! Graph.
//!
//! An [`Activity`] describes a task's structure once; LiveNode trees
//! instantiate it many times. Structural edits (child slots, bindings) flow
//! through validated methods here so the invariants in the data model hold
//! before any tree ever sees the record:
//!
//! - child slot ids are unique within an Activity
//! - every binding endpoint names the Activity itself or one of its direct
//!   children
//!
//! # Examples
//!
//! ```rust
//! use jagtree::activity::Activity;
//! use jagtree::types::{ExecutionMode, Urn};
//!
//! let survey = Urn::parse("urn:jag:survey").unwrap();
//! let photograph = Urn::parse("urn:jag:photograph").unwrap();
//!
//! let mut mission = Activity::new(Urn::parse("urn:jag:mission").unwrap(), "Mission")
//!     .with_execution(ExecutionMode::Sequential);
//! let slot_a = mission.add_child(survey.clone());
//! let slot_b = mission.add_child(survey);
//! let slot_c = mission.add_child(photograph);
//! assert_ne!(slot_a, slot_b); // same URN, distinct slots
//!
//! mission.remove_child(slot_c).unwrap();
//! assert_eq!(mission.children.len(), 2);
//! ```

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{ExecutionMode, Operator, SlotId, Urn};

/// A named, typed data endpoint declared on an Activity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,
    /// Free-form type tag (e.g. `"text"`, `"coordinates"`). Opaque to the
    /// core; consumers interpret it.
    #[serde(default)]
    pub kind: String,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }
}

/// One end of a binding: an endpoint on the owning Activity or on one of
/// its direct children, named by URN.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointRef {
    pub urn: Urn,
    pub endpoint: String,
}

impl EndpointRef {
    pub fn new(urn: Urn, endpoint: impl Into<String>) -> Self {
        Self {
            urn,
            endpoint: endpoint.into(),
        }
    }
}

/// A declared data-flow edge between two endpoints, scoped to an Activity
/// and its direct children.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Binding {
    pub from: EndpointRef,
    pub to: EndpointRef,
}

/// One ordered child-slot of an Activity.
///
/// The slot id, not the URN, identifies the slot: two slots may carry the
/// same child URN.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChildSlot {
    pub slot_id: SlotId,
    pub urn: Urn,
}

/// Execution connector: how children run and how their outcomes combine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connector {
    #[serde(default)]
    pub execution: ExecutionMode,
    #[serde(default)]
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<String>,
}

/// A reusable activity template, keyed by a unique URN.
///
/// Activities are shared, mutable definitions; every LiveNode holding the
/// same URN reflects edits made here once the tree is re-synchronized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub urn: Urn,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub connector: Connector,
    #[serde(default)]
    pub children: Vec<ChildSlot>,
    #[serde(default)]
    pub inputs: Vec<Endpoint>,
    #[serde(default)]
    pub outputs: Vec<Endpoint>,
    #[serde(default)]
    pub bindings: Vec<Binding>,
    /// Locked Activities refuse destructive renames.
    #[serde(default)]
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Activity {
    /// Create a new Activity with the given URN and display name.
    #[must_use]
    pub fn new(urn: Urn, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            urn,
            name: name.into(),
            description: String::new(),
            connector: Connector::default(),
            children: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            bindings: Vec::new(),
            is_locked: false,
            created_at: now,
            modified_at: now,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.connector.execution = execution;
        self
    }

    #[must_use]
    pub fn with_operator(mut self, operator: Operator) -> Self {
        self.connector.operator = operator;
        self
    }

    #[must_use]
    pub fn with_input(mut self, endpoint: Endpoint) -> Self {
        self.inputs.push(endpoint);
        self
    }

    #[must_use]
    pub fn with_output(mut self, endpoint: Endpoint) -> Self {
        self.outputs.push(endpoint);
        self
    }

    /// Check the structural invariants of this record.
    ///
    /// Called by the store before an Activity is admitted to the cache, so
    /// a malformed record is rejected before it can touch any tree.
    pub fn validate(&self) -> Result<(), ActivityError> {
        let mut seen = FxHashSet::default();
        for slot in &self.children {
            if !seen.insert(slot.slot_id) {
                return Err(ActivityError::DuplicateSlotId {
                    urn: self.urn.clone(),
                    slot: slot.slot_id,
                });
            }
        }
        for binding in &self.bindings {
            for end in [&binding.from, &binding.to] {
                if !self.is_in_binding_scope(&end.urn) {
                    return Err(ActivityError::BindingOutOfScope {
                        urn: self.urn.clone(),
                        endpoint_urn: end.urn.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Rename this Activity. Locked Activities refuse the edit.
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), ActivityError> {
        if self.is_locked {
            return Err(ActivityError::Locked {
                urn: self.urn.clone(),
            });
        }
        self.name = name.into();
        self.touch();
        Ok(())
    }

    /// Append a child slot for `urn`, minting the next free slot id.
    pub fn add_child(&mut self, urn: Urn) -> SlotId {
        let next = self
            .children
            .iter()
            .map(|slot| slot.slot_id.0 + 1)
            .max()
            .unwrap_or(0);
        let slot_id = SlotId(next);
        self.children.push(ChildSlot { slot_id, urn });
        self.touch();
        slot_id
    }

    /// Remove the child slot with the given id.
    ///
    /// Bindings whose endpoints only resolved through the removed slot's
    /// URN are dropped with it; bindings still in scope (the URN survives
    /// in another slot, or names the Activity itself) are kept.
    pub fn remove_child(&mut self, slot_id: SlotId) -> Result<ChildSlot, ActivityError> {
        let index = self
            .children
            .iter()
            .position(|slot| slot.slot_id == slot_id)
            .ok_or(ActivityError::UnknownSlot {
                urn: self.urn.clone(),
                slot: slot_id,
            })?;
        let removed = self.children.remove(index);
        let scope: FxHashSet<Urn> = std::iter::once(self.urn.clone())
            .chain(self.children.iter().map(|slot| slot.urn.clone()))
            .collect();
        self.bindings
            .retain(|binding| scope.contains(&binding.from.urn) && scope.contains(&binding.to.urn));
        self.touch();
        Ok(removed)
    }

    /// Declare a data-flow edge between two endpoints in scope.
    pub fn add_binding(&mut self, from: EndpointRef, to: EndpointRef) -> Result<(), ActivityError> {
        for end in [&from, &to] {
            if !self.is_in_binding_scope(&end.urn) {
                return Err(ActivityError::BindingOutOfScope {
                    urn: self.urn.clone(),
                    endpoint_urn: end.urn.clone(),
                });
            }
        }
        let binding = Binding { from, to };
        if !self.bindings.contains(&binding) {
            self.bindings.push(binding);
            self.touch();
        }
        Ok(())
    }

    /// Remove a previously declared binding.
    pub fn remove_binding(
        &mut self,
        from: &EndpointRef,
        to: &EndpointRef,
    ) -> Result<(), ActivityError> {
        let before = self.bindings.len();
        self.bindings
            .retain(|binding| !(&binding.from == from && &binding.to == to));
        if self.bindings.len() == before {
            return Err(ActivityError::UnknownBinding {
                urn: self.urn.clone(),
            });
        }
        self.touch();
        Ok(())
    }

    /// The slot with the given id, if any.
    #[must_use]
    pub fn slot(&self, slot_id: SlotId) -> Option<&ChildSlot> {
        self.children.iter().find(|slot| slot.slot_id == slot_id)
    }

    /// URNs of all direct children, in slot order (duplicates preserved).
    pub fn child_urns(&self) -> impl Iterator<Item = &Urn> {
        self.children.iter().map(|slot| &slot.urn)
    }

    fn is_in_binding_scope(&self, urn: &Urn) -> bool {
        urn == &self.urn || self.children.iter().any(|slot| &slot.urn == urn)
    }

    fn touch(&mut self) {
        self.modified_at = Utc::now();
    }
}

/// Errors raised by Activity validation and structural edits.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ActivityError {
    /// Two child slots carry the same slot id.
    #[error("activity {urn} declares slot {slot} more than once")]
    #[diagnostic(code(jagtree::activity::duplicate_slot))]
    DuplicateSlotId { urn: Urn, slot: SlotId },

    /// A binding endpoint names a URN that is neither the Activity nor one
    /// of its direct children.
    #[error("binding endpoint {endpoint_urn} is out of scope for activity {urn}")]
    #[diagnostic(
        code(jagtree::activity::binding_out_of_scope),
        help("Bindings may only connect an activity's own endpoints and those of its direct children.")
    )]
    BindingOutOfScope { urn: Urn, endpoint_urn: Urn },

    /// The referenced slot does not exist.
    #[error("activity {urn} has no child slot {slot}")]
    #[diagnostic(code(jagtree::activity::unknown_slot))]
    UnknownSlot { urn: Urn, slot: SlotId },

    /// The referenced binding does not exist.
    #[error("activity {urn} has no such binding")]
    #[diagnostic(code(jagtree::activity::unknown_binding))]
    UnknownBinding { urn: Urn },

    /// The Activity is locked against destructive edits.
    #[error("activity {urn} is locked")]
    #[diagnostic(code(jagtree::activity::locked))]
    Locked { urn: Urn },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urn(s: &str) -> Urn {
        Urn::parse(s).unwrap()
    }

    #[test]
    fn slot_ids_stay_unique_under_churn() {
        let mut act = Activity::new(urn("urn:jag:parent"), "Parent");
        let a = act.add_child(urn("urn:jag:child"));
        let b = act.add_child(urn("urn:jag:child"));
        assert_ne!(a, b);
        act.remove_child(a).unwrap();
        let c = act.add_child(urn("urn:jag:other"));
        assert_ne!(b, c);
        assert!(act.validate().is_ok());
    }

    #[test]
    fn binding_scope_is_enforced() {
        let mut act = Activity::new(urn("urn:jag:parent"), "Parent");
        act.add_child(urn("urn:jag:a"));
        act.add_child(urn("urn:jag:b"));

        let ok = act.add_binding(
            EndpointRef::new(urn("urn:jag:a"), "out"),
            EndpointRef::new(urn("urn:jag:b"), "in"),
        );
        assert!(ok.is_ok());

        let err = act.add_binding(
            EndpointRef::new(urn("urn:jag:stranger"), "out"),
            EndpointRef::new(urn("urn:jag:b"), "in"),
        );
        assert!(matches!(err, Err(ActivityError::BindingOutOfScope { .. })));
    }

    #[test]
    fn removing_last_slot_for_urn_drops_its_bindings() {
        let mut act = Activity::new(urn("urn:jag:parent"), "Parent");
        let slot_a = act.add_child(urn("urn:jag:a"));
        act.add_child(urn("urn:jag:b"));
        act.add_binding(
            EndpointRef::new(urn("urn:jag:a"), "out"),
            EndpointRef::new(urn("urn:jag:b"), "in"),
        )
        .unwrap();

        act.remove_child(slot_a).unwrap();
        assert!(act.bindings.is_empty());
    }

    #[test]
    fn removing_one_of_two_same_urn_slots_keeps_bindings() {
        let mut act = Activity::new(urn("urn:jag:parent"), "Parent");
        let slot_a = act.add_child(urn("urn:jag:a"));
        act.add_child(urn("urn:jag:a"));
        act.add_child(urn("urn:jag:b"));
        act.add_binding(
            EndpointRef::new(urn("urn:jag:a"), "out"),
            EndpointRef::new(urn("urn:jag:b"), "in"),
        )
        .unwrap();

        act.remove_child(slot_a).unwrap();
        assert_eq!(act.bindings.len(), 1);
    }

    #[test]
    fn locked_activity_refuses_rename() {
        let mut act = Activity::new(urn("urn:jag:parent"), "Parent");
        act.is_locked = true;
        assert!(matches!(
            act.set_name("New"),
            Err(ActivityError::Locked { .. })
        ));
        assert_eq!(act.name, "Parent");
    }
}
