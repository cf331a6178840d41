/*!
Persistence shapes for Activities and LiveNode trees.

Serde-friendly structs decoupled from the in-memory arena, plus the
`{activities, jags}` interchange document. Conversion logic lives here
(persist/restore) so repository implementations stay lean. This module
performs no I/O; it is pure data transformation and (de)serialization glue.

Import ordering matters: Activities are loaded into the store before any
LiveNode referencing them is synchronized, so the first derive pass after an
import resolves every URN the document carries.
*/

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use miette::Diagnostic;
use thiserror::Error;

use crate::activity::{Activity, ActivityError};
use crate::project::{LiveNode, ProjectTree};
use crate::store::ActivityStore;
use crate::types::{NodeId, SlotId, Urn};

/// Persisted shape of one LiveNode, nested through `children`.
///
/// Only durable, user-owned state is stored; every derived field
/// (`parent_id`, `project_id`, depth, counts, dependency data) is
/// recomputed from structure on restore.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersistedNode {
    pub id: NodeId,
    pub urn: Urn,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_id: Option<SlotId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contextual_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contextual_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contextual_expected_duration: Option<String>,
    #[serde(default = "default_expanded")]
    pub is_expanded: bool,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub children: Vec<PersistedNode>,
}

fn default_expanded() -> bool {
    true
}

/// The interchange document: flat arrays of Activities and project trees.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JagDocument {
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub jags: Vec<PersistedNode>,
}

impl JagDocument {
    /// Serialize to a compact JSON string.
    pub fn to_json_string(&self) -> Result<String, PersistenceError> {
        serde_json::to_string(self).map_err(|source| PersistenceError::Serde { source })
    }

    /// Parse a document from JSON.
    pub fn from_json_str(input: &str) -> Result<Self, PersistenceError> {
        serde_json::from_str(input).map_err(|source| PersistenceError::Serde { source })
    }
}

/// Convert a live tree into its persisted, nested form.
///
/// Bottom-up assembly over reverse preorder; no recursion.
pub fn persist_tree(tree: &ProjectTree) -> Result<PersistedNode, PersistenceError> {
    let order = tree.preorder_ids();
    let mut built: FxHashMap<NodeId, PersistedNode> = FxHashMap::default();
    for id in &order {
        let node = tree
            .get(*id)
            .ok_or(PersistenceError::MissingNode { id: *id })?;
        built.insert(
            *id,
            PersistedNode {
                id: node.id(),
                urn: node.urn().clone(),
                slot_id: node.slot_id(),
                contextual_name: node.contextual_name.clone(),
                contextual_description: node.contextual_description.clone(),
                contextual_expected_duration: node.contextual_expected_duration.clone(),
                is_expanded: node.is_expanded,
                is_locked: node.is_locked,
                x: node.x,
                y: node.y,
                children: Vec::new(),
            },
        );
    }
    // Children precede parents in reverse preorder, so each parent can
    // claim its fully-assembled children.
    for id in order.iter().rev() {
        let child_ids: Vec<NodeId> = tree.child_ids(*id).to_vec();
        let mut children = Vec::with_capacity(child_ids.len());
        for child in child_ids {
            let assembled = built
                .remove(&child)
                .ok_or(PersistenceError::MissingNode { id: child })?;
            children.push(assembled);
        }
        built
            .get_mut(id)
            .ok_or(PersistenceError::MissingNode { id: *id })?
            .children = children;
    }
    let root = tree.root_id();
    built
        .remove(&root)
        .ok_or(PersistenceError::MissingNode { id: root })
}

/// Rebuild a live tree from its persisted form, preserving node ids.
///
/// Derived fields are left for the next derive pass; the caller is
/// expected to run full resynchronization + derive once the store is warm.
pub fn restore_tree(persisted: &PersistedNode) -> Result<ProjectTree, PersistenceError> {
    let mut seen: FxHashSet<NodeId> = FxHashSet::default();
    let root_id = persisted.id;
    let mut tree = ProjectTree::new(hydrate(persisted, None, root_id));
    seen.insert(root_id);

    let mut stack: Vec<(&PersistedNode, NodeId)> = persisted
        .children
        .iter()
        .rev()
        .map(|child| (child, root_id))
        .collect();
    while let Some((record, parent)) = stack.pop() {
        if !seen.insert(record.id) {
            return Err(PersistenceError::DuplicateNodeId { id: record.id });
        }
        let node = hydrate(record, Some(parent), root_id);
        let id = node.id();
        tree.insert(node);
        tree.node_mut(parent)
            .map_err(|_| PersistenceError::MissingNode { id: parent })?
            .children
            .push(id);
        for child in record.children.iter().rev() {
            stack.push((child, id));
        }
    }
    Ok(tree)
}

fn hydrate(record: &PersistedNode, parent: Option<NodeId>, project: NodeId) -> LiveNode {
    let mut node = LiveNode::new(record.urn.clone(), record.slot_id);
    node.id = record.id;
    node.parent_id = parent;
    node.project_id = project;
    node.contextual_name = record.contextual_name.clone();
    node.contextual_description = record.contextual_description.clone();
    node.contextual_expected_duration = record.contextual_expected_duration.clone();
    node.is_expanded = record.is_expanded;
    node.is_locked = record.is_locked;
    node.x = record.x;
    node.y = record.y;
    node
}

/// Export the given trees and the store's Activities as one document.
///
/// Activities are emitted in URN order so the output is deterministic.
pub fn export_document(
    trees: &[ProjectTree],
    store: &ActivityStore,
) -> Result<JagDocument, PersistenceError> {
    let mut activities: Vec<Activity> = store
        .activities()
        .map(|activity| (**activity).clone())
        .collect();
    activities.sort_by(|a, b| a.urn.cmp(&b.urn));

    let mut jags = Vec::with_capacity(trees.len());
    for tree in trees {
        jags.push(persist_tree(tree)?);
    }
    Ok(JagDocument { activities, jags })
}

/// Import a document: admit its Activities into the store, then rebuild
/// its trees.
///
/// The returned trees carry no derived data yet; run full
/// resynchronization and the derive pipeline on each before use.
pub fn import_document(
    document: JagDocument,
    store: &mut ActivityStore,
) -> Result<Vec<ProjectTree>, PersistenceError> {
    for activity in document.activities {
        store.insert(activity)?;
    }
    let mut trees = Vec::with_capacity(document.jags.len());
    for persisted in &document.jags {
        trees.push(restore_tree(persisted)?);
    }
    Ok(trees)
}

/// Conversion and serialization errors for persistence shapes.
#[derive(Debug, Error, Diagnostic)]
pub enum PersistenceError {
    /// JSON (de)serialization failed.
    #[error("serialization failure: {source}")]
    #[diagnostic(code(jagtree::persistence::serde))]
    Serde {
        #[source]
        source: serde_json::Error,
    },

    /// An imported Activity failed validation.
    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidActivity(#[from] ActivityError),

    /// The same node id appears twice in one document.
    #[error("node id {id} appears more than once")]
    #[diagnostic(
        code(jagtree::persistence::duplicate_node),
        help("Every LiveNode instantiation has its own unique id.")
    )]
    DuplicateNodeId { id: NodeId },

    /// The arena named an id it does not hold.
    #[error("tree references missing node {id}")]
    #[diagnostic(code(jagtree::persistence::missing_node))]
    MissingNode { id: NodeId },
}
