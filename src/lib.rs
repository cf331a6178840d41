//! # jagtree: Joint Activity Graph authoring core
//!
//! jagtree keeps many positioned, user-editable LiveNode trees consistent
//! with shared, mutable Activity definitions — rejecting edits that would
//! recurse forever — and computes a dependency-ordered, non-overlapping
//! layout for trees whose siblings feed data to one another.
//!
//! ## Core Concepts
//!
//! - **Activity**: a reusable, URN-keyed template describing a task's
//!   structure, children, and data endpoints
//! - **LiveNode**: one positioned instantiation of an Activity inside a
//!   project tree (an id-keyed arena, [`project::ProjectTree`])
//! - **Binding**: a declared data-flow edge between an Activity's own
//!   endpoints and those of its direct children
//! - **Route**: one enumerated producer→…→consumer path through an
//!   Activity's sibling dependency graph
//! - **Project**: a LiveNode tree rooted at a node with no parent; every
//!   node carries the root's id as its `project_id`
//!
//! ## The four engines
//!
//! - [`sync`] — builds LiveNode trees from Activities and propagates
//!   Activity structural edits into every affected tree without touching
//!   unrelated subtrees; owns the derived-data pipeline
//! - [`cycle`] — rejects attaches whose descendant-URN-closure reaches
//!   back into the ancestor chain
//! - [`routes`] — enumerates all data-flow paths among siblings and
//!   assigns dependency slots
//! - [`layout`] — turns a derived tree plus a renderer-supplied size
//!   oracle into abstract frames; drawing stays downstream
//!
//! ## Quick Start
//!
//! ```
//! use jagtree::activity::{Activity, EndpointRef};
//! use jagtree::layout::{TimelineLayout, UniformOracle};
//! use jagtree::store::ActivityStore;
//! use jagtree::sync::TreeSync;
//! use jagtree::types::Urn;
//!
//! // Two Activities feeding one another under a common parent.
//! let scan = Urn::parse("urn:demo:scan").unwrap();
//! let report = Urn::parse("urn:demo:report").unwrap();
//!
//! let mut store = ActivityStore::new();
//! store.insert(Activity::new(scan.clone(), "Scan")).unwrap();
//! store.insert(Activity::new(report.clone(), "Report")).unwrap();
//!
//! let mut mission = Activity::new(Urn::parse("urn:demo:mission").unwrap(), "Mission");
//! mission.add_child(scan.clone());
//! mission.add_child(report.clone());
//! mission
//!     .add_binding(
//!         EndpointRef::new(scan, "findings"),
//!         EndpointRef::new(report, "findings"),
//!     )
//!     .unwrap();
//! let mission = store.insert(mission).unwrap();
//!
//! // Build, derive, lay out.
//! let sync = TreeSync::new(&store);
//! let mut outcome = sync.build_tree(&mission.urn, true).unwrap();
//! sync.derive_project_data(&mut outcome.tree).unwrap();
//!
//! let oracle = UniformOracle::new(120.0, 30.0);
//! let layout = TimelineLayout::new(&oracle);
//! let result = layout.compute(&outcome.tree);
//! result.apply(&mut outcome.tree);
//!
//! // The consumer sits to the right of its producer.
//! let root = outcome.tree.root_id();
//! let children = outcome.tree.child_ids(root).to_vec();
//! let scan_node = outcome.tree.get(children[0]).unwrap();
//! let report_node = outcome.tree.get(children[1]).unwrap();
//! assert!(report_node.x > scan_node.x);
//! assert_eq!(scan_node.provides_output_to(), &[report_node.id()]);
//! ```
//!
//! ## Consistency discipline
//!
//! Every structural mutation returns a [`sync::ChangeSet`] and leaves the
//! tree's derived fields stale until
//! [`sync::TreeSync::derive_project_data`] runs — callers re-derive
//! before layout or persistence, and never interleave structural edits
//! with an in-progress derive pass. Persistence
//! ([`repository::Repository`]) is async and happens strictly between
//! synchronization passes; the in-process [`store::ActivityStore`] is the
//! only resolution path during tree walks.
//!
//! ## Module Guide
//!
//! - [`types`] - URNs, node ids, execution modes, extents
//! - [`activity`] - Activity templates, validation, structural edits
//! - [`project`] - the LiveNode arena and iterative traversals
//! - [`store`] - the in-process Activity cache
//! - [`sync`] - tree building, change propagation, derive pipeline
//! - [`cycle`] - the cycle guard
//! - [`routes`] - sibling dependency routing
//! - [`layout`] - the timeline layout engine
//! - [`events`] - change events and the sink-based bus
//! - [`persistence`] - serde shapes and the `{activities, jags}` document
//! - [`repository`] - the async persistence boundary
//! - [`telemetry`] - tracing subscriber setup

pub mod activity;
pub mod cycle;
pub mod events;
pub mod layout;
pub mod persistence;
pub mod project;
pub mod repository;
pub mod routes;
pub mod store;
pub mod sync;
pub mod telemetry;
pub mod types;
