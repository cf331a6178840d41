//! Async persistence boundary for Activities and project trees.
//!
//! The [`Repository`] trait is the crate's only asynchronous surface:
//! everything the sync and layout engines do runs over the in-process
//! [`crate::store::ActivityStore`], and persistence happens before or after
//! a synchronization pass, never during one.
//!
//! Durable backends live outside this crate; [`InMemoryRepository`] is
//! provided for tests and session-local use. A persistence failure leaves
//! the in-memory tree as the source of truth — callers log and retry, they
//! do not roll back.

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::activity::Activity;
use crate::persistence::PersistedNode;
use crate::types::{NodeId, Urn};

/// Result alias for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Async key/value persistence for Activities (keyed by URN) and project
/// trees (keyed by the root node id).
#[async_trait]
pub trait Repository: Send + Sync {
    async fn all_activities(&self) -> Result<Vec<Activity>>;
    async fn get_activity(&self, urn: &Urn) -> Result<Option<Activity>>;
    async fn has_activity(&self, urn: &Urn) -> Result<bool>;
    /// Store a new Activity; fails if the URN is already taken.
    async fn create_activity(&self, activity: Activity) -> Result<()>;
    /// Replace an existing Activity; fails if the URN is unknown.
    async fn update_activity(&self, activity: Activity) -> Result<()>;
    async fn delete_activity(&self, urn: &Urn) -> Result<()>;

    async fn all_projects(&self) -> Result<Vec<PersistedNode>>;
    async fn get_project(&self, id: NodeId) -> Result<Option<PersistedNode>>;
    async fn has_project(&self, id: NodeId) -> Result<bool>;
    /// Store a new project tree; fails if the id is already taken.
    async fn create_project(&self, project: PersistedNode) -> Result<()>;
    /// Replace an existing project tree; fails if the id is unknown.
    async fn update_project(&self, project: PersistedNode) -> Result<()>;
    async fn delete_project(&self, id: NodeId) -> Result<()>;
}

/// Errors surfaced by repository implementations.
#[derive(Debug, Error, Diagnostic)]
pub enum RepositoryError {
    /// A create hit an existing key.
    #[error("record {key} already exists")]
    #[diagnostic(code(jagtree::repository::conflict))]
    Conflict { key: String },

    /// An update or delete named an absent key.
    #[error("record {key} not found")]
    #[diagnostic(code(jagtree::repository::not_found))]
    NotFound { key: String },

    /// Backend-specific failure (connection, serialization, quota).
    #[error("repository backend error: {message}")]
    #[diagnostic(
        code(jagtree::repository::backend),
        help("The in-memory tree remains authoritative; retry the persist.")
    )]
    Backend { message: String },
}

impl RepositoryError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// Volatile repository for tests and session-local state.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    activities: RwLock<FxHashMap<Urn, Activity>>,
    projects: RwLock<FxHashMap<NodeId, PersistedNode>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn all_activities(&self) -> Result<Vec<Activity>> {
        let guard = self.activities.read().await;
        let mut records: Vec<Activity> = guard.values().cloned().collect();
        records.sort_by(|a, b| a.urn.cmp(&b.urn));
        Ok(records)
    }

    async fn get_activity(&self, urn: &Urn) -> Result<Option<Activity>> {
        Ok(self.activities.read().await.get(urn).cloned())
    }

    async fn has_activity(&self, urn: &Urn) -> Result<bool> {
        Ok(self.activities.read().await.contains_key(urn))
    }

    async fn create_activity(&self, activity: Activity) -> Result<()> {
        let mut guard = self.activities.write().await;
        if guard.contains_key(&activity.urn) {
            return Err(RepositoryError::Conflict {
                key: activity.urn.to_string(),
            });
        }
        guard.insert(activity.urn.clone(), activity);
        Ok(())
    }

    async fn update_activity(&self, activity: Activity) -> Result<()> {
        let mut guard = self.activities.write().await;
        if !guard.contains_key(&activity.urn) {
            return Err(RepositoryError::NotFound {
                key: activity.urn.to_string(),
            });
        }
        guard.insert(activity.urn.clone(), activity);
        Ok(())
    }

    async fn delete_activity(&self, urn: &Urn) -> Result<()> {
        let mut guard = self.activities.write().await;
        guard.remove(urn).ok_or_else(|| RepositoryError::NotFound {
            key: urn.to_string(),
        })?;
        Ok(())
    }

    async fn all_projects(&self) -> Result<Vec<PersistedNode>> {
        Ok(self.projects.read().await.values().cloned().collect())
    }

    async fn get_project(&self, id: NodeId) -> Result<Option<PersistedNode>> {
        Ok(self.projects.read().await.get(&id).cloned())
    }

    async fn has_project(&self, id: NodeId) -> Result<bool> {
        Ok(self.projects.read().await.contains_key(&id))
    }

    async fn create_project(&self, project: PersistedNode) -> Result<()> {
        let mut guard = self.projects.write().await;
        if guard.contains_key(&project.id) {
            return Err(RepositoryError::Conflict {
                key: project.id.to_string(),
            });
        }
        guard.insert(project.id, project);
        Ok(())
    }

    async fn update_project(&self, project: PersistedNode) -> Result<()> {
        let mut guard = self.projects.write().await;
        if !guard.contains_key(&project.id) {
            return Err(RepositoryError::NotFound {
                key: project.id.to_string(),
            });
        }
        guard.insert(project.id, project);
        Ok(())
    }

    async fn delete_project(&self, id: NodeId) -> Result<()> {
        let mut guard = self.projects.write().await;
        guard.remove(&id).ok_or_else(|| RepositoryError::NotFound {
            key: id.to_string(),
        })?;
        Ok(())
    }
}
