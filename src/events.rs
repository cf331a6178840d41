//! Event fan-out for decoupled consumers.
//!
//! The core APIs already return [`crate::sync::ChangeSet`]s — "what
//! changed" as data. The [`EventBus`] is the complementary broadcast
//! path: library panels, renderers, and persistence subscribe through
//! [`EventSink`]s and receive the same facts without holding the tree.
//!
//! The bus is an explicit object with a defined lifecycle: construct it
//! with sinks, start the listener, emit through cloned senders, stop it.
//! Nothing global.

use std::io::{self, Result as IoResult, Stdout, Write};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{sync::oneshot, task};

use crate::sync::ChangeSet;
use crate::types::{NodeId, Urn};

/// One observable fact about the authoring session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Event {
    /// An Activity definition changed; trees referencing it need a sync.
    ActivityChanged { urn: Urn },
    /// A subtree was attached under `project`.
    #[serde(rename = "livenode-attached")]
    NodeAttached { node: NodeId, project: NodeId },
    /// A subtree was detached from `project` (and promoted elsewhere).
    #[serde(rename = "livenode-detached")]
    NodeDetached { node: NodeId, project: NodeId },
    /// A layout pass finished for `project`.
    LayoutComputed { project: NodeId, nodes: usize },
}

impl Event {
    /// Stable label for routing and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Event::ActivityChanged { .. } => "activity-changed",
            Event::NodeAttached { .. } => "livenode-attached",
            Event::NodeDetached { .. } => "livenode-detached",
            Event::LayoutComputed { .. } => "layout-computed",
        }
    }

    /// Structured JSON form with a timestamp, for sinks that log or ship
    /// events elsewhere.
    #[must_use]
    pub fn to_json_value(&self) -> serde_json::Value {
        let when: DateTime<Utc> = Utc::now();
        serde_json::json!({
            "kind": self.kind(),
            "event": self,
            "timestamp": when.to_rfc3339(),
        })
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::ActivityChanged { urn } => write!(f, "activity-changed {urn}"),
            Event::NodeAttached { node, project } => {
                write!(f, "livenode-attached {node} -> {project}")
            }
            Event::NodeDetached { node, project } => {
                write!(f, "livenode-detached {node} <- {project}")
            }
            Event::LayoutComputed { project, nodes } => {
                write!(f, "layout-computed {project} ({nodes} nodes)")
            }
        }
    }
}

/// Translate a change set into the events it implies, in change order.
#[must_use]
pub fn events_from_change_set(project: NodeId, change: &ChangeSet) -> Vec<Event> {
    let mut events = Vec::new();
    for node in &change.attached {
        events.push(Event::NodeAttached {
            node: *node,
            project,
        });
    }
    for node in &change.detached {
        events.push(Event::NodeDetached {
            node: *node,
            project,
        });
    }
    events
}

/// Abstraction over an output target that consumes full Event objects.
pub trait EventSink: Send + Sync {
    /// Handle a structured event. The sink decides how to format it.
    fn handle(&mut self, event: &Event) -> IoResult<()>;
}

/// Stdout sink: one Display line per event.
pub struct StdOutSink {
    handle: Stdout,
}

impl Default for StdOutSink {
    fn default() -> Self {
        Self {
            handle: io::stdout(),
        }
    }
}

impl EventSink for StdOutSink {
    fn handle(&mut self, event: &Event) -> IoResult<()> {
        writeln!(self.handle, "{event}")?;
        self.handle.flush()
    }
}

/// In-memory sink for tests and snapshots.
#[derive(Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<Event>>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything captured so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Event> {
        self.entries.lock().expect("sink poisoned").clone()
    }

    pub fn clear(&self) {
        self.entries.lock().expect("sink poisoned").clear();
    }
}

impl EventSink for MemorySink {
    fn handle(&mut self, event: &Event) -> IoResult<()> {
        self.entries.lock().expect("sink poisoned").push(event.clone());
        Ok(())
    }
}

/// Receives events and broadcasts each to every registered sink.
pub struct EventBus {
    sinks: Arc<Mutex<Vec<Box<dyn EventSink>>>>,
    channel: (flume::Sender<Event>, flume::Receiver<Event>),
    listener: Arc<Mutex<Option<ListenerState>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_sink(StdOutSink::default())
    }
}

impl EventBus {
    /// Create a bus with a single sink.
    pub fn with_sink<T>(sink: T) -> Self
    where
        T: EventSink + 'static,
    {
        Self::with_sinks(vec![Box::new(sink)])
    }

    /// Create a bus with multiple sinks.
    #[must_use]
    pub fn with_sinks(sinks: Vec<Box<dyn EventSink>>) -> Self {
        Self {
            sinks: Arc::new(Mutex::new(sinks)),
            channel: flume::unbounded(),
            listener: Arc::new(Mutex::new(None)),
        }
    }

    /// Register another sink (e.g. a per-view subscriber).
    pub fn add_sink<T: EventSink + 'static>(&self, sink: T) {
        self.sinks.lock().expect("sinks poisoned").push(Box::new(sink));
    }

    /// A cloneable sender for producers.
    #[must_use]
    pub fn sender(&self) -> flume::Sender<Event> {
        self.channel.0.clone()
    }

    /// Spawn the background task that drains the channel into the sinks.
    /// Idempotent.
    pub fn listen(&self) {
        let mut guard = self.listener.lock().expect("listener poisoned");
        if guard.is_some() {
            return;
        }

        let receiver = self.channel.1.clone();
        let sinks = self.sinks.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = task::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    received = receiver.recv_async() => match received {
                        Err(_) => break,
                        Ok(event) => {
                            let mut sinks = sinks.lock().expect("sinks poisoned");
                            for sink in sinks.iter_mut() {
                                if let Err(error) = sink.handle(&event) {
                                    tracing::warn!(%error, "event sink failed");
                                }
                            }
                        }
                    }
                }
            }
        });

        *guard = Some(ListenerState {
            shutdown_tx,
            handle,
        });
    }

    /// Stop the background listener and wait for it to drain.
    pub async fn shutdown(&self) {
        let state = {
            let mut guard = self.listener.lock().expect("listener poisoned");
            guard.take()
        };
        if let Some(state) = state {
            let _ = state.shutdown_tx.send(());
            let _ = state.handle.await;
        }
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.listener.lock()
            && let Some(state) = guard.take()
        {
            let _ = state.shutdown_tx.send(());
            state.handle.abort();
        }
    }
}

struct ListenerState {
    shutdown_tx: oneshot::Sender<()>,
    handle: task::JoinHandle<()>,
}
