//! Core identifier and value types for the jagtree authoring core.
//!
//! This module defines the fundamental types used throughout the system
//! for naming Activities and LiveNodes. These are the core domain concepts
//! the rest of the crate is built on.
//!
//! # Key Types
//!
//! - [`Urn`]: validated string identifier naming an Activity
//! - [`NodeId`]: unique identifier of one LiveNode instantiation
//! - [`SlotId`]: identifies a child-slot within an Activity
//! - [`ExecutionMode`]: how an Activity's children execute
//! - [`Extent`]: an abstract box size supplied by the renderer
//!
//! # Examples
//!
//! ```rust
//! use jagtree::types::{Urn, ExecutionMode};
//!
//! let urn = Urn::parse("urn:jag:mission:survey-area").unwrap();
//! assert_eq!(urn.namespace(), "jag");
//!
//! // Invalid grammar is rejected before it can reach any tree.
//! assert!(Urn::parse("not-a-urn").is_err());
//!
//! let mode = ExecutionMode::Sequential;
//! assert_eq!(mode.to_string(), "sequential");
//! ```

use std::fmt;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Validated URN naming an Activity, unique within the Activity namespace.
///
/// The accepted grammar is a practical subset of RFC 2141:
///
/// ```text
/// urn := "urn" ":" namespace (":" segment)+
/// namespace := [a-z0-9][a-z0-9-]{0,31}
/// segment   := [a-z0-9][a-z0-9_.-]*
/// ```
///
/// Construction only succeeds through [`Urn::parse`] (or serde
/// deserialization, which routes through it), so every `Urn` held anywhere
/// in the system is known to be well-formed.
///
/// # Examples
///
/// ```rust
/// use jagtree::types::Urn;
///
/// let urn = Urn::parse("urn:jag:task:analyze").unwrap();
/// assert_eq!(urn.as_str(), "urn:jag:task:analyze");
/// assert_eq!(urn.namespace(), "jag");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Urn(String);

impl Urn {
    /// Parse and validate a URN string.
    ///
    /// # Errors
    ///
    /// Returns [`UrnError`] describing the first grammar violation found.
    pub fn parse(input: &str) -> Result<Self, UrnError> {
        let mut parts = input.split(':');

        match parts.next() {
            Some("urn") => {}
            _ => {
                return Err(UrnError::MissingScheme {
                    input: input.to_string(),
                });
            }
        }

        let namespace = parts.next().unwrap_or_default();
        if namespace.is_empty()
            || namespace.len() > 32
            || !namespace
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            || !namespace
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(UrnError::BadNamespace {
                input: input.to_string(),
            });
        }

        let mut seen_segment = false;
        for segment in parts {
            seen_segment = true;
            let head_ok = segment
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
            let tail_ok = segment.chars().all(|c| {
                c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.' || c == '-'
            });
            if !head_ok || !tail_ok {
                return Err(UrnError::BadSegment {
                    input: input.to_string(),
                    segment: segment.to_string(),
                });
            }
        }
        if !seen_segment {
            return Err(UrnError::MissingName {
                input: input.to_string(),
            });
        }

        Ok(Urn(input.to_string()))
    }

    /// The full URN string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The namespace identifier (the part between `urn:` and the name).
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.0.split(':').nth(1).unwrap_or_default()
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Urn({})", self.0)
    }
}

impl AsRef<str> for Urn {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Urn {
    type Error = UrnError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Urn::parse(&value)
    }
}

impl From<Urn> for String {
    fn from(value: Urn) -> Self {
        value.0
    }
}

/// Errors produced by [`Urn::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum UrnError {
    /// The string does not start with the literal `urn:` scheme.
    #[error("not a URN (missing `urn:` scheme): {input}")]
    #[diagnostic(
        code(jagtree::urn::missing_scheme),
        help("Activity identifiers look like `urn:<namespace>:<name>`.")
    )]
    MissingScheme { input: String },

    /// The namespace identifier is empty, too long, or contains
    /// disallowed characters.
    #[error("invalid URN namespace in: {input}")]
    #[diagnostic(code(jagtree::urn::bad_namespace))]
    BadNamespace { input: String },

    /// No name segments follow the namespace.
    #[error("URN has no name segments: {input}")]
    #[diagnostic(code(jagtree::urn::missing_name))]
    MissingName { input: String },

    /// A name segment is empty or contains disallowed characters.
    #[error("invalid URN segment `{segment}` in: {input}")]
    #[diagnostic(code(jagtree::urn::bad_segment))]
    BadSegment { input: String, segment: String },
}

/// Unique identifier of a single LiveNode instantiation.
///
/// Distinct from the Activity [`Urn`]: many LiveNodes may instantiate the
/// same Activity, each with its own `NodeId`. The project id of a tree is
/// the `NodeId` of its root.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Mint a fresh, globally unique id.
    #[must_use]
    pub fn fresh() -> Self {
        NodeId(Uuid::new_v4())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps traversal logs readable.
        let s = self.0.simple().to_string();
        write!(f, "NodeId({})", &s[..8])
    }
}

/// Identifies one child-slot within an Activity.
///
/// Slot ids distinguish multiple instantiations of the same child URN under
/// one parent, and are unique within a single Activity's `children` list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(pub u64);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How an Activity's children execute, which decides the layout strategy
/// applied to them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// No prescribed order; children may have data dependencies expressed
    /// as bindings, and layout is dependency-routed.
    #[default]
    None,
    /// Children execute left-to-right; layout is a simple row.
    Sequential,
    /// Children execute together; layout is a simple column.
    Parallel,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Sequential => write!(f, "sequential"),
            Self::Parallel => write!(f, "parallel"),
        }
    }
}

/// Logical operator a connector applies to its children's outcomes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    #[default]
    None,
    And,
    Or,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::And => write!(f, "and"),
            Self::Or => write!(f, "or"),
        }
    }
}

/// An abstract box size, as reported by the renderer's size oracle.
///
/// The layout engine only ever adds and compares these; it performs no
/// pixel rounding of its own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub width: f64,
    pub height: f64,
}

impl Extent {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urn_accepts_namespaced_names() {
        for ok in [
            "urn:jag:analyze",
            "urn:jag:mission:survey-area",
            "urn:x:a.b.c",
            "urn:team-7:step_1",
        ] {
            assert!(Urn::parse(ok).is_ok(), "{ok} should parse");
        }
    }

    #[test]
    fn urn_rejects_bad_grammar() {
        assert!(matches!(
            Urn::parse("jag:analyze"),
            Err(UrnError::MissingScheme { .. })
        ));
        assert!(matches!(
            Urn::parse("urn::analyze"),
            Err(UrnError::BadNamespace { .. })
        ));
        assert!(matches!(
            Urn::parse("urn:jag"),
            Err(UrnError::MissingName { .. })
        ));
        assert!(matches!(
            Urn::parse("urn:jag:Bad Segment"),
            Err(UrnError::BadSegment { .. })
        ));
        assert!(matches!(
            Urn::parse("urn:jag:"),
            Err(UrnError::BadSegment { .. })
        ));
    }

    #[test]
    fn urn_serde_round_trip_validates() {
        let urn = Urn::parse("urn:jag:task:analyze").unwrap();
        let json = serde_json::to_string(&urn).unwrap();
        assert_eq!(json, "\"urn:jag:task:analyze\"");
        let back: Urn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, urn);

        let bad: Result<Urn, _> = serde_json::from_str("\"nope\"");
        assert!(bad.is_err());
    }

    #[test]
    fn node_ids_are_unique() {
        assert_ne!(NodeId::fresh(), NodeId::fresh());
    }
}
