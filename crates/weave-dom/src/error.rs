#![forbid(unsafe_code)]

//! Error type for DOM boundary operations.

use core::fmt;

use crate::document::NodeId;

/// Failure of a DOM primitive.
///
/// DOM operations are expected to be locally deterministic, so none of these
/// are retried by callers. They propagate to whoever issued the operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// The operation needs a parent but the node is detached.
    NoParent(NodeId),
    /// A class or attribute operation was issued against a non-element node.
    NotAnElement(NodeId),
    /// `remove_child` was called with a node that is not a child of `parent`.
    NotAChild {
        /// The presumed parent.
        parent: NodeId,
        /// The node that was expected to be its child.
        child: NodeId,
    },
    /// The id does not belong to this document.
    UnknownNode(NodeId),
    /// The insertion would produce an invalid tree (cycle, leaf parent, marker child).
    HierarchyRequest(&'static str),
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoParent(node) => write!(f, "node {node} has no parent"),
            Self::NotAnElement(node) => write!(f, "node {node} is not an element"),
            Self::NotAChild { parent, child } => {
                write!(f, "node {child} is not a child of node {parent}")
            }
            Self::UnknownNode(node) => write!(f, "unknown node {node}"),
            Self::HierarchyRequest(msg) => write!(f, "hierarchy request error: {msg}"),
        }
    }
}

impl std::error::Error for DomError {}
