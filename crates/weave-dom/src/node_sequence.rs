#![forbid(unsafe_code)]

//! Node sequences: a run of sibling nodes moved as one unit.
//!
//! A rendered view owns one [`NodeSequence`]. The sequence remembers its
//! first and last node and the nodes it started with, and can move that
//! whole range in front of a reference node, append it to a parent, or pull
//! it back out of the live tree.
//!
//! Three implementations exist:
//!
//! - [`EmptySequence`]: "no view". Every operation is a no-op.
//! - [`TextNodeSequence`]: a single text node whose binding target is a
//!   zero-width marker in front of it.
//! - [`FragmentNodeSequence`]: the general case, backed by a private
//!   document fragment that holds the nodes whenever they are detached.
//!
//! [`NodeSequenceFactory`] analyzes a template once and stamps out fresh
//! sequences from it.
//!
//! # Invariants
//!
//! 1. Walking next-sibling pointers from `first_child` reaches `last_child`.
//!    Violating this is a structural bug and panics.
//! 2. After `remove()`, every node of a fragment sequence is a child of its
//!    private fragment again, in the original order.
//! 3. `find_targets()` is computed at most once per sequence.

use std::cell::OnceCell;
use std::fmt;

use crate::document::{Document, MARKER_TAG, NodeId, NodeKind, TARGET_CLASS};
use crate::error::DomError;

/// A contiguous run of sibling nodes handled as one logical unit.
pub trait NodeSequence: fmt::Debug {
    fn first_child(&self) -> Option<NodeId>;

    fn last_child(&self) -> Option<NodeId>;

    /// Nodes owned by the sequence, in order, as captured at creation.
    fn child_nodes(&self) -> &[NodeId];

    /// Nodes that binding instructions will target.
    fn find_targets(&self, doc: &Document) -> &[NodeId];

    /// Insert the whole range as siblings in front of `reference`.
    fn insert_before(&self, doc: &mut Document, reference: NodeId) -> Result<(), DomError>;

    /// Append the whole range to `parent`.
    fn append_to(&self, doc: &mut Document, parent: NodeId) -> Result<(), DomError>;

    /// Detach the range from wherever it currently lives.
    fn remove(&self, doc: &mut Document) -> Result<(), DomError>;
}

// ---------------------------------------------------------------------------
// EmptySequence
// ---------------------------------------------------------------------------

/// The sequence that renders nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmptySequence;

/// Shared empty sequence.
pub const EMPTY_SEQUENCE: EmptySequence = EmptySequence;

impl NodeSequence for EmptySequence {
    fn first_child(&self) -> Option<NodeId> {
        None
    }

    fn last_child(&self) -> Option<NodeId> {
        None
    }

    fn child_nodes(&self) -> &[NodeId] {
        &[]
    }

    fn find_targets(&self, _doc: &Document) -> &[NodeId] {
        &[]
    }

    fn insert_before(&self, _doc: &mut Document, _reference: NodeId) -> Result<(), DomError> {
        Ok(())
    }

    fn append_to(&self, _doc: &mut Document, _parent: NodeId) -> Result<(), DomError> {
        Ok(())
    }

    fn remove(&self, _doc: &mut Document) -> Result<(), DomError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TextNodeSequence
// ---------------------------------------------------------------------------

/// A single interpolated text node.
///
/// The binding target is a marker that logically precedes the text, so the
/// text node itself never has to be wrapped in an element.
#[derive(Debug, Clone)]
pub struct TextNodeSequence {
    nodes: [NodeId; 1],
    targets: [NodeId; 1],
}

impl TextNodeSequence {
    /// Wrap `text`, allocating its marker.
    pub fn new(doc: &mut Document, text: NodeId) -> Result<Self, DomError> {
        if !doc.is_text(text) {
            return Err(DomError::HierarchyRequest("text sequence requires a text node"));
        }
        let marker = doc.create_marker(text)?;
        Ok(Self {
            nodes: [text],
            targets: [marker],
        })
    }

    /// The wrapped text node.
    #[must_use]
    pub fn text(&self) -> NodeId {
        self.nodes[0]
    }
}

impl NodeSequence for TextNodeSequence {
    fn first_child(&self) -> Option<NodeId> {
        Some(self.nodes[0])
    }

    fn last_child(&self) -> Option<NodeId> {
        Some(self.nodes[0])
    }

    fn child_nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    fn find_targets(&self, _doc: &Document) -> &[NodeId] {
        &self.targets
    }

    fn insert_before(&self, doc: &mut Document, reference: NodeId) -> Result<(), DomError> {
        doc.insert_before(self.nodes[0], reference)
    }

    fn append_to(&self, doc: &mut Document, parent: NodeId) -> Result<(), DomError> {
        doc.append_child(parent, self.nodes[0])
    }

    fn remove(&self, doc: &mut Document) -> Result<(), DomError> {
        doc.remove(self.nodes[0])
    }
}

// ---------------------------------------------------------------------------
// FragmentNodeSequence
// ---------------------------------------------------------------------------

/// The general sequence, backed by a private fragment.
///
/// While detached, the nodes sit inside the fragment and move in a single
/// insertion. Once attached, the fragment is empty and the range is walked
/// node by node.
#[derive(Debug, Clone)]
pub struct FragmentNodeSequence {
    fragment: NodeId,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    child_nodes: Vec<NodeId>,
    targets: OnceCell<Vec<NodeId>>,
}

impl FragmentNodeSequence {
    /// Take ownership of the children of `fragment`.
    pub fn new(doc: &Document, fragment: NodeId) -> Result<Self, DomError> {
        match doc.kind(fragment) {
            Some(NodeKind::Fragment) => {}
            Some(_) => {
                return Err(DomError::HierarchyRequest(
                    "fragment sequence requires a fragment",
                ));
            }
            None => return Err(DomError::UnknownNode(fragment)),
        }
        Ok(Self {
            fragment,
            first_child: doc.first_child(fragment),
            last_child: doc.last_child(fragment),
            child_nodes: doc.child_nodes(fragment),
            targets: OnceCell::new(),
        })
    }

    /// The private fragment that holds the nodes while detached.
    #[must_use]
    pub fn fragment(&self) -> NodeId {
        self.fragment
    }

    /// Whether the nodes currently sit inside the private fragment.
    fn is_enclosed(&self, doc: &Document) -> bool {
        self.first_child
            .is_some_and(|first| doc.parent(first) == Some(self.fragment))
    }

    /// Collect `first_child..=last_child` by following next-sibling links.
    ///
    /// # Panics
    ///
    /// Panics if the chain ends before `last_child` is reached.
    fn range(&self, doc: &Document) -> Vec<NodeId> {
        let (Some(first), Some(last)) = (self.first_child, self.last_child) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(self.child_nodes.len());
        let mut current = Some(first);
        while let Some(node) = current {
            out.push(node);
            if node == last {
                return out;
            }
            current = doc.next_sibling(node);
        }
        panic!(
            "corrupted node sequence: {last} is not reachable from {first} ({} nodes walked)",
            out.len()
        );
    }

    fn move_range(
        &self,
        doc: &mut Document,
        mut place: impl FnMut(&mut Document, NodeId) -> Result<(), DomError>,
    ) -> Result<(), DomError> {
        for node in self.range(doc) {
            place(doc, node)?;
        }
        Ok(())
    }
}

impl NodeSequence for FragmentNodeSequence {
    fn first_child(&self) -> Option<NodeId> {
        self.first_child
    }

    fn last_child(&self) -> Option<NodeId> {
        self.last_child
    }

    fn child_nodes(&self) -> &[NodeId] {
        &self.child_nodes
    }

    fn find_targets(&self, doc: &Document) -> &[NodeId] {
        self.targets.get_or_init(|| {
            if self.is_enclosed(doc) {
                return doc.query_by_class(self.fragment, TARGET_CLASS);
            }
            let mut targets = Vec::new();
            for &node in &self.child_nodes {
                if doc.has_class(node, TARGET_CLASS).unwrap_or(false) {
                    targets.push(node);
                }
                targets.extend(doc.query_by_class(node, TARGET_CLASS));
            }
            targets
        })
    }

    fn insert_before(&self, doc: &mut Document, reference: NodeId) -> Result<(), DomError> {
        if self.first_child.is_none() {
            return Ok(());
        }
        if self.is_enclosed(doc) {
            return doc.insert_before(self.fragment, reference);
        }
        self.move_range(doc, |doc, node| doc.insert_before(node, reference))
    }

    fn append_to(&self, doc: &mut Document, parent: NodeId) -> Result<(), DomError> {
        if self.first_child.is_none() {
            return Ok(());
        }
        if self.is_enclosed(doc) {
            return doc.append_child(parent, self.fragment);
        }
        self.move_range(doc, |doc, node| doc.append_child(parent, node))
    }

    fn remove(&self, doc: &mut Document) -> Result<(), DomError> {
        if self.first_child.is_none() || self.is_enclosed(doc) {
            return Ok(());
        }
        let fragment = self.fragment;
        self.move_range(doc, |doc, node| doc.append_child(fragment, node))
    }
}

// ---------------------------------------------------------------------------
// NodeSequenceFactory
// ---------------------------------------------------------------------------

/// Stamps out node sequences from an analyzed template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeSequenceFactory {
    /// `[<weave-marker>, " "]`: each sequence is a shallow clone of the text.
    Text { template: NodeId },
    /// Anything else: each sequence is a deep clone of the fragment.
    Fragment { template: NodeId },
}

impl NodeSequenceFactory {
    /// Analyze `node`.
    ///
    /// A `<template>` contributes its content, a fragment is used as is, and
    /// any other node is first wrapped in a new fragment.
    pub fn from_node(doc: &mut Document, node: NodeId) -> Result<Self, DomError> {
        let fragment = match (doc.template_content(node), doc.kind(node)) {
            (Some(content), _) => content,
            (None, Some(NodeKind::Fragment)) => node,
            (None, Some(_)) => {
                let fragment = doc.create_fragment();
                doc.append_child(fragment, node)?;
                fragment
            }
            (None, None) => return Err(DomError::UnknownNode(node)),
        };

        let children = doc.child_nodes(fragment);
        if let &[marker, text] = children.as_slice()
            && doc.node_name(marker) == Some(MARKER_TAG)
            && matches!(doc.kind(text), Some(NodeKind::Text(t)) if t == " ")
        {
            tracing::trace!(template = %text, "text node sequence factory");
            return Ok(Self::Text { template: text });
        }
        tracing::trace!(
            template = %fragment,
            children = children.len(),
            "fragment node sequence factory"
        );
        Ok(Self::Fragment { template: fragment })
    }

    /// Create a fresh, detached sequence.
    pub fn create(&self, doc: &mut Document) -> Result<Box<dyn NodeSequence>, DomError> {
        match *self {
            Self::Text { template } => {
                let text = doc.clone_node(template, false)?;
                Ok(Box::new(TextNodeSequence::new(doc, text)?))
            }
            Self::Fragment { template } => {
                let fragment = doc.clone_node(template, true)?;
                Ok(Box::new(FragmentNodeSequence::new(doc, fragment)?))
            }
        }
    }
}
