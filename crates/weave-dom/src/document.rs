#![forbid(unsafe_code)]

//! Headless, arena-backed document.
//!
//! [`Document`] is the in-memory stand-in for the browser DOM. It exposes the
//! small set of primitives the binding runtime consumes: tree insertion and
//! removal, class and attribute access, subtree queries by class, and a
//! mutation log that plays the role of a `MutationObserver`.
//!
//! The log is off until [`Document::observe`] is called and is dropped by
//! [`Document::disconnect`], so a document nobody watches keeps no history.
//!
//! # Design
//!
//! Nodes are stored in a `Vec` and addressed by [`NodeId`]. Ids are never
//! reused: a removed node is merely detached and can be re-inserted later,
//! which is exactly what node sequences rely on.
//!
//! # Invariants
//!
//! 1. Sibling links are consistent: `next(a) == b` iff `prev(b) == a`.
//! 2. A parent's `first_child`/`last_child` are the ends of its sibling chain.
//! 3. Markers are never linked into the tree; they borrow the position of
//!    their anchor node.
//! 4. Only effective changes produce [`MutationRecord`]s (adding a present
//!    class, or removing an absent one, records nothing).
//! 5. Records accumulate only while observing.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | Unknown id | [`DomError::UnknownNode`] |
//! | `insert_before` on a detached reference | [`DomError::NoParent`] |
//! | Class op on a text node | [`DomError::NotAnElement`] |
//! | Inserting an ancestor into its descendant | [`DomError::HierarchyRequest`] |

use core::fmt;

use crate::error::DomError;

/// Tag of the element that marks a text-interpolation template.
pub const MARKER_TAG: &str = "weave-marker";

/// Class carried by every element that is an instruction target.
pub const TARGET_CLASS: &str = "weave";

/// Text of the comment produced by [`Document::convert_to_render_location`].
pub const RENDER_LOCATION_TEXT: &str = "weave-loc";

/// Handle to a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Element payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementData {
    /// Lower-case tag name.
    pub tag: String,
    /// Class list in insertion order, without duplicates.
    pub classes: Vec<String>,
    /// Attributes other than `class`, in insertion order.
    pub attributes: Vec<(String, String)>,
    /// Template content fragment (only for `<template>` elements).
    pub content: Option<NodeId>,
}

/// What a node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element(ElementData),
    Text(String),
    Comment(String),
    Fragment,
    /// Zero-width binding target standing immediately before `anchor`.
    Marker { anchor: NodeId },
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
    interpolation_target: bool,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            interpolation_target: false,
        }
    }
}

/// One effective change to the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    /// Children were inserted into or removed from `target`.
    ChildList {
        target: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    /// `name` was added to the class list of `target`.
    ClassAdded { target: NodeId, name: String },
    /// `name` was removed from the class list of `target`.
    ClassRemoved { target: NodeId, name: String },
    /// Attribute `name` of `target` changed; `old_value` is `None` if it was absent.
    Attribute {
        target: NodeId,
        name: String,
        old_value: Option<String>,
    },
}

impl MutationRecord {
    /// Node the record is about.
    #[must_use]
    pub fn target(&self) -> NodeId {
        match self {
            Self::ChildList { target, .. }
            | Self::ClassAdded { target, .. }
            | Self::ClassRemoved { target, .. }
            | Self::Attribute { target, .. } => *target,
        }
    }
}

/// In-memory document tree.
#[derive(Debug, Default)]
pub struct Document {
    nodes: Vec<NodeData>,
    records: Vec<MutationRecord>,
    observing: bool,
}

impl Document {
    /// Create an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes ever allocated.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // -- allocation -------------------------------------------------------

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(NodeData::new(kind));
        id
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeKind::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            ..ElementData::default()
        }))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Text(text.into()))
    }

    /// Create a detached comment node.
    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Comment(text.into()))
    }

    /// Create an empty document fragment.
    pub fn create_fragment(&mut self) -> NodeId {
        self.alloc(NodeKind::Fragment)
    }

    /// Create a `<template>` element with an empty content fragment.
    pub fn create_template(&mut self) -> NodeId {
        let content = self.create_fragment();
        self.alloc(NodeKind::Element(ElementData {
            tag: "template".to_owned(),
            content: Some(content),
            ..ElementData::default()
        }))
    }

    /// Create a marker standing in front of `anchor`.
    pub fn create_marker(&mut self, anchor: NodeId) -> Result<NodeId, DomError> {
        self.data(anchor)?;
        Ok(self.alloc(NodeKind::Marker { anchor }))
    }

    // -- inspection -------------------------------------------------------

    fn data(&self, id: NodeId) -> Result<&NodeData, DomError> {
        self.nodes.get(id.index()).ok_or(DomError::UnknownNode(id))
    }

    fn data_mut(&mut self, id: NodeId) -> Result<&mut NodeData, DomError> {
        self.nodes.get_mut(id.index()).ok_or(DomError::UnknownNode(id))
    }

    fn element(&self, id: NodeId) -> Result<&ElementData, DomError> {
        match &self.data(id)?.kind {
            NodeKind::Element(el) => Ok(el),
            _ => Err(DomError::NotAnElement(id)),
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData, DomError> {
        match &mut self.data_mut(id)?.kind {
            NodeKind::Element(el) => Ok(el),
            _ => Err(DomError::NotAnElement(id)),
        }
    }

    /// Kind of `id`, or `None` for an unknown id.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.index()).map(|n| &n.kind)
    }

    /// Parent node. Markers report the parent of their anchor.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        let node = self.nodes.get(id.index())?;
        match node.kind {
            NodeKind::Marker { anchor } => self.parent(anchor),
            _ => node.parent,
        }
    }

    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.index()).and_then(|n| n.first_child)
    }

    #[must_use]
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.index()).and_then(|n| n.last_child)
    }

    /// Next sibling. A marker's next sibling is its anchor.
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let node = self.nodes.get(id.index())?;
        match node.kind {
            NodeKind::Marker { anchor } => Some(anchor),
            _ => node.next_sibling,
        }
    }

    #[must_use]
    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.index()).and_then(|n| n.prev_sibling)
    }

    /// Children of `id` in order.
    #[must_use]
    pub fn child_nodes(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = self.first_child(id);
        while let Some(child) = cursor {
            out.push(child);
            cursor = self.next_sibling(child);
        }
        out
    }

    /// Content fragment of a `<template>` element.
    #[must_use]
    pub fn template_content(&self, id: NodeId) -> Option<NodeId> {
        match self.kind(id)? {
            NodeKind::Element(el) => el.content,
            _ => None,
        }
    }

    /// DOM-style node name (`"div"`, `"#text"`, `"#comment"`, ...).
    #[must_use]
    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        Some(match self.kind(id)? {
            NodeKind::Element(el) => el.tag.as_str(),
            NodeKind::Text(_) => "#text",
            NodeKind::Comment(_) => "#comment",
            NodeKind::Fragment => "#document-fragment",
            NodeKind::Marker { .. } => MARKER_TAG,
        })
    }

    #[must_use]
    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.kind(id), Some(NodeKind::Element(_)))
    }

    #[must_use]
    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.kind(id), Some(NodeKind::Text(_)))
    }

    /// Concatenated text of `id` and its descendants.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            Some(NodeKind::Text(text) | NodeKind::Comment(text)) => out.push_str(text),
            Some(NodeKind::Element(_) | NodeKind::Fragment) => {
                for child in self.child_nodes(id) {
                    if !matches!(self.kind(child), Some(NodeKind::Comment(_))) {
                        self.collect_text(child, out);
                    }
                }
            }
            Some(NodeKind::Marker { .. }) | None => {}
        }
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    #[must_use]
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    // -- tree mutation ----------------------------------------------------

    fn check_insertable(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        match self.data(parent)?.kind {
            NodeKind::Element(_) | NodeKind::Fragment => {}
            _ => return Err(DomError::HierarchyRequest("parent cannot have children")),
        }
        if matches!(self.data(child)?.kind, NodeKind::Marker { .. }) {
            return Err(DomError::HierarchyRequest("markers cannot be inserted"));
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest("node is an ancestor of the parent"));
        }
        Ok(())
    }

    /// Detach `id` from its parent without recording anything.
    fn unlink(&mut self, id: NodeId) -> Option<NodeId> {
        let (parent, prev, next) = {
            let node = &self.nodes[id.index()];
            (node.parent?, node.prev_sibling, node.next_sibling)
        };
        match prev {
            Some(p) => self.nodes[p.index()].next_sibling = next,
            None => self.nodes[parent.index()].first_child = next,
        }
        match next {
            Some(n) => self.nodes[n.index()].prev_sibling = prev,
            None => self.nodes[parent.index()].last_child = prev,
        }
        let node = &mut self.nodes[id.index()];
        node.parent = None;
        node.prev_sibling = None;
        node.next_sibling = None;
        Some(parent)
    }

    /// Link a detached `id` under `parent`, before `before` (or at the end).
    fn link(&mut self, parent: NodeId, id: NodeId, before: Option<NodeId>) {
        let prev = match before {
            Some(b) => self.nodes[b.index()].prev_sibling,
            None => self.nodes[parent.index()].last_child,
        };
        {
            let node = &mut self.nodes[id.index()];
            node.parent = Some(parent);
            node.prev_sibling = prev;
            node.next_sibling = before;
        }
        match prev {
            Some(p) => self.nodes[p.index()].next_sibling = Some(id),
            None => self.nodes[parent.index()].first_child = Some(id),
        }
        match before {
            Some(b) => self.nodes[b.index()].prev_sibling = Some(id),
            None => self.nodes[parent.index()].last_child = Some(id),
        }
    }

    /// Move `nodes` (already validated) under `parent` before `before`.
    fn move_nodes(&mut self, parent: NodeId, nodes: &[NodeId], before: Option<NodeId>) {
        for &node in nodes {
            if let Some(old_parent) = self.unlink(node) {
                self.record(MutationRecord::ChildList {
                    target: old_parent,
                    added: Vec::new(),
                    removed: vec![node],
                });
            }
            self.link(parent, node, before);
        }
        if !nodes.is_empty() {
            self.record(MutationRecord::ChildList {
                target: parent,
                added: nodes.to_vec(),
                removed: Vec::new(),
            });
        }
    }

    /// Nodes that an insertion of `node` actually moves: the children of a
    /// fragment, or the node itself.
    fn insertion_set(&self, node: NodeId) -> Result<Vec<NodeId>, DomError> {
        Ok(match self.data(node)?.kind {
            NodeKind::Fragment => self.child_nodes(node),
            _ => vec![node],
        })
    }

    /// Append `child` to `parent`. A fragment moves all of its children.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.check_insertable(parent, child)?;
        let nodes = self.insertion_set(child)?;
        self.move_nodes(parent, &nodes, None);
        Ok(())
    }

    /// Insert `node` as a sibling before `reference`.
    ///
    /// A marker reference inserts before the marker's anchor.
    pub fn insert_before(&mut self, node: NodeId, reference: NodeId) -> Result<(), DomError> {
        let reference = match self.data(reference)?.kind {
            NodeKind::Marker { anchor } => anchor,
            _ => reference,
        };
        let parent = self.parent(reference).ok_or(DomError::NoParent(reference))?;
        if node == reference {
            return Ok(());
        }
        self.check_insertable(parent, node)?;
        let nodes = self.insertion_set(node)?;
        self.move_nodes(parent, &nodes, Some(reference));
        Ok(())
    }

    /// Detach `node` from its parent. Detached nodes are left alone.
    pub fn remove(&mut self, node: NodeId) -> Result<(), DomError> {
        if matches!(self.data(node)?.kind, NodeKind::Marker { .. }) {
            return Ok(());
        }
        if let Some(parent) = self.unlink(node) {
            self.record(MutationRecord::ChildList {
                target: parent,
                added: Vec::new(),
                removed: vec![node],
            });
        }
        Ok(())
    }

    /// Remove `child` from `parent`, failing if it is not a child of it.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.data(parent)?;
        if self.data(child)?.parent != Some(parent) {
            return Err(DomError::NotAChild { parent, child });
        }
        self.remove(child)
    }

    /// Put `new_child` where `old_child` is. No-op when `old_child` is detached.
    pub fn replace_node(&mut self, new_child: NodeId, old_child: NodeId) -> Result<(), DomError> {
        if self.parent(old_child).is_none() {
            self.data(new_child)?;
            return Ok(());
        }
        self.insert_before(new_child, old_child)?;
        self.remove(old_child)
    }

    /// Move every child of `current_parent` to the end of `new_parent`.
    pub fn migrate_child_nodes(
        &mut self,
        current_parent: NodeId,
        new_parent: NodeId,
    ) -> Result<(), DomError> {
        while let Some(child) = self.first_child(current_parent) {
            self.append_child(new_parent, child)?;
        }
        Ok(())
    }

    /// Copy `node` (and its subtree when `deep`) into a new detached node.
    pub fn clone_node(&mut self, node: NodeId, deep: bool) -> Result<NodeId, DomError> {
        let mut kind = self.data(node)?.kind.clone();
        if let NodeKind::Element(el) = &mut kind
            && let Some(content) = el.content
        {
            el.content = Some(if deep {
                self.clone_node(content, true)?
            } else {
                self.create_fragment()
            });
        }
        let interpolation_target = self.data(node)?.interpolation_target;
        let copy = self.alloc(kind);
        self.nodes[copy.index()].interpolation_target = interpolation_target;
        if deep {
            for child in self.child_nodes(node) {
                let child_copy = self.clone_node(child, true)?;
                self.link(copy, child_copy, None);
            }
        }
        Ok(copy)
    }

    // -- attributes and classes -------------------------------------------

    /// Attribute value. `class` is served from the class list.
    pub fn get_attribute(&self, node: NodeId, name: &str) -> Result<Option<String>, DomError> {
        let el = self.element(node)?;
        if name == "class" {
            return Ok((!el.classes.is_empty()).then(|| el.classes.join(" ")));
        }
        Ok(el
            .attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone()))
    }

    /// Set an attribute. Setting `class` replaces the whole class list.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let old_value = self.get_attribute(node, name)?;
        let el = self.element_mut(node)?;
        if name == "class" {
            el.classes.clear();
            for class in value.split_whitespace() {
                if !el.classes.iter().any(|c| c == class) {
                    el.classes.push(class.to_owned());
                }
            }
        } else if let Some(slot) = el.attributes.iter_mut().find(|(k, _)| k == name) {
            slot.1 = value.to_owned();
        } else {
            el.attributes.push((name.to_owned(), value.to_owned()));
        }
        self.record(MutationRecord::Attribute {
            target: node,
            name: name.to_owned(),
            old_value,
        });
        Ok(())
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), DomError> {
        let old_value = self.get_attribute(node, name)?;
        if old_value.is_none() {
            return Ok(());
        }
        let el = self.element_mut(node)?;
        if name == "class" {
            el.classes.clear();
        } else {
            el.attributes.retain(|(k, _)| k != name);
        }
        self.record(MutationRecord::Attribute {
            target: node,
            name: name.to_owned(),
            old_value,
        });
        Ok(())
    }

    pub fn has_class(&self, node: NodeId, name: &str) -> Result<bool, DomError> {
        Ok(self.element(node)?.classes.iter().any(|c| c == name))
    }

    /// Class list of `node` in application order.
    pub fn classes(&self, node: NodeId) -> Result<&[String], DomError> {
        Ok(&self.element(node)?.classes)
    }

    /// Add `name` to the class list. Adding a present class is a no-op.
    pub fn add_class(&mut self, node: NodeId, name: &str) -> Result<(), DomError> {
        let el = self.element_mut(node)?;
        if el.classes.iter().any(|c| c == name) {
            return Ok(());
        }
        el.classes.push(name.to_owned());
        self.record(MutationRecord::ClassAdded {
            target: node,
            name: name.to_owned(),
        });
        Ok(())
    }

    /// Remove `name` from the class list. Removing an absent class is a no-op.
    pub fn remove_class(&mut self, node: NodeId, name: &str) -> Result<(), DomError> {
        let el = self.element_mut(node)?;
        let Some(pos) = el.classes.iter().position(|c| c == name) else {
            return Ok(());
        };
        el.classes.remove(pos);
        self.record(MutationRecord::ClassRemoved {
            target: node,
            name: name.to_owned(),
        });
        Ok(())
    }

    /// Descendants of `root` (excluding `root`) carrying `class`, in document order.
    #[must_use]
    pub fn query_by_class(&self, root: NodeId, class: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.child_nodes(root).into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            if let Some(NodeKind::Element(el)) = self.kind(node)
                && el.classes.iter().any(|c| c == class)
            {
                out.push(node);
            }
            stack.extend(self.child_nodes(node).into_iter().rev());
        }
        out
    }

    // -- text helpers -------------------------------------------------------

    /// Whether the text of `node` consists only of characters `<= 0x20`.
    ///
    /// Nodes flagged via [`treat_as_non_whitespace`](Self::treat_as_non_whitespace)
    /// never count as whitespace.
    #[must_use]
    pub fn is_all_whitespace(&self, node: NodeId) -> bool {
        match self.nodes.get(node.index()) {
            Some(data) if data.interpolation_target => false,
            Some(_) => self.text_content(node).chars().all(|c| u32::from(c) <= 0x20),
            None => true,
        }
    }

    pub fn treat_as_non_whitespace(&mut self, node: NodeId) -> Result<(), DomError> {
        self.data_mut(node)?.interpolation_target = true;
        Ok(())
    }

    /// Replace `node` with a render-location comment and return the comment.
    pub fn convert_to_render_location(&mut self, node: NodeId) -> Result<NodeId, DomError> {
        let parent = self.parent(node).ok_or(DomError::NoParent(node))?;
        let location = self.create_comment(RENDER_LOCATION_TEXT);
        self.insert_before(location, node)?;
        self.remove_child(parent, node)?;
        Ok(location)
    }

    // -- observation ------------------------------------------------------

    fn record(&mut self, record: MutationRecord) {
        if self.observing {
            self.records.push(record);
        }
    }

    /// Start recording mutations. Calling it while observing is a no-op.
    pub fn observe(&mut self) {
        self.observing = true;
    }

    /// Stop recording and discard records nobody took.
    pub fn disconnect(&mut self) {
        self.observing = false;
        self.records = Vec::new();
    }

    #[must_use]
    pub fn is_observing(&self) -> bool {
        self.observing
    }

    /// Records accumulated since the last [`take_records`](Self::take_records).
    #[must_use]
    pub fn pending_records(&self) -> &[MutationRecord] {
        &self.records
    }

    /// Drain accumulated mutation records.
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }
}
