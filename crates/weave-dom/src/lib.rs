#![forbid(unsafe_code)]

//! DOM boundary for Weave.
//!
//! # Role in Weave
//! `weave-dom` is the output layer. It owns a headless [`Document`] that
//! stands in for the browser DOM, the [`ClassList`] seam that observers
//! flush into, and the [`NodeSequence`] abstraction that moves rendered
//! views in and out of the tree as a unit.
//!
//! # Primary responsibilities
//! - **Document**: arena-backed tree with insertion, removal, class and
//!   attribute primitives, subtree queries, and a mutation log.
//! - **Shared handles**: [`SharedDocument`] and [`ElementRef`] for
//!   observers that flush after their creator has returned.
//! - **Node sequences**: empty, single-text and fragment-backed sequences
//!   plus the [`NodeSequenceFactory`] that stamps them from templates.
//!
//! # How it fits in the system
//! The runtime (`weave-runtime`) decides *when* DOM state changes; this
//! crate is the only place that changes it.

pub mod class_list;
pub mod document;
pub mod error;
pub mod node_sequence;

pub use class_list::{ClassList, ElementRef, SharedDocument};
pub use document::{
    Document, ElementData, MARKER_TAG, MutationRecord, NodeId, NodeKind, RENDER_LOCATION_TEXT,
    TARGET_CLASS,
};
pub use error::DomError;
pub use node_sequence::{
    EMPTY_SEQUENCE, EmptySequence, FragmentNodeSequence, NodeSequence, NodeSequenceFactory,
    TextNodeSequence,
};
