#![forbid(unsafe_code)]

//! Shared document handles and the class-list seam.
//!
//! Observers flush long after the code that created them has returned, so
//! they cannot hold `&mut Document`. [`SharedDocument`] is the
//! single-threaded shared handle, and [`ElementRef`] pins one element of it
//! behind the [`ClassList`] trait that observers are generic over.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use crate::document::{Document, NodeId};
use crate::error::DomError;

/// The class-list primitives a class observer needs.
///
/// Implementations must treat adding a present name and removing an absent
/// name as no-ops.
pub trait ClassList {
    fn add_class(&self, name: &str) -> Result<(), DomError>;
    fn remove_class(&self, name: &str) -> Result<(), DomError>;
    fn contains_class(&self, name: &str) -> bool;
}

impl<T: ClassList + ?Sized> ClassList for Rc<T> {
    fn add_class(&self, name: &str) -> Result<(), DomError> {
        (**self).add_class(name)
    }

    fn remove_class(&self, name: &str) -> Result<(), DomError> {
        (**self).remove_class(name)
    }

    fn contains_class(&self, name: &str) -> bool {
        (**self).contains_class(name)
    }
}

/// Reference-counted handle to a [`Document`].
///
/// Cloning shares the same document.
#[derive(Debug, Clone, Default)]
pub struct SharedDocument {
    inner: Rc<RefCell<Document>>,
}

impl SharedDocument {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing document.
    #[must_use]
    pub fn from_document(doc: Document) -> Self {
        Self {
            inner: Rc::new(RefCell::new(doc)),
        }
    }

    /// Borrow the document.
    ///
    /// # Panics
    ///
    /// Panics if the document is mutably borrowed.
    #[must_use]
    pub fn borrow(&self) -> Ref<'_, Document> {
        self.inner.borrow()
    }

    /// Mutably borrow the document.
    ///
    /// # Panics
    ///
    /// Panics if the document is already borrowed.
    #[must_use]
    pub fn borrow_mut(&self) -> RefMut<'_, Document> {
        self.inner.borrow_mut()
    }

    /// Handle to `node` inside this document.
    #[must_use]
    pub fn element(&self, node: NodeId) -> ElementRef {
        ElementRef {
            doc: self.clone(),
            node,
        }
    }
}

/// One element of a [`SharedDocument`].
#[derive(Debug, Clone)]
pub struct ElementRef {
    doc: SharedDocument,
    node: NodeId,
}

impl ElementRef {
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[must_use]
    pub fn document(&self) -> &SharedDocument {
        &self.doc
    }

    /// Snapshot of the element's classes; empty for non-elements.
    #[must_use]
    pub fn classes(&self) -> Vec<String> {
        self.doc
            .borrow()
            .classes(self.node)
            .map(<[String]>::to_vec)
            .unwrap_or_default()
    }
}

impl ClassList for ElementRef {
    fn add_class(&self, name: &str) -> Result<(), DomError> {
        self.doc.borrow_mut().add_class(self.node, name)
    }

    fn remove_class(&self, name: &str) -> Result<(), DomError> {
        self.doc.borrow_mut().remove_class(self.node, name)
    }

    fn contains_class(&self, name: &str) -> bool {
        self.doc
            .borrow()
            .has_class(self.node, name)
            .unwrap_or(false)
    }
}
