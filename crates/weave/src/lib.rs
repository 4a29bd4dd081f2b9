#![forbid(unsafe_code)]

//! Weave public facade crate.
//!
//! Re-exports the DOM boundary and the runtime under one name, with a
//! top-level [`Error`] and a prelude for day-to-day usage.

use std::fmt;

// --- DOM re-exports --------------------------------------------------------

pub use weave_dom::{
    ClassList, Document, DomError, EMPTY_SEQUENCE, ElementRef, EmptySequence,
    FragmentNodeSequence, MutationRecord, NodeId, NodeKind, NodeSequence, NodeSequenceFactory,
    SharedDocument, TextNodeSequence,
};

// --- Runtime re-exports ----------------------------------------------------

#[cfg(feature = "runtime")]
pub use weave_runtime::{
    ClassAttributeObserver, ClassBinding, ClassValue, ConfigError, DrainReport, Enrollment,
    FlushError, FlushFailure, FlushQueue, FlushQueueConfig, FlushTask, LifecycleFlags,
    Observable, ObserverConfig, Priority, QueuePolicy,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for Weave applications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A DOM primitive failed.
    Dom(DomError),
    /// A synchronous flush failed.
    #[cfg(feature = "runtime")]
    Flush(FlushError),
    /// Observer construction flags were invalid.
    #[cfg(feature = "runtime")]
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dom(err) => write!(f, "{err}"),
            #[cfg(feature = "runtime")]
            Self::Flush(err) => write!(f, "{err}"),
            #[cfg(feature = "runtime")]
            Self::Config(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Dom(err) => Some(err),
            #[cfg(feature = "runtime")]
            Self::Flush(err) => Some(err),
            #[cfg(feature = "runtime")]
            Self::Config(err) => Some(err),
        }
    }
}

impl From<DomError> for Error {
    fn from(err: DomError) -> Self {
        Self::Dom(err)
    }
}

#[cfg(feature = "runtime")]
impl From<FlushError> for Error {
    fn from(err: FlushError) -> Self {
        Self::Flush(err)
    }
}

#[cfg(feature = "runtime")]
impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

/// Standard result type for Weave APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        ClassList, Document, ElementRef, Error, NodeId, NodeSequence, Result, SharedDocument,
    };

    #[cfg(feature = "runtime")]
    pub use crate::{
        ClassAttributeObserver, ClassBinding, ClassValue, FlushQueue, LifecycleFlags, Observable,
        QueuePolicy,
    };

    pub use crate::dom;
    #[cfg(feature = "runtime")]
    pub use crate::runtime;
}

pub use weave_dom as dom;
#[cfg(feature = "runtime")]
pub use weave_runtime as runtime;
