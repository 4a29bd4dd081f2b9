#![forbid(unsafe_code)]

//! Runtime error types.

use core::fmt;

use weave_dom::DomError;

use crate::flags::LifecycleFlags;

/// Failure of a single flush callback.
///
/// The flush queue isolates these: one failing task never stops the rest of
/// a drain from running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushError {
    /// A DOM primitive failed while applying the flush.
    Dom(DomError),
    /// A task reported its own failure.
    Callback(String),
}

impl fmt::Display for FlushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dom(err) => write!(f, "dom operation failed: {err}"),
            Self::Callback(msg) => write!(f, "flush callback failed: {msg}"),
        }
    }
}

impl std::error::Error for FlushError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Dom(err) => Some(err),
            Self::Callback(_) => None,
        }
    }
}

impl From<DomError> for FlushError {
    fn from(err: DomError) -> Self {
        Self::Dom(err)
    }
}

/// Invalid observer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// More than one of the mutually exclusive queue-policy bits was set.
    ConflictingQueuePolicy(LifecycleFlags),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConflictingQueuePolicy(flags) => {
                write!(f, "conflicting target observer queue policies: {flags:?}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
