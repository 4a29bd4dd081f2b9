#![forbid(unsafe_code)]

//! Lifecycle flags and observer configuration.
//!
//! Binding lifecycle calls carry an opaque [`LifecycleFlags`] bitset. Only a
//! handful of bits matter to target observers:
//!
//! - [`FROM_BIND`](LifecycleFlags::FROM_BIND) is inspected per write and
//!   forces a synchronous flush.
//! - The three queue-policy bits are read once, at construction, and resolved
//!   into an [`ObserverConfig`]. At most one of them may be set; none means
//!   [`QueuePolicy::QueuedOnce`].

use bitflags::bitflags;

use crate::error::ConfigError;
use crate::flush_queue::Priority;

bitflags! {
    /// Flags passed through bind, unbind and write calls.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LifecycleFlags: u32 {
        /// No flags.
        const NONE = 0;
        /// The call originates from the binding's initial bind.
        const FROM_BIND = 1 << 0;
        /// The call originates from an unbind.
        const FROM_UNBIND = 1 << 1;
        /// The call originates from a flush-queue drain.
        const FROM_FLUSH = 1 << 2;
        /// Never queue: every write flushes synchronously.
        const NO_TARGET_OBSERVER_QUEUE = 1 << 8;
        /// Queue a one-shot flush per batch of writes (the default).
        const ONE_TIME_TARGET_OBSERVER_QUEUE = 1 << 9;
        /// Stay enrolled in the queue from bind to unbind.
        const PERSISTENT_TARGET_OBSERVER_QUEUE = 1 << 10;
        /// Mask of the three queue-policy bits.
        const TARGET_OBSERVER_FLAGS = Self::NO_TARGET_OBSERVER_QUEUE.bits()
            | Self::ONE_TIME_TARGET_OBSERVER_QUEUE.bits()
            | Self::PERSISTENT_TARGET_OBSERVER_QUEUE.bits();
    }
}

impl LifecycleFlags {
    /// Whether the write comes from the initial bind.
    #[inline]
    #[must_use]
    pub fn is_from_bind(self) -> bool {
        self.contains(Self::FROM_BIND)
    }
}

/// When a target observer applies its pending value.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueuePolicy {
    /// Flush synchronously inside `set_value`.
    Immediate,
    /// Enqueue a one-shot flush; writes before the next tick coalesce.
    #[default]
    QueuedOnce,
    /// Enrolled every tick between bind and unbind; flushes only when dirty.
    Persistent,
}

impl QueuePolicy {
    /// Resolve the policy bits of `flags`.
    pub fn from_flags(flags: LifecycleFlags) -> Result<Self, ConfigError> {
        let policy = flags & LifecycleFlags::TARGET_OBSERVER_FLAGS;
        if policy.bits().count_ones() > 1 {
            return Err(ConfigError::ConflictingQueuePolicy(policy));
        }
        Ok(if policy.contains(LifecycleFlags::NO_TARGET_OBSERVER_QUEUE) {
            Self::Immediate
        } else if policy.contains(LifecycleFlags::PERSISTENT_TARGET_OBSERVER_QUEUE) {
            Self::Persistent
        } else {
            Self::QueuedOnce
        })
    }
}

/// Construction-time configuration of a target observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverConfig {
    /// Flush timing.
    pub queue_policy: QueuePolicy,
    /// Queue priority of the observer's flush. Default: [`Priority::PROPAGATE`].
    pub priority: Priority,
    /// Drop index entries for names once they are removed from the DOM.
    /// Default: false (the index keeps every name it has ever applied).
    pub prune_stale_names: bool,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            queue_policy: QueuePolicy::default(),
            priority: Priority::PROPAGATE,
            prune_stale_names: false,
        }
    }
}

impl ObserverConfig {
    /// Resolve a configuration from construction flags.
    pub fn from_flags(flags: LifecycleFlags) -> Result<Self, ConfigError> {
        Ok(Self {
            queue_policy: QueuePolicy::from_flags(flags)?,
            ..Self::default()
        })
    }

    /// Set the queue policy (builder pattern).
    #[must_use]
    pub fn with_queue_policy(mut self, policy: QueuePolicy) -> Self {
        self.queue_policy = policy;
        self
    }

    /// Set the flush priority (builder pattern).
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Enable or disable index pruning (builder pattern).
    #[must_use]
    pub fn with_prune_stale_names(mut self, prune: bool) -> Self {
        self.prune_stale_names = prune;
        self
    }
}
