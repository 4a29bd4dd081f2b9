#![forbid(unsafe_code)]

//! Class attribute observer.
//!
//! Binds a [`ClassValue`] to one element's class list. Writes are coalesced
//! through the [`FlushQueue`]; each flush adds the requested names and
//! removes names that the previous flush applied but this one did not.
//!
//! # State machine
//!
//! ```text
//!            set_value (changed)
//!   Clean ─────────────────────────▶ Dirty
//!     ▲                                │ tick / immediate
//!     │          flush done            ▼
//!     └─────────────────────────── Flushing
//! ```
//!
//! # Flush algorithm
//!
//! With `v` the version before the flush:
//!
//! 1. Normalize the current value into atomic names and clear the dirty flag.
//! 2. Stamp every non-empty name with `v` in the [`GenerationIndex`] and add
//!    it to the element.
//! 3. Once every add succeeded, record the value as flushed and advance the
//!    version to `v + 1`.
//! 4. If `v > 0`, remove every name still stamped `v - 1`: it was applied by
//!    the previous flush and not requested by this one.
//!
//! Names stamped with older versions are left alone, so removal lags the
//! index by exactly one generation.
//!
//! # Invariants
//!
//! 1. `version` increments exactly once per flush whose adds all succeeded.
//! 2. The first flush (version 0 to 1) never removes anything.
//! 3. Adding a name already present is a no-op on the element.
//! 4. Only the value current at flush time reaches the element.
//! 5. After `unbind`, no queued flush of this observer remains.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | Class write fails in an immediate flush | Returned from `set_value` |
//! | Class write fails in a queued flush | Reported through the queue's error channel |
//! | Add fails | Version unchanged and the observer stays dirty; the next flush retries |
//! | Remove fails | Unremoved names are restamped `v` and removed by the next flush |
//! | `ClassList` panics | Unwinds; the phase still returns to `Clean` or `Dirty` |

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use weave_dom::ClassList;

use crate::class_value::ClassValue;
use crate::error::{ConfigError, FlushError};
use crate::flags::{LifecycleFlags, ObserverConfig, QueuePolicy};
use crate::flush_queue::{Enrollment, FlushQueue, FlushTask};
use crate::generation_index::GenerationIndex;

/// Observer lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObserverPhase {
    /// Nothing pending.
    Clean,
    /// A changed value waits for a flush.
    Dirty,
    /// A flush is applying class changes.
    Flushing,
}

#[derive(Debug)]
struct ObserverState {
    current_value: ClassValue,
    old_value: ClassValue,
    has_changes: bool,
    version: u64,
    name_index: GenerationIndex,
    flushing: bool,
    bound: bool,
}

/// Names a flush is about to apply, stamped with `version`.
struct PendingFlush {
    version: u64,
    value: ClassValue,
    added: Vec<String>,
}

struct ObserverCore<T> {
    target: T,
    config: ObserverConfig,
    queue: FlushQueue,
    state: RefCell<ObserverState>,
}

/// Clears the flushing flag when a flush ends, even by unwinding.
struct FlushingGuard<'a>(&'a RefCell<ObserverState>);

impl Drop for FlushingGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.0.try_borrow_mut() {
            state.flushing = false;
        }
    }
}

impl<T: ClassList> ObserverCore<T> {
    /// Apply the pending value if there is one.
    fn flush_pending(&self) -> Result<(), FlushError> {
        let Some(pending) = self.begin_flush() else {
            return Ok(());
        };
        let _guard = FlushingGuard(&self.state);

        if let Err(err) = self.add_all(&pending.added) {
            // Version and flushed value stay put so the retry removes the
            // same stale generation.
            self.state.borrow_mut().has_changes = true;
            return Err(err);
        }

        let removed = self.commit(&pending);
        self.remove_stale(pending.version, &removed)?;
        tracing::trace!(
            version = pending.version + 1,
            added = ?pending.added,
            removed = ?removed,
            "class observer flushed"
        );
        Ok(())
    }

    /// Stamp the requested names with the current version.
    fn begin_flush(&self) -> Option<PendingFlush> {
        let mut state = self.state.borrow_mut();
        if !state.has_changes {
            return None;
        }
        state.has_changes = false;
        state.flushing = true;

        let version = state.version;
        let value = state.current_value.clone();
        let added: Vec<String> = value
            .normalize()
            .into_iter()
            .filter(|name| !name.is_empty())
            .collect();
        for name in &added {
            state.name_index.record(name, version);
        }
        Some(PendingFlush {
            version,
            value,
            added,
        })
    }

    fn add_all(&self, names: &[String]) -> Result<(), FlushError> {
        for name in names {
            self.target.add_class(name)?;
        }
        Ok(())
    }

    /// Advance the version after every add landed; returns the names one
    /// generation behind.
    fn commit(&self, pending: &PendingFlush) -> Vec<String> {
        let mut state = self.state.borrow_mut();
        state.version = pending.version + 1;
        state.old_value = pending.value.clone();
        match pending.version.checked_sub(1) {
            Some(previous) => state.name_index.names_at(previous),
            None => Vec::new(),
        }
    }

    fn remove_stale(&self, version: u64, names: &[String]) -> Result<(), FlushError> {
        for (done, name) in names.iter().enumerate() {
            if let Err(err) = self.target.remove_class(name) {
                // Leftovers move up one generation so the next flush retries them.
                let mut state = self.state.borrow_mut();
                for name in &names[done..] {
                    state.name_index.record(name, version);
                }
                if self.config.prune_stale_names {
                    for name in &names[..done] {
                        state.name_index.forget(name);
                    }
                }
                return Err(err.into());
            }
        }
        if self.config.prune_stale_names {
            let mut state = self.state.borrow_mut();
            for name in names {
                state.name_index.forget(name);
            }
        }
        Ok(())
    }
}

impl<T: ClassList> FlushTask for ObserverCore<T> {
    fn flush(&self, _flags: LifecycleFlags) -> Result<(), FlushError> {
        self.flush_pending()
    }

    fn label(&self) -> &'static str {
        "class-attribute-observer"
    }
}

/// Observer binding a [`ClassValue`] to an element's class list.
///
/// Cloning yields another handle to the same observer.
pub struct ClassAttributeObserver<T: ClassList + 'static> {
    core: Rc<ObserverCore<T>>,
}

impl<T: ClassList + 'static> Clone for ClassAttributeObserver<T> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

impl<T: ClassList + 'static> fmt::Debug for ClassAttributeObserver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.core.state.borrow();
        f.debug_struct("ClassAttributeObserver")
            .field("config", &self.core.config)
            .field("current_value", &state.current_value)
            .field("has_changes", &state.has_changes)
            .field("version", &state.version)
            .field("indexed_names", &state.name_index.len())
            .field("bound", &state.bound)
            .finish()
    }
}

impl<T: ClassList + 'static> ClassAttributeObserver<T> {
    /// Create an observer whose queue policy comes from `flags`.
    pub fn new(
        target: T,
        queue: &FlushQueue,
        flags: LifecycleFlags,
    ) -> Result<Self, ConfigError> {
        Ok(Self::with_config(
            target,
            queue,
            ObserverConfig::from_flags(flags)?,
        ))
    }

    /// Create an observer with an explicit configuration.
    #[must_use]
    pub fn with_config(target: T, queue: &FlushQueue, config: ObserverConfig) -> Self {
        Self {
            core: Rc::new(ObserverCore {
                target,
                config,
                queue: queue.clone(),
                state: RefCell::new(ObserverState {
                    current_value: ClassValue::default(),
                    old_value: ClassValue::default(),
                    has_changes: false,
                    version: 0,
                    name_index: GenerationIndex::new(),
                    flushing: false,
                    bound: false,
                }),
            }),
        }
    }

    /// Store `value` and route it according to the queue policy.
    ///
    /// A write carrying [`LifecycleFlags::FROM_BIND`] flushes synchronously
    /// whatever the policy.
    pub fn set_value(
        &self,
        value: impl Into<ClassValue>,
        flags: LifecycleFlags,
    ) -> Result<(), FlushError> {
        let value = value.into();
        {
            let mut state = self.core.state.borrow_mut();
            state.has_changes = !value.same_as(&state.old_value);
            state.current_value = value;
        }

        if flags.is_from_bind() {
            return self.core.flush_pending();
        }
        match self.core.config.queue_policy {
            QueuePolicy::Immediate => self.core.flush_pending(),
            QueuePolicy::QueuedOnce => {
                self.core
                    .queue
                    .enqueue(&self.core, self.core.config.priority, Enrollment::Once);
                Ok(())
            }
            QueuePolicy::Persistent => Ok(()),
        }
    }

    /// Flush now, outside the queue. No-op when clean.
    pub fn flush(&self) -> Result<(), FlushError> {
        self.core.flush_pending()
    }

    /// Attach the observer. Persistent observers enroll in the queue.
    pub fn bind(&self, flags: LifecycleFlags) {
        self.core.state.borrow_mut().bound = true;
        if self.core.config.queue_policy == QueuePolicy::Persistent {
            self.core
                .queue
                .enqueue(&self.core, self.core.config.priority, Enrollment::Persistent);
        }
        tracing::trace!(?flags, policy = ?self.core.config.queue_policy, "class observer bound");
    }

    /// Detach the observer and cancel any queued flush.
    pub fn unbind(&self, flags: LifecycleFlags) {
        self.core.state.borrow_mut().bound = false;
        let dequeued = self.core.queue.dequeue(&self.core);
        tracing::trace!(?flags, dequeued, "class observer unbound");
    }

    /// Last value passed to [`set_value`](Self::set_value).
    #[must_use]
    pub fn value(&self) -> ClassValue {
        self.core.state.borrow().current_value.clone()
    }

    /// Last value applied by a flush.
    #[must_use]
    pub fn flushed_value(&self) -> ClassValue {
        self.core.state.borrow().old_value.clone()
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.core.state.borrow().has_changes
    }

    /// Number of completed flushes.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.core.state.borrow().version
    }

    #[must_use]
    pub fn phase(&self) -> ObserverPhase {
        let state = self.core.state.borrow();
        if state.flushing {
            ObserverPhase::Flushing
        } else if state.has_changes {
            ObserverPhase::Dirty
        } else {
            ObserverPhase::Clean
        }
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.core.state.borrow().bound
    }

    /// Whether a flush of this observer is queued.
    #[must_use]
    pub fn is_queued(&self) -> bool {
        self.core.queue.contains(&self.core)
    }

    /// Version that last applied `name`, if any.
    #[must_use]
    pub fn generation_of(&self, name: &str) -> Option<u64> {
        self.core.state.borrow().name_index.generation(name)
    }

    /// Number of names in the generation index.
    #[must_use]
    pub fn indexed_names(&self) -> usize {
        self.core.state.borrow().name_index.len()
    }

    #[must_use]
    pub fn config(&self) -> &ObserverConfig {
        &self.core.config
    }

    #[must_use]
    pub fn target(&self) -> &T {
        &self.core.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::BTreeSet;
    use std::panic::{self, AssertUnwindSafe};

    use weave_dom::DomError;

    /// In-memory class list that records every effective write.
    ///
    /// `fail_add` / `fail_remove` make the next write of that name fail once.
    #[derive(Debug, Default)]
    struct RecordingList {
        classes: RefCell<BTreeSet<String>>,
        writes: RefCell<Vec<String>>,
        fail_add: RefCell<Option<String>>,
        fail_remove: RefCell<Option<String>>,
        panic_on_add: Cell<bool>,
    }

    impl RecordingList {
        fn classes(&self) -> Vec<String> {
            self.classes.borrow().iter().cloned().collect()
        }

        fn fail_once(slot: &RefCell<Option<String>>, name: &str) -> Result<(), DomError> {
            let hit = slot.borrow().as_deref() == Some(name);
            if hit {
                slot.replace(None);
                return Err(DomError::HierarchyRequest("class list unavailable"));
            }
            Ok(())
        }
    }

    impl ClassList for RecordingList {
        fn add_class(&self, name: &str) -> Result<(), DomError> {
            assert!(!self.panic_on_add.get(), "class list poisoned");
            Self::fail_once(&self.fail_add, name)?;
            if self.classes.borrow_mut().insert(name.to_owned()) {
                self.writes.borrow_mut().push(format!("+{name}"));
            }
            Ok(())
        }

        fn remove_class(&self, name: &str) -> Result<(), DomError> {
            Self::fail_once(&self.fail_remove, name)?;
            if self.classes.borrow_mut().remove(name) {
                self.writes.borrow_mut().push(format!("-{name}"));
            }
            Ok(())
        }

        fn contains_class(&self, name: &str) -> bool {
            self.classes.borrow().contains(name)
        }
    }

    type Fixture = (
        ClassAttributeObserver<Rc<RecordingList>>,
        Rc<RecordingList>,
        FlushQueue,
    );

    fn observer(policy: QueuePolicy) -> Fixture {
        let list = Rc::new(RecordingList::default());
        let queue = FlushQueue::new();
        let observer = ClassAttributeObserver::with_config(
            Rc::clone(&list),
            &queue,
            ObserverConfig::default().with_queue_policy(policy),
        );
        (observer, list, queue)
    }

    #[test]
    fn first_flush_only_adds() {
        let (obs, list, _queue) = observer(QueuePolicy::Immediate);
        list.classes.borrow_mut().insert("pre".to_owned());
        obs.set_value("a b", LifecycleFlags::NONE).unwrap();
        assert_eq!(obs.version(), 1);
        assert_eq!(list.classes(), ["a", "b", "pre"]);
    }

    #[test]
    fn queued_once_coalesces_until_tick() {
        let (obs, list, queue) = observer(QueuePolicy::QueuedOnce);
        obs.set_value("a", LifecycleFlags::NONE).unwrap();
        obs.set_value("b", LifecycleFlags::NONE).unwrap();
        obs.set_value("c", LifecycleFlags::NONE).unwrap();
        assert_eq!(obs.phase(), ObserverPhase::Dirty);
        assert_eq!(queue.len(), 1);
        assert!(list.writes.borrow().is_empty());

        queue.tick();
        assert_eq!(*list.writes.borrow(), ["+c"]);
        assert_eq!(obs.phase(), ObserverPhase::Clean);
        assert!(!obs.is_queued());
    }

    #[test]
    fn from_bind_flushes_synchronously() {
        let (obs, list, queue) = observer(QueuePolicy::Persistent);
        obs.set_value("a", LifecycleFlags::FROM_BIND).unwrap();
        assert_eq!(list.classes(), ["a"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn persistent_flushes_only_when_dirty() {
        let (obs, list, queue) = observer(QueuePolicy::Persistent);
        obs.bind(LifecycleFlags::NONE);
        assert!(obs.is_queued());
        queue.tick();
        assert_eq!(obs.version(), 0);

        obs.set_value("x", LifecycleFlags::NONE).unwrap();
        queue.tick();
        queue.tick();
        assert_eq!(obs.version(), 1);
        assert_eq!(list.classes(), ["x"]);

        obs.unbind(LifecycleFlags::FROM_UNBIND);
        assert!(!obs.is_queued());
        assert!(!obs.is_bound());
    }

    #[test]
    fn same_text_is_not_a_change() {
        let (obs, _list, _queue) = observer(QueuePolicy::Immediate);
        obs.set_value("a", LifecycleFlags::NONE).unwrap();
        obs.set_value("a", LifecycleFlags::NONE).unwrap();
        assert_eq!(obs.version(), 1);
        assert!(!obs.has_changes());
    }

    #[test]
    fn removal_lags_one_generation() {
        let (obs, list, _queue) = observer(QueuePolicy::Immediate);
        obs.set_value("a", LifecycleFlags::NONE).unwrap();
        obs.set_value("a ", LifecycleFlags::NONE).unwrap();
        assert_eq!(list.classes(), ["a"]);
        obs.set_value("", LifecycleFlags::NONE).unwrap();
        assert!(list.classes().is_empty());
        assert_eq!(obs.generation_of("a"), Some(1));
    }

    #[test]
    fn pruning_forgets_removed_names() {
        let list = Rc::new(RecordingList::default());
        let queue = FlushQueue::new();
        let obs = ClassAttributeObserver::with_config(
            Rc::clone(&list),
            &queue,
            ObserverConfig::default()
                .with_queue_policy(QueuePolicy::Immediate)
                .with_prune_stale_names(true),
        );
        obs.set_value("a b", LifecycleFlags::NONE).unwrap();
        obs.set_value("b", LifecycleFlags::NONE).unwrap();
        assert_eq!(obs.indexed_names(), 1);
        assert_eq!(obs.generation_of("a"), None);
        assert_eq!(list.classes(), ["b"]);
    }

    #[test]
    fn conflicting_flags_rejected() {
        let list = Rc::new(RecordingList::default());
        let queue = FlushQueue::new();
        let result = ClassAttributeObserver::new(
            list,
            &queue,
            LifecycleFlags::NO_TARGET_OBSERVER_QUEUE
                | LifecycleFlags::ONE_TIME_TARGET_OBSERVER_QUEUE,
        );
        assert!(matches!(result, Err(ConfigError::ConflictingQueuePolicy(_))));
    }

    #[test]
    fn failed_add_keeps_version_and_stays_dirty() {
        let (obs, list, _queue) = observer(QueuePolicy::Immediate);
        obs.set_value("a", LifecycleFlags::NONE).unwrap();
        obs.set_value("b", LifecycleFlags::NONE).unwrap();

        list.fail_add.replace(Some("c".to_owned()));
        assert!(obs.set_value("c", LifecycleFlags::NONE).is_err());
        assert_eq!(obs.version(), 2);
        assert!(obs.has_changes());
        assert_eq!(obs.phase(), ObserverPhase::Dirty);
        assert_eq!(obs.flushed_value().normalize(), ["b"]);
        assert_eq!(list.classes(), ["b"]);

        for next in ["d", "e", "f"] {
            obs.set_value(next, LifecycleFlags::NONE).unwrap();
        }
        assert_eq!(obs.version(), 5);
        assert_eq!(list.classes(), ["f"]);
    }

    #[test]
    fn failed_add_is_retried_by_next_flush() {
        let (obs, list, _queue) = observer(QueuePolicy::Immediate);
        obs.set_value("a", LifecycleFlags::NONE).unwrap();
        list.fail_add.replace(Some("b".to_owned()));
        assert!(obs.set_value("b", LifecycleFlags::NONE).is_err());

        obs.flush().unwrap();
        assert_eq!(obs.version(), 2);
        assert!(!obs.has_changes());
        assert_eq!(list.classes(), ["b"]);
    }

    #[test]
    fn failed_remove_is_retried_next_generation() {
        let (obs, list, _queue) = observer(QueuePolicy::Immediate);
        obs.set_value("a", LifecycleFlags::NONE).unwrap();
        obs.set_value("b", LifecycleFlags::NONE).unwrap();

        list.fail_remove.replace(Some("b".to_owned()));
        assert!(obs.set_value("c", LifecycleFlags::NONE).is_err());
        assert_eq!(obs.version(), 3);
        assert!(!obs.has_changes());
        assert_eq!(list.classes(), ["b", "c"]);
        assert_eq!(obs.generation_of("b"), Some(2));

        obs.set_value("d", LifecycleFlags::NONE).unwrap();
        assert_eq!(list.classes(), ["d"]);
    }

    #[test]
    fn panicking_class_list_does_not_strand_flushing_phase() {
        let (obs, list, _queue) = observer(QueuePolicy::Immediate);
        list.panic_on_add.set(true);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            obs.set_value("a", LifecycleFlags::NONE)
        }));
        assert!(result.is_err());
        assert_ne!(obs.phase(), ObserverPhase::Flushing);

        list.panic_on_add.set(false);
        obs.set_value("b", LifecycleFlags::NONE).unwrap();
        assert_eq!(list.classes(), ["b"]);
        assert_eq!(obs.phase(), ObserverPhase::Clean);
    }
}
