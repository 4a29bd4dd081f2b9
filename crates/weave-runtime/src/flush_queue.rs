#![forbid(unsafe_code)]

//! Frame-driven flush queue.
//!
//! The flush queue collects pending DOM mutations and runs them once per
//! animation-frame tick. The host (a `requestAnimationFrame` loop, a test,
//! a headless driver) calls [`FlushQueue::tick`]; everything else only
//! enqueues and dequeues.
//!
//! # Ordering
//!
//! Entries run by ascending [`Priority`] (lower value first), then by
//! insertion order within one priority. A persistent entry keeps its
//! original position across ticks.
//!
//! # Enrollment
//!
//! | Enrollment | Runs | Enqueued during a drain |
//! |------------|------|-------------------------|
//! | [`Persistent`](Enrollment::Persistent) | every tick until dequeued | from the next tick |
//! | [`Once`](Enrollment::Once) | once, then removed | on the next tick |
//! | [`Reentrant`](Enrollment::Reentrant) | once, then removed | this tick if its position is still ahead |
//!
//! # Invariants
//!
//! 1. At most one entry exists per task; re-enqueueing is a no-op, except
//!    that a persistent enrollment upgrades a pending one-shot entry.
//! 2. Dequeue is honored immediately, including for entries of the drain in
//!    progress that have not run yet, and from inside the task's own flush.
//! 3. A failing task never prevents the remaining tasks from running.
//! 4. Tasks are held weakly: the queue never keeps an owner alive.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | Task returns `Err` | Reported to the error handler and the [`DrainReport`]; drain continues |
//! | Task panics | Propagates (structural bug); the queue stays usable |
//! | Owner dropped while queued | Entry pruned at the next drain |
//! | Per-tick budget exhausted | Remaining entries wait for the next tick, with a warning |
//! | `tick()` called from inside a flush | Ignored, with a warning |

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Bound;
use std::rc::{Rc, Weak};

use crate::error::FlushError;
use crate::flags::LifecycleFlags;

/// Default maximum number of task runs per tick.
const DEFAULT_MAX_TASKS_PER_TICK: usize = 10_000;

/// Default capacity reserved for the task index.
const DEFAULT_INITIAL_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Position of a task within a tick. Lower values run earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(u16);

impl Priority {
    pub const PREEMPT: Self = Self(0x1000);
    pub const HIGH: Self = Self(0x2000);
    pub const BIND: Self = Self(0x3000);
    pub const ATTACH: Self = Self(0x4000);
    pub const NORMAL: Self = Self(0x5000);
    /// Target observers propagating view-model values into the DOM.
    pub const PROPAGATE: Self = Self(0x6000);
    pub const CONNECT: Self = Self(0x7000);
    pub const LOW: Self = Self(0x8000);

    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::NORMAL
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// A unit of work the flush queue can run.
///
/// The `(callback, owner)` pair of a scheduler entry is one `Rc` allocation
/// implementing this trait; its address is the entry's identity.
pub trait FlushTask {
    /// Apply pending work. Called with [`LifecycleFlags::FROM_FLUSH`].
    fn flush(&self, flags: LifecycleFlags) -> Result<(), FlushError>;

    /// Short name used in logs and failure reports.
    fn label(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl<F> FlushTask for F
where
    F: Fn(LifecycleFlags) -> Result<(), FlushError>,
{
    fn flush(&self, flags: LifecycleFlags) -> Result<(), FlushError> {
        self(flags)
    }

    fn label(&self) -> &'static str {
        "closure"
    }
}

/// Identity of a queued task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskKey(usize);

impl TaskKey {
    /// Identity of `task`'s allocation.
    #[must_use]
    pub fn of<T: ?Sized>(task: &Rc<T>) -> Self {
        Self(Rc::as_ptr(task).cast::<()>() as usize)
    }
}

/// How long an entry stays queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Enrollment {
    /// Runs every tick until dequeued.
    Persistent,
    /// Runs once; when enqueued during a drain, waits for the next tick.
    Once,
    /// Runs once; may still run in the drain that enqueued it.
    Reentrant,
}

// ---------------------------------------------------------------------------
// Configuration and reports
// ---------------------------------------------------------------------------

/// Configuration for [`FlushQueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushQueueConfig {
    /// Maximum task runs per tick before the rest is deferred.
    /// Default: 10_000.
    pub max_tasks_per_tick: usize,
    /// Capacity reserved for the task index. Default: 64.
    pub initial_capacity: usize,
}

impl Default for FlushQueueConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_tick: DEFAULT_MAX_TASKS_PER_TICK,
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
        }
    }
}

impl FlushQueueConfig {
    /// Set the per-tick budget (builder pattern). Clamped to at least 1.
    #[must_use]
    pub fn with_max_tasks_per_tick(mut self, max: usize) -> Self {
        self.max_tasks_per_tick = max.max(1);
        self
    }

    /// Set the initial index capacity (builder pattern).
    #[must_use]
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }
}

/// One task failure inside a drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushFailure {
    pub task: TaskKey,
    pub label: &'static str,
    pub priority: Priority,
    pub tick: u64,
    pub error: FlushError,
}

/// Outcome of one [`FlushQueue::tick`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Tick number (1-based).
    pub tick: u64,
    /// Tasks that ran and succeeded.
    pub executed: usize,
    /// Tasks that ran and failed.
    pub failures: Vec<FlushFailure>,
    /// Eligible entries left for the next tick because the budget ran out.
    pub deferred: usize,
    /// Entries dropped because their owner no longer exists.
    pub pruned: usize,
}

impl DrainReport {
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Total task runs in this tick.
    #[must_use]
    pub fn ran(&self) -> usize {
        self.executed + self.failures.len()
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// Ordering key: priority, then insertion sequence.
type Slot = (Priority, u64);

struct Entry {
    key: TaskKey,
    task: Weak<dyn FlushTask>,
    label: &'static str,
    enrollment: Enrollment,
    /// First tick in which the entry may run.
    eligible_tick: u64,
}

type ErrorHandler = Rc<dyn Fn(&FlushFailure)>;

struct QueueState {
    config: FlushQueueConfig,
    entries: BTreeMap<Slot, Entry>,
    index: HashMap<TaskKey, Slot>,
    next_seq: u64,
    /// Number of ticks started so far.
    tick: u64,
    draining: bool,
    error_handler: Option<ErrorHandler>,
}

impl QueueState {
    fn remove_slot(&mut self, slot: Slot) -> Option<Entry> {
        let entry = self.entries.remove(&slot)?;
        self.index.remove(&entry.key);
        Some(entry)
    }
}

/// Shared, explicitly constructed flush queue.
///
/// Cloning yields another handle to the same queue. Observers receive a
/// handle at construction; nothing in the runtime reaches for a global.
#[derive(Clone)]
pub struct FlushQueue {
    inner: Rc<RefCell<QueueState>>,
}

impl fmt::Debug for FlushQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.borrow();
        f.debug_struct("FlushQueue")
            .field("len", &state.entries.len())
            .field("tick", &state.tick)
            .field("draining", &state.draining)
            .finish()
    }
}

impl Default for FlushQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the draining flag even if a task panics.
struct DrainGuard<'a>(&'a RefCell<QueueState>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.0.try_borrow_mut() {
            state.draining = false;
        }
    }
}

impl FlushQueue {
    /// Create a queue with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(FlushQueueConfig::default())
    }

    #[must_use]
    pub fn with_config(config: FlushQueueConfig) -> Self {
        let index = HashMap::with_capacity(config.initial_capacity);
        Self {
            inner: Rc::new(RefCell::new(QueueState {
                config,
                entries: BTreeMap::new(),
                index,
                next_seq: 0,
                tick: 0,
                draining: false,
                error_handler: None,
            })),
        }
    }

    /// Route task failures to `handler` instead of the default
    /// `tracing::error!` report.
    pub fn set_error_handler(&self, handler: impl Fn(&FlushFailure) + 'static) {
        self.inner.borrow_mut().error_handler = Some(Rc::new(handler));
    }

    /// Queue `task` at `priority`.
    ///
    /// Returns `true` if a new entry was created, `false` if the task was
    /// already queued (the call coalesced).
    pub fn enqueue<T: FlushTask + 'static>(
        &self,
        task: &Rc<T>,
        priority: Priority,
        enrollment: Enrollment,
    ) -> bool {
        let key = TaskKey::of(task);
        let mut state = self.inner.borrow_mut();

        if let Some(&slot) = state.index.get(&key) {
            if enrollment == Enrollment::Persistent
                && let Some(entry) = state.entries.get_mut(&slot)
                && entry.enrollment != Enrollment::Persistent
            {
                entry.enrollment = Enrollment::Persistent;
                tracing::trace!(task = ?key, "flush entry upgraded to persistent");
            }
            return false;
        }

        let eligible_tick = if state.draining && enrollment == Enrollment::Reentrant {
            state.tick
        } else {
            state.tick + 1
        };
        let slot = (priority, state.next_seq);
        state.next_seq += 1;
        let weak: Weak<dyn FlushTask> = Rc::downgrade(task) as Weak<dyn FlushTask>;
        let label = task.label();
        state.entries.insert(
            slot,
            Entry {
                key,
                task: weak,
                label,
                enrollment,
                eligible_tick,
            },
        );
        state.index.insert(key, slot);
        tracing::trace!(
            task = ?key,
            label,
            priority = priority.value(),
            ?enrollment,
            eligible_tick,
            "flush entry enqueued"
        );
        true
    }

    /// Remove `task` if queued. Returns whether an entry was removed.
    pub fn dequeue<T: ?Sized>(&self, task: &Rc<T>) -> bool {
        let key = TaskKey::of(task);
        let mut state = self.inner.borrow_mut();
        let Some(slot) = state.index.get(&key).copied() else {
            return false;
        };
        state.remove_slot(slot);
        tracing::trace!(task = ?key, "flush entry dequeued");
        true
    }

    /// Whether `task` is currently queued.
    #[must_use]
    pub fn contains<T: ?Sized>(&self, task: &Rc<T>) -> bool {
        self.inner.borrow().index.contains_key(&TaskKey::of(task))
    }

    /// Number of queued entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }

    /// Number of ticks started so far.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.inner.borrow().tick
    }

    /// Whether a drain is in progress.
    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.inner.borrow().draining
    }

    /// Drain the queue once.
    ///
    /// Runs every eligible entry in priority order. One-shot entries are
    /// removed before they run, so they may re-enqueue themselves.
    pub fn tick(&self) -> DrainReport {
        let (tick, budget) = {
            let mut state = self.inner.borrow_mut();
            if state.draining {
                tracing::warn!(tick = state.tick, "nested flush queue tick ignored");
                return DrainReport {
                    tick: state.tick,
                    ..DrainReport::default()
                };
            }
            state.draining = true;
            state.tick += 1;
            (state.tick, state.config.max_tasks_per_tick)
        };
        let _guard = DrainGuard(&self.inner);
        let _span = tracing::debug_span!("flush_tick", tick).entered();

        let mut report = DrainReport {
            tick,
            ..DrainReport::default()
        };
        let mut cursor: Option<Slot> = None;

        loop {
            let Some((slot, key, label, task)) = self.next_runnable(tick, cursor, &mut report)
            else {
                break;
            };
            cursor = Some(slot);

            if report.ran() >= budget {
                report.deferred = self.count_eligible(tick, slot);
                tracing::warn!(
                    tick,
                    budget,
                    deferred = report.deferred,
                    "flush budget exhausted; deferring to next tick"
                );
                break;
            }
            self.take_one_shot(slot);

            match task.flush(LifecycleFlags::FROM_FLUSH) {
                Ok(()) => report.executed += 1,
                Err(error) => {
                    let failure = FlushFailure {
                        task: key,
                        label,
                        priority: slot.0,
                        tick,
                        error,
                    };
                    self.report_failure(&failure);
                    report.failures.push(failure);
                }
            }
        }

        tracing::debug!(
            tick,
            executed = report.executed,
            failed = report.failed(),
            deferred = report.deferred,
            pruned = report.pruned,
            remaining = self.len(),
            "flush tick complete"
        );
        report
    }

    /// Find the next live, eligible entry after `cursor`, pruning dead ones.
    fn next_runnable(
        &self,
        tick: u64,
        cursor: Option<Slot>,
        report: &mut DrainReport,
    ) -> Option<(Slot, TaskKey, &'static str, Rc<dyn FlushTask>)> {
        let mut state = self.inner.borrow_mut();
        let lower = cursor.map_or(Bound::Unbounded, Bound::Excluded);
        let mut dead = Vec::new();
        let mut found = None;
        for (slot, entry) in state.entries.range((lower, Bound::Unbounded)) {
            if entry.eligible_tick > tick {
                continue;
            }
            match entry.task.upgrade() {
                Some(task) => {
                    found = Some((*slot, entry.key, entry.label, task));
                    break;
                }
                None => dead.push(*slot),
            }
        }
        for slot in dead {
            if let Some(entry) = state.remove_slot(slot) {
                tracing::trace!(
                    task = ?entry.key,
                    label = entry.label,
                    "pruned dropped flush task"
                );
                report.pruned += 1;
            }
        }
        found
    }

    /// Remove the entry at `slot` unless it is persistent.
    fn take_one_shot(&self, slot: Slot) {
        let mut state = self.inner.borrow_mut();
        if state
            .entries
            .get(&slot)
            .is_some_and(|entry| entry.enrollment != Enrollment::Persistent)
        {
            state.remove_slot(slot);
        }
    }

    /// Eligible entries at or after `from`.
    fn count_eligible(&self, tick: u64, from: Slot) -> usize {
        let state = self.inner.borrow();
        state
            .entries
            .range(from..)
            .filter(|(_, entry)| entry.eligible_tick <= tick)
            .count()
    }

    fn report_failure(&self, failure: &FlushFailure) {
        let handler = self.inner.borrow().error_handler.clone();
        match handler {
            Some(handler) => handler(failure),
            None => tracing::error!(
                task = ?failure.task,
                label = failure.label,
                priority = failure.priority.value(),
                tick = failure.tick,
                error = %failure.error,
                "flush task failed"
            ),
        }
    }
}
