#![forbid(unsafe_code)]

//! Weave Runtime
//!
//! Change observation and batched flush scheduling for Weave views.
//!
//! # Key Components
//!
//! - [`FlushQueue`] - Priority-ordered queue drained once per frame tick
//! - [`FlushTask`] - Work item the queue runs
//! - [`ClassAttributeObserver`] - Binds a [`ClassValue`] to an element's class list
//! - [`GenerationIndex`] - Class name to last-applied flush version
//! - [`LifecycleFlags`] / [`ObserverConfig`] - Binding flags and observer policy
//! - [`reactive`] - Observable view-model values and [`ClassBinding`]
//!
//! # Role in Weave
//! `weave-runtime` decides *when* the DOM changes. Application writes land
//! in observers, observers enqueue themselves, and the host drives
//! [`FlushQueue::tick`] from its frame loop.
//!
//! # How it fits in the system
//! All DOM effects go through `weave-dom`: observers are generic over its
//! [`ClassList`](weave_dom::ClassList) seam, usually an
//! [`ElementRef`](weave_dom::ElementRef) into a shared document.

pub mod class_observer;
pub mod class_value;
pub mod error;
pub mod flags;
pub mod flush_queue;
pub mod generation_index;
pub mod reactive;

pub use class_observer::{ClassAttributeObserver, ObserverPhase};
pub use class_value::ClassValue;
pub use error::{ConfigError, FlushError};
pub use flags::{LifecycleFlags, ObserverConfig, QueuePolicy};
pub use flush_queue::{
    DrainReport, Enrollment, FlushFailure, FlushQueue, FlushQueueConfig, FlushTask, Priority,
    TaskKey,
};
pub use generation_index::GenerationIndex;
pub use reactive::{ClassBinding, Observable, Subscription};
