#![forbid(unsafe_code)]

//! View-model side of class bindings.
//!
//! - [`Observable`]: shared value that notifies on every write.
//! - [`Subscription`]: RAII guard; dropping it unsubscribes.
//! - [`ClassBinding`]: lifecycle owner wiring an observable class value to
//!   a [`ClassAttributeObserver`](crate::ClassAttributeObserver).

pub mod binding;
pub mod observable;

pub use binding::ClassBinding;
pub use observable::{Observable, Subscription};
