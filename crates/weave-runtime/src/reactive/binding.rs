#![forbid(unsafe_code)]

//! Binding from an observable class value to a class observer.
//!
//! [`ClassBinding`] is the lifecycle owner the observer expects: `bind`
//! enrolls the observer, applies the current value synchronously and starts
//! forwarding writes; `unbind` stops forwarding and cancels any queued flush.

use weave_dom::ClassList;

use super::observable::{Observable, Subscription};
use crate::class_observer::ClassAttributeObserver;
use crate::class_value::ClassValue;
use crate::error::FlushError;
use crate::flags::LifecycleFlags;

/// Connects an [`Observable<ClassValue>`] to a [`ClassAttributeObserver`].
pub struct ClassBinding<T: ClassList + 'static> {
    source: Observable<ClassValue>,
    observer: ClassAttributeObserver<T>,
    subscription: Option<Subscription>,
}

impl<T: ClassList + 'static> std::fmt::Debug for ClassBinding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassBinding")
            .field("source", &self.source)
            .field("observer", &self.observer)
            .field("bound", &self.is_bound())
            .finish()
    }
}

impl<T: ClassList + 'static> ClassBinding<T> {
    #[must_use]
    pub fn new(source: Observable<ClassValue>, observer: ClassAttributeObserver<T>) -> Self {
        Self {
            source,
            observer,
            subscription: None,
        }
    }

    /// Start the binding. Binding twice is a no-op.
    ///
    /// The current value is flushed immediately; an error from that flush
    /// is returned and leaves the binding unbound.
    pub fn bind(&mut self, flags: LifecycleFlags) -> Result<(), FlushError> {
        if self.subscription.is_some() {
            return Ok(());
        }
        self.observer.bind(flags);
        if let Err(error) = self
            .observer
            .set_value(self.source.get(), flags | LifecycleFlags::FROM_BIND)
        {
            self.observer.unbind(flags | LifecycleFlags::FROM_UNBIND);
            return Err(error);
        }

        let observer = self.observer.clone();
        self.subscription = Some(self.source.subscribe(move |value: &ClassValue| {
            if let Err(error) = observer.set_value(value.clone(), LifecycleFlags::NONE) {
                tracing::error!(%error, "class binding write failed");
            }
        }));
        Ok(())
    }

    /// Stop forwarding writes and detach the observer.
    pub fn unbind(&mut self, flags: LifecycleFlags) {
        self.subscription = None;
        self.observer.unbind(flags | LifecycleFlags::FROM_UNBIND);
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.subscription.is_some()
    }

    #[must_use]
    pub fn source(&self) -> &Observable<ClassValue> {
        &self.source
    }

    #[must_use]
    pub fn observer(&self) -> &ClassAttributeObserver<T> {
        &self.observer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{ObserverConfig, QueuePolicy};
    use crate::flush_queue::FlushQueue;
    use weave_dom::{ElementRef, SharedDocument};

    type Fixture = (
        SharedDocument,
        ElementRef,
        FlushQueue,
        ClassBinding<ElementRef>,
    );

    fn setup(policy: QueuePolicy) -> Fixture {
        let doc = SharedDocument::new();
        let node = doc.borrow_mut().create_element("div");
        let el = doc.element(node);
        let queue = FlushQueue::new();
        let observer = ClassAttributeObserver::with_config(
            el.clone(),
            &queue,
            ObserverConfig::default().with_queue_policy(policy),
        );
        let source = Observable::new(ClassValue::from("initial"));
        let binding = ClassBinding::new(source, observer);
        (doc, el, queue, binding)
    }

    #[test]
    fn bind_applies_current_value_synchronously() {
        let (_doc, el, queue, mut binding) = setup(QueuePolicy::QueuedOnce);
        binding.bind(LifecycleFlags::NONE).unwrap();
        assert_eq!(el.classes(), ["initial"]);
        assert!(queue.is_empty());
        assert!(binding.is_bound());
    }

    #[test]
    fn writes_are_forwarded_and_coalesced() {
        let (_doc, el, queue, mut binding) = setup(QueuePolicy::QueuedOnce);
        binding.bind(LifecycleFlags::NONE).unwrap();
        binding.source().set("a".into());
        binding.source().set("b".into());
        assert_eq!(el.classes(), ["initial"]);
        queue.tick();
        assert_eq!(el.classes(), ["b"]);
    }

    #[test]
    fn unbind_cancels_pending_flush() {
        let (_doc, el, queue, mut binding) = setup(QueuePolicy::Persistent);
        binding.bind(LifecycleFlags::NONE).unwrap();
        binding.source().set("next".into());
        binding.unbind(LifecycleFlags::NONE);
        queue.tick();
        assert_eq!(el.classes(), ["initial"]);
        assert!(!binding.observer().is_queued());

        binding.source().set("ignored".into());
        assert_eq!(binding.observer().value().normalize(), ["next"]);
    }
}
