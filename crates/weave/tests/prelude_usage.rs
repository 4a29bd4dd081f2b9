#![forbid(unsafe_code)]
#![cfg(feature = "runtime")]

//! Smoke test: a view built only from the prelude.

use weave::prelude::*;

fn mount(doc: &SharedDocument, queue: &FlushQueue) -> Result<(NodeId, ClassBinding<ElementRef>)> {
    let node = doc.borrow_mut().create_element("button");
    let observer = ClassAttributeObserver::new(
        doc.element(node),
        queue,
        LifecycleFlags::PERSISTENT_TARGET_OBSERVER_QUEUE,
    )?;
    let mut binding = ClassBinding::new(Observable::new(ClassValue::from("btn")), observer);
    binding.bind(LifecycleFlags::NONE)?;
    Ok((node, binding))
}

#[test]
fn bound_button_follows_its_observable() {
    let doc = SharedDocument::new();
    let queue = FlushQueue::new();
    let (node, mut binding) = mount(&doc, &queue).unwrap();
    assert_eq!(doc.element(node).classes(), ["btn"]);

    binding
        .source()
        .set(ClassValue::flags([("btn", true), ("btn-active", true)]));
    queue.tick();
    let mut classes = doc.element(node).classes();
    classes.sort();
    assert_eq!(classes, ["btn", "btn-active"]);

    binding.unbind(LifecycleFlags::NONE);
    assert!(queue.is_empty());
}

#[test]
fn conflicting_policy_surfaces_as_facade_error() {
    let doc = SharedDocument::new();
    let node = doc.borrow_mut().create_element("div");
    let result: Result<ClassAttributeObserver<ElementRef>> = ClassAttributeObserver::new(
        doc.element(node),
        &FlushQueue::new(),
        LifecycleFlags::NO_TARGET_OBSERVER_QUEUE | LifecycleFlags::PERSISTENT_TARGET_OBSERVER_QUEUE,
    )
    .map_err(Error::from);
    let err = result.unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(err.to_string().contains("conflicting"));
}
