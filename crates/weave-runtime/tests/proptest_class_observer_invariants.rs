//! Property-based invariant tests for class observers and the flush queue.
//!
//! 1. Normalization splits text on any whitespace and concatenates sequences.
//! 2. The element never holds a name twice, and after every flush it holds
//!    every requested name.
//! 3. Observer output matches a reference model of the one-generation
//!    removal rule.
//! 4. Any number of writes between ticks costs exactly one flush.
//! 5. The queue runs entries by priority, then insertion order.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use proptest::prelude::*;
use weave_dom::{ElementRef, NodeId, SharedDocument};
use weave_runtime::{
    ClassAttributeObserver, ClassValue, Enrollment, FlushError, FlushQueue, LifecycleFlags,
    ObserverConfig, Priority, QueuePolicy,
};

// ── Helpers ─────────────────────────────────────────────────────────────

fn name() -> impl Strategy<Value = String> {
    "[a-e]{1,2}"
}

fn names() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(name(), 0..5)
}

fn separator() -> impl Strategy<Value = String> {
    "[ \t\n]{1,3}"
}

/// Text value joining `names` with generated whitespace runs.
fn spaced_text() -> impl Strategy<Value = (Vec<String>, String)> {
    names().prop_flat_map(|names| {
        let count = names.len() + 1;
        (Just(names), proptest::collection::vec(separator(), count))
    })
    .prop_map(|(names, gaps)| {
        let mut text = gaps[0].clone();
        for (name, gap) in names.iter().zip(&gaps[1..]) {
            text.push_str(name);
            text.push_str(gap);
        }
        (names, text)
    })
}

/// Literal model of the add-then-remove-one-generation-behind rule.
#[derive(Default)]
struct Model {
    version: u64,
    index: HashMap<String, u64>,
    present: BTreeSet<String>,
}

impl Model {
    fn flush(&mut self, names: &[String]) {
        let version = self.version;
        for name in names {
            self.index.insert(name.clone(), version);
            self.present.insert(name.clone());
        }
        self.version += 1;
        if version == 0 {
            return;
        }
        for (name, stamped) in &self.index {
            if *stamped == version - 1 {
                self.present.remove(name);
            }
        }
    }
}

fn immediate_observer() -> (SharedDocument, NodeId, ClassAttributeObserver<ElementRef>) {
    let doc = SharedDocument::new();
    let node = doc.borrow_mut().create_element("div");
    let observer = ClassAttributeObserver::with_config(
        doc.element(node),
        &FlushQueue::new(),
        ObserverConfig::default().with_queue_policy(QueuePolicy::Immediate),
    );
    (doc, node, observer)
}

proptest! {
    #[test]
    fn text_normalization_matches_tokens((expected, text) in spaced_text()) {
        prop_assert_eq!(ClassValue::text(&text).normalize(), expected);
    }

    #[test]
    fn sequence_normalization_concatenates(parts in proptest::collection::vec(names(), 0..4)) {
        let value = ClassValue::sequence(parts.iter().map(|p| ClassValue::text(p.join(" "))));
        let expected: Vec<String> = parts.concat();
        prop_assert_eq!(value.normalize(), expected);
    }

    #[test]
    fn element_never_holds_duplicates(writes in proptest::collection::vec(names(), 1..8)) {
        let (doc, node, observer) = immediate_observer();
        for write in &writes {
            let value = ClassValue::sequence(write.iter().map(ClassValue::text));
            observer.set_value(value, LifecycleFlags::NONE).unwrap();
            let classes = doc.element(node).classes();
            let unique: BTreeSet<&String> = classes.iter().collect();
            prop_assert_eq!(unique.len(), classes.len());
            for name in write {
                prop_assert!(classes.contains(name));
            }
        }
    }

    #[test]
    fn observer_matches_reference_model(writes in proptest::collection::vec(names(), 1..10)) {
        let (doc, node, observer) = immediate_observer();
        let mut model = Model::default();
        for write in &writes {
            let value = ClassValue::sequence(write.iter().map(ClassValue::text));
            observer.set_value(value, LifecycleFlags::NONE).unwrap();
            model.flush(write);
            let actual: BTreeSet<String> = doc.element(node).classes().into_iter().collect();
            prop_assert_eq!(&actual, &model.present);
            prop_assert_eq!(observer.version(), model.version);
        }
    }

    #[test]
    fn writes_between_ticks_flush_once(writes in proptest::collection::vec(names(), 1..12)) {
        let doc = SharedDocument::new();
        let node = doc.borrow_mut().create_element("div");
        doc.borrow_mut().observe();
        let queue = FlushQueue::new();
        let observer = ClassAttributeObserver::with_config(
            doc.element(node),
            &queue,
            ObserverConfig::default(),
        );
        for write in &writes {
            observer
                .set_value(ClassValue::text(write.join(" ")), LifecycleFlags::NONE)
                .unwrap();
        }
        prop_assert!(doc.borrow().pending_records().is_empty());

        queue.tick();
        let last = writes.last().cloned().unwrap_or_default();
        let expected_version = u64::from(!last.is_empty());
        prop_assert_eq!(observer.version(), expected_version);
        let actual: BTreeSet<String> = doc.element(node).classes().into_iter().collect();
        let expected: BTreeSet<String> = last.into_iter().collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn queue_runs_by_priority_then_insertion(priorities in proptest::collection::vec(0u16..4, 1..16)) {
        let queue = FlushQueue::new();
        let order: Rc<RefCell<Vec<usize>>> = Rc::default();
        let tasks: Vec<_> = priorities
            .iter()
            .enumerate()
            .map(|(i, _)| {
                let order = Rc::clone(&order);
                Rc::new(move |_flags: LifecycleFlags| -> Result<(), FlushError> {
                    order.borrow_mut().push(i);
                    Ok(())
                })
            })
            .collect();
        for (task, priority) in tasks.iter().zip(&priorities) {
            queue.enqueue(task, Priority::new(*priority), Enrollment::Once);
        }

        let report = queue.tick();
        prop_assert_eq!(report.executed, priorities.len());

        let mut expected: Vec<usize> = (0..priorities.len()).collect();
        expected.sort_by_key(|&i| (priorities[i], i));
        prop_assert_eq!(order.borrow().clone(), expected);
        prop_assert!(queue.is_empty());
    }
}
