#![forbid(unsafe_code)]

//! Mutation log behavior of the headless document.

use pretty_assertions::assert_eq;
use weave_dom::{Document, DomError, MutationRecord, NodeId, NodeSequence, NodeSequenceFactory};

fn child_list(target: NodeId, added: Vec<NodeId>, removed: Vec<NodeId>) -> MutationRecord {
    MutationRecord::ChildList {
        target,
        added,
        removed,
    }
}

#[test]
fn fragment_insertion_moves_children_in_one_batch() {
    let mut doc = Document::new();
    doc.observe();
    let host = doc.create_element("div");
    let fragment = doc.create_fragment();
    let a = doc.create_element("span");
    let b = doc.create_text("b");
    doc.append_child(fragment, a).unwrap();
    doc.append_child(fragment, b).unwrap();
    doc.take_records();

    doc.append_child(host, fragment).unwrap();

    assert_eq!(doc.child_nodes(host), vec![a, b]);
    assert!(doc.child_nodes(fragment).is_empty());
    assert_eq!(
        doc.take_records(),
        vec![
            child_list(fragment, vec![], vec![a]),
            child_list(fragment, vec![], vec![b]),
            child_list(host, vec![a, b], vec![]),
        ]
    );
}

#[test]
fn class_noops_leave_no_records() {
    let mut doc = Document::new();
    doc.observe();
    let el = doc.create_element("p");
    doc.add_class(el, "x").unwrap();
    doc.add_class(el, "x").unwrap();
    doc.remove_class(el, "y").unwrap();
    assert_eq!(
        doc.take_records(),
        vec![MutationRecord::ClassAdded {
            target: el,
            name: "x".to_owned(),
        }]
    );
}

#[test]
fn remove_child_of_stranger_fails() {
    let mut doc = Document::new();
    doc.observe();
    let parent = doc.create_element("ul");
    let other = doc.create_element("li");
    assert_eq!(
        doc.remove_child(parent, other),
        Err(DomError::NotAChild {
            parent,
            child: other
        })
    );
    // Detached remove is a no-op.
    assert_eq!(doc.remove(other), Ok(()));
    assert!(doc.take_records().is_empty());
}

#[test]
fn stamped_sequences_mount_independently() {
    let mut doc = Document::new();
    let template = doc.create_template();
    let content = doc.template_content(template).unwrap();
    let li = doc.create_element("li");
    doc.append_child(content, li).unwrap();

    let factory = NodeSequenceFactory::from_node(&mut doc, template).unwrap();
    let host = doc.create_element("ul");
    let first = factory.create(&mut doc).unwrap();
    let second = factory.create(&mut doc).unwrap();
    first.append_to(&mut doc, host).unwrap();
    second.append_to(&mut doc, host).unwrap();

    let mounted = doc.child_nodes(host);
    assert_eq!(mounted.len(), 2);
    assert_ne!(mounted[0], li);
    assert_ne!(mounted[0], mounted[1]);

    first.remove(&mut doc).unwrap();
    assert_eq!(doc.child_nodes(host), second.child_nodes().to_vec());
    assert!(doc.child_nodes(content).contains(&li));
}
