use wave_model::doc_op::{parse_xml, Attributes, DocInitialization};
use wave_model::listeners::{DocumentEngine, Point};
use wave_model::tree::{NodeId, TreeDocument};

pub fn xml(input: &str) -> DocInitialization {
    parse_xml(input).unwrap_or_else(|e| panic!("bad fixture {input:?}: {e}"))
}

pub fn attrs(pairs: &[(&str, &str)]) -> Attributes {
    Attributes::from_pairs(pairs.iter().copied()).expect("fixture attributes must be unique")
}

/// A fresh document with one empty container element at the top level.
pub fn document_with_container(tag: &str) -> (TreeDocument, NodeId) {
    let doc = TreeDocument::new();
    let root = doc.document_element();
    let container = doc.create_child_element(&root, tag, &Attributes::new());
    (doc, container)
}

pub fn append(doc: &TreeDocument, container: NodeId, tag: &str, pairs: &[(&str, &str)]) -> NodeId {
    doc.create_element(Point::End(container), tag, &attrs(pairs))
}

pub fn prepend(doc: &TreeDocument, container: NodeId, tag: &str, pairs: &[(&str, &str)]) -> NodeId {
    doc.create_element(Point::Start(container), tag, &attrs(pairs))
}

/// Deletes every child of `container` whose `name` attribute is `value`.
pub fn delete_where(doc: &TreeDocument, container: NodeId, name: &str, value: &str) {
    for child in doc.child_elements(&container) {
        if doc.attribute(&child, name).as_deref() == Some(value) {
            doc.delete_element(&child);
        }
    }
}
