//! An observable tree document.
//!
//! [`TreeDocument`] is an arena of element and text nodes under a root
//! element. It implements [`DocumentEngine`], so document-based collections
//! can be adapted onto it, and converts to and from initializations.
//! Annotations are not kept.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use log::trace;

use crate::doc_op::{
    to_xml_string, AnnotationBoundaryMap, Attributes, AttributesUpdate, DocInitialization,
    DocInitializationBuffer, DocInitializationCursor, ValueChange,
};
use crate::listeners::{DocumentEngine, ElementListener, ListenerId, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

const ROOT: NodeId = NodeId(0);
const ROOT_TAG: &str = "doc";

#[derive(Debug, Clone)]
enum NodeKind {
    Element { tag: String, attributes: Attributes },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    live: bool,
}

enum Event {
    Added(NodeId),
    Removed(NodeId),
    AttributeChanged {
        element: NodeId,
        name: String,
        old: Option<String>,
        new: Option<String>,
    },
}

type Listeners = BTreeMap<ListenerId, Rc<dyn ElementListener<NodeId>>>;

struct Tree {
    nodes: Vec<Node>,
    listeners: HashMap<NodeId, Listeners>,
    next_listener_id: ListenerId,
}

impl Tree {
    fn new() -> Self {
        let root = Node {
            kind: NodeKind::Element {
                tag: ROOT_TAG.to_owned(),
                attributes: Attributes::new(),
            },
            parent: None,
            children: Vec::new(),
            live: true,
        };
        Self {
            nodes: vec![root],
            listeners: HashMap::new(),
            next_listener_id: 1,
        }
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn push(&mut self, parent: NodeId, index: usize, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
            live: true,
        });
        self.nodes[parent.0].children.insert(index, id);
        id
    }

    fn resolve(&self, point: &Point<NodeId>) -> (NodeId, usize) {
        match *point {
            Point::Start(parent) => (parent, 0),
            Point::End(parent) => (parent, self.node(parent).children.len()),
            Point::Before(sibling) => {
                let parent = match self.node(sibling).parent {
                    Some(parent) if self.node(sibling).live => parent,
                    _ => panic!("point refers to a detached node {sibling:?}"),
                };
                let index = self
                    .node(parent)
                    .children
                    .iter()
                    .position(|c| *c == sibling)
                    .unwrap_or(0);
                (parent, index)
            }
        }
    }

    fn size(&self, id: NodeId) -> usize {
        let node = self.node(id);
        match &node.kind {
            NodeKind::Text(text) => text.chars().count(),
            NodeKind::Element { .. } => {
                2 + node.children.iter().map(|c| self.size(*c)).sum::<usize>()
            }
        }
    }

    fn location(&self, id: NodeId) -> usize {
        let mut location = 0;
        let mut current = id;
        while let Some(parent) = self.node(current).parent {
            for sibling in self.node(parent).children.iter().take_while(|s| **s != current) {
                location += self.size(*sibling);
            }
            if parent != ROOT {
                location += 1;
            }
            current = parent;
        }
        location
    }

    fn listeners_of(&self, container: NodeId) -> Vec<Rc<dyn ElementListener<NodeId>>> {
        self.listeners
            .get(&container)
            .map(|l| l.values().cloned().collect())
            .unwrap_or_default()
    }

    fn collect_subtree(&self, id: NodeId, out: &mut Vec<NodeId>) {
        out.push(id);
        for child in &self.node(id).children {
            self.collect_subtree(*child, out);
        }
    }

    fn is_element(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Element { .. })
    }

    fn write_children(&self, id: NodeId, cursor: &mut impl DocInitializationCursor) {
        for child in &self.node(id).children {
            match &self.node(*child).kind {
                NodeKind::Text(text) => cursor.characters(text),
                NodeKind::Element { tag, attributes } => {
                    cursor.element_start(tag, attributes);
                    self.write_children(*child, cursor);
                    cursor.element_end();
                }
            }
        }
    }
}

/// Builds nodes from an initialization without firing events.
struct TreeBuilder<'a> {
    tree: &'a mut Tree,
    stack: Vec<NodeId>,
}

impl TreeBuilder<'_> {
    fn parent(&self) -> NodeId {
        self.stack.last().copied().unwrap_or(ROOT)
    }
}

impl DocInitializationCursor for TreeBuilder<'_> {
    fn annotation_boundary(&mut self, _map: &AnnotationBoundaryMap) {}

    fn characters(&mut self, chars: &str) {
        let parent = self.parent();
        if let Some(&last) = self.tree.node(parent).children.last() {
            if let NodeKind::Text(text) = &mut self.tree.nodes[last.0].kind {
                text.push_str(chars);
                return;
            }
        }
        let index = self.tree.node(parent).children.len();
        self.tree.push(parent, index, NodeKind::Text(chars.to_owned()));
    }

    fn element_start(&mut self, tag: &str, attributes: &Attributes) {
        let parent = self.parent();
        let index = self.tree.node(parent).children.len();
        let id = self.tree.push(
            parent,
            index,
            NodeKind::Element {
                tag: tag.to_owned(),
                attributes: attributes.clone(),
            },
        );
        self.stack.push(id);
    }

    fn element_end(&mut self) {
        self.stack.pop();
    }
}

/// Shared handle to a tree document. Clones see the same document.
#[derive(Clone)]
pub struct TreeDocument {
    tree: Rc<RefCell<Tree>>,
}

impl Default for TreeDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeDocument {
    pub fn new() -> Self {
        Self {
            tree: Rc::new(RefCell::new(Tree::new())),
        }
    }

    pub fn from_initialization(init: &DocInitialization) -> Self {
        let mut tree = Tree::new();
        init.apply(&mut TreeBuilder {
            tree: &mut tree,
            stack: Vec::new(),
        });
        Self {
            tree: Rc::new(RefCell::new(tree)),
        }
    }

    pub fn to_initialization(&self) -> DocInitialization {
        let mut buffer = DocInitializationBuffer::new();
        self.tree.borrow().write_children(ROOT, &mut buffer);
        buffer.finish_unchecked()
    }

    pub fn to_xml(&self) -> String {
        to_xml_string(&self.to_initialization())
    }

    /// Inserts text. Text nodes are not elements, so no listener hears it.
    pub fn insert_text(&self, point: Point<NodeId>, text: &str) {
        let mut tree = self.tree.borrow_mut();
        let (parent, index) = tree.resolve(&point);
        tree.push(parent, index, NodeKind::Text(text.to_owned()));
    }

    pub fn is_live(&self, element: NodeId) -> bool {
        self.tree.borrow().node(element).live
    }

    /// Number of items in the linearized document.
    pub fn length(&self) -> usize {
        let tree = self.tree.borrow();
        tree.node(ROOT).children.iter().map(|c| tree.size(*c)).sum()
    }

    fn dispatch(events: Vec<(Rc<dyn ElementListener<NodeId>>, Event)>) {
        for (listener, event) in events {
            match &event {
                Event::Added(e) => listener.on_element_added(e),
                Event::Removed(e) => listener.on_element_removed(e),
                Event::AttributeChanged {
                    element,
                    name,
                    old,
                    new,
                } => listener.on_attribute_changed(element, name, old.as_deref(), new.as_deref()),
            }
        }
    }
}

impl DocumentEngine for TreeDocument {
    type Element = NodeId;

    fn document_element(&self) -> NodeId {
        ROOT
    }

    fn tag_name(&self, element: &NodeId) -> String {
        match &self.tree.borrow().node(*element).kind {
            NodeKind::Element { tag, .. } => tag.clone(),
            NodeKind::Text(_) => String::new(),
        }
    }

    fn attribute(&self, element: &NodeId, name: &str) -> Option<String> {
        match &self.tree.borrow().node(*element).kind {
            NodeKind::Element { attributes, .. } => attributes.get(name).map(str::to_owned),
            NodeKind::Text(_) => None,
        }
    }

    fn parent_element(&self, element: &NodeId) -> Option<NodeId> {
        let tree = self.tree.borrow();
        let node = tree.node(*element);
        node.parent.filter(|_| node.live)
    }

    fn child_elements(&self, parent: &NodeId) -> Vec<NodeId> {
        let tree = self.tree.borrow();
        tree.node(*parent)
            .children
            .iter()
            .copied()
            .filter(|c| tree.is_element(*c))
            .collect()
    }

    fn location(&self, element: &NodeId) -> usize {
        self.tree.borrow().location(*element)
    }

    fn create_element(&self, point: Point<NodeId>, tag: &str, attributes: &Attributes) -> NodeId {
        let (id, events) = {
            let mut tree = self.tree.borrow_mut();
            let (parent, index) = tree.resolve(&point);
            let id = tree.push(
                parent,
                index,
                NodeKind::Element {
                    tag: tag.to_owned(),
                    attributes: attributes.clone(),
                },
            );
            let events = tree
                .listeners_of(parent)
                .into_iter()
                .map(|l| (l, Event::Added(id)))
                .collect::<Vec<_>>();
            (id, events)
        };
        trace!(target: "wave_model::tree", "created {tag} as {id:?}");
        Self::dispatch(events);
        id
    }

    fn delete_element(&self, element: &NodeId) {
        let events = {
            let mut tree = self.tree.borrow_mut();
            let node = tree.node(*element);
            let Some(parent) = node.parent.filter(|_| node.live) else {
                return;
            };
            tree.nodes[parent.0].children.retain(|c| c != element);
            let mut removed = Vec::new();
            tree.collect_subtree(*element, &mut removed);
            let mut events = Vec::new();
            for id in removed {
                tree.nodes[id.0].live = false;
                if !tree.is_element(id) {
                    continue;
                }
                if let Some(container) = tree.node(id).parent {
                    for listener in tree.listeners_of(container) {
                        events.push((listener, Event::Removed(id)));
                    }
                }
            }
            events
        };
        trace!(target: "wave_model::tree", "deleted {element:?}");
        Self::dispatch(events);
    }

    fn set_attribute(&self, element: &NodeId, name: &str, value: Option<&str>) {
        let events = {
            let mut tree = self.tree.borrow_mut();
            let parent = tree.node(*element).parent;
            let NodeKind::Element { attributes, .. } = &mut tree.nodes[element.0].kind else {
                return;
            };
            let old = attributes.get(name).map(str::to_owned);
            if old.as_deref() == value {
                return;
            }
            let change = ValueChange::new(name, old.as_deref(), value);
            *attributes =
                attributes.update_with_unchecked(&AttributesUpdate::from_changes_unchecked(vec![change]));
            match parent {
                Some(container) => tree
                    .listeners_of(container)
                    .into_iter()
                    .map(|l| {
                        let event = Event::AttributeChanged {
                            element: *element,
                            name: name.to_owned(),
                            old: old.clone(),
                            new: value.map(str::to_owned),
                        };
                        (l, event)
                    })
                    .collect(),
                None => Vec::new(),
            }
        };
        Self::dispatch(events);
    }

    fn add_listener(
        &self,
        container: &NodeId,
        listener: Rc<dyn ElementListener<NodeId>>,
    ) -> ListenerId {
        let mut tree = self.tree.borrow_mut();
        let id = tree.next_listener_id;
        tree.next_listener_id = tree.next_listener_id.saturating_add(1);
        tree.listeners.entry(*container).or_default().insert(id, listener);
        id
    }

    fn remove_listener(&self, container: &NodeId, id: ListenerId) -> bool {
        let mut tree = self.tree.borrow_mut();
        tree.listeners
            .get_mut(container)
            .is_some_and(|l| l.remove(&id).is_some())
    }
}

impl fmt::Debug for TreeDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TreeDocument").field(&self.to_xml()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc_op::parse_xml;

    #[derive(Default)]
    struct Recorder(RefCell<Vec<String>>);

    impl ElementListener<NodeId> for Recorder {
        fn on_element_added(&self, element: &NodeId) {
            self.0.borrow_mut().push(format!("+{}", element.0));
        }

        fn on_element_removed(&self, element: &NodeId) {
            self.0.borrow_mut().push(format!("-{}", element.0));
        }

        fn on_attribute_changed(&self, _e: &NodeId, name: &str, old: Option<&str>, new: Option<&str>) {
            self.0.borrow_mut().push(format!("{name}:{old:?}->{new:?}"));
        }
    }

    #[test]
    fn initialization_round_trip() {
        let xml = r#"<body><line t="h1"/>hello<p a="1">x</p></body>"#;
        let doc = TreeDocument::from_initialization(&parse_xml(xml).unwrap());
        assert_eq!(doc.to_xml(), xml);
        assert_eq!(doc.length(), 12);
    }

    #[test]
    fn locations_follow_the_item_sequence() {
        let doc = TreeDocument::from_initialization(&parse_xml("<a>xy<b/></a><c/>").unwrap());
        let root = doc.document_element();
        let top = doc.child_elements(&root);
        assert_eq!(top.len(), 2);
        assert_eq!(doc.location(&top[0]), 0);
        assert_eq!(doc.location(&top[1]), 6);
        let inner = doc.child_elements(&top[0]);
        assert_eq!(doc.location(&inner[0]), 3);
    }

    #[test]
    fn events_fire_for_direct_children() {
        let doc = TreeDocument::new();
        let root = doc.document_element();
        let container = doc.create_child_element(&root, "list", &Attributes::new());
        let recorder = Rc::new(Recorder::default());
        let id = doc.add_listener(&container, recorder.clone());
        let a = doc.create_element(Point::Start(container), "item", &Attributes::new());
        doc.set_attribute(&a, "v", Some("1"));
        doc.set_attribute(&a, "v", Some("1"));
        let b = doc.create_element(Point::Before(a), "item", &Attributes::new());
        doc.delete_element(&a);
        doc.delete_element(&a);
        assert!(doc.remove_listener(&container, id));
        doc.delete_element(&b);
        assert_eq!(
            *recorder.0.borrow(),
            vec![
                format!("+{}", a.0),
                "v:None->Some(\"1\")".to_owned(),
                format!("+{}", b.0),
                format!("-{}", a.0),
            ]
        );
        assert_eq!(doc.tag_name(&a), "item");
        assert_eq!(doc.attribute(&a, "v").as_deref(), Some("1"));
        assert!(!doc.is_live(a));
        assert_eq!(doc.to_xml(), "<list/>");
    }
}
