//! Owned document tree standing in for the host calendar page.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Removed nodes stay in
//! the arena (with their subtree intact) so mutation records pointing at them can
//! still be inspected, and so the host can re-attach them. Nodes given up with
//! [`Document::discard`] are reclaimed once the records mentioning them have been
//! handed out; their ids go stale and read as detached, empty nodes.
//!
//! Every structural change (children, attributes, classes, text) is queued as a
//! [`MutationRecord`]; the host drains the queue with [`Document::take_records`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::selectors::Matcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementData {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub classes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeKind {
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    generation: u32,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    ChildList {
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    Attributes {
        name: String,
    },
    /// The text of a text node changed in place.
    CharacterData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub kind: MutationKind,
}

/// Serializable form of a page, used for JSON snapshots.
///
/// ```json
/// { "tag": "div", "attrs": { "role": "button" }, "class": "a b",
///   "children": [ { "text": "10:00 – 11:30" } ] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnapshotNode {
    Text {
        text: String,
    },
    Element {
        tag: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attrs: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        class: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        children: Vec<SnapshotNode>,
    },
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    free: Vec<usize>,
    /// Discarded since the last drain; their records are still queued.
    discarded: Vec<NodeId>,
    /// Discarded before the last drain; freed on the next one.
    retiring: Vec<NodeId>,
    root: NodeId,
    records: Vec<MutationRecord>,
}

impl Document {
    /// Creates a document whose root is an element named `root_tag`.
    pub fn new(root_tag: &str) -> Self {
        let mut doc = Self::empty();
        doc.root = doc.create_element(root_tag);
        doc
    }

    pub fn from_snapshot(snapshot: &SnapshotNode) -> Self {
        let mut doc = Self::empty();
        doc.root = doc.build(snapshot);
        // Building the initial tree is not something observers should see.
        doc.records.clear();
        doc
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: SnapshotNode =
            serde_json::from_str(json).context("parsing page snapshot")?;
        Ok(Self::from_snapshot(&snapshot))
    }

    pub fn to_snapshot(&self) -> SnapshotNode {
        self.snapshot_of(self.root)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_snapshot()).context("serializing page snapshot")
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            ..Default::default()
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    /// Appends `child` to `parent`, detaching it from its current parent first.
    ///
    /// Does nothing if `parent` is `child` or lies beneath it, or if either id is stale.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if self.node(parent).is_none() || self.node(child).is_none() {
            return;
        }
        if self.contains(child, parent) {
            return;
        }
        self.remove(child);
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children.push(child);
        self.records.push(MutationRecord {
            target: parent,
            kind: MutationKind::ChildList {
                added: vec![child],
                removed: Vec::new(),
            },
        });
    }

    /// Detaches `node` from its parent. The node and its subtree stay in the arena.
    pub fn remove(&mut self, node: NodeId) {
        let Some(parent) = self.node(node).and_then(|n| n.parent) else {
            return;
        };
        self.node_mut(node).parent = None;
        self.node_mut(parent).children.retain(|c| *c != node);
        self.records.push(MutationRecord {
            target: parent,
            kind: MutationKind::ChildList {
                added: Vec::new(),
                removed: vec![node],
            },
        });
    }

    /// Detaches `node` and gives it up. Its subtree is reclaimed on the second
    /// [`take_records`](Self::take_records) from now, unless it was re-attached.
    pub fn discard(&mut self, node: NodeId) {
        if self.node(node).is_none() || node == self.root {
            return;
        }
        self.remove(node);
        self.discarded.push(node);
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if name == "class" {
            let classes = value.split_whitespace().map(str::to_string).collect();
            self.set_classes(node, classes);
            return;
        }
        let Some(el) = self.element_mut(node) else {
            return;
        };
        if el.attrs.get(name).map(String::as_str) == Some(value) {
            return;
        }
        el.attrs.insert(name.to_string(), value.to_string());
        self.record_attribute(node, name);
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        let Some(el) = self.element_mut(node) else {
            return;
        };
        if el.attrs.remove(name).is_some() {
            self.record_attribute(node, name);
        }
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        let Some(el) = self.element_mut(node) else {
            return;
        };
        if el.classes.iter().any(|c| c == class) {
            return;
        }
        el.classes.push(class.to_string());
        self.record_attribute(node, "class");
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) {
        let Some(el) = self.element_mut(node) else {
            return;
        };
        let before = el.classes.len();
        el.classes.retain(|c| c != class);
        if el.classes.len() != before {
            self.record_attribute(node, "class");
        }
    }

    /// Replaces all children of `node` with a single text node.
    ///
    /// An element holding exactly one text node keeps it and has its text rewritten
    /// in place.
    pub fn set_text_content(&mut self, node: NodeId, text: &str) {
        let Some(current) = self.node(node) else {
            return;
        };
        if let [only] = current.children.as_slice() {
            let only = *only;
            if let NodeKind::Text(existing) = &mut self.node_mut(only).kind {
                if existing == text {
                    return;
                }
                *existing = text.to_string();
                self.records.push(MutationRecord {
                    target: only,
                    kind: MutationKind::CharacterData,
                });
                return;
            }
        }
        let removed = std::mem::take(&mut self.node_mut(node).children);
        for child in &removed {
            self.node_mut(*child).parent = None;
        }
        let text_node = self.create_text(text);
        self.node_mut(text_node).parent = Some(node);
        self.node_mut(node).children.push(text_node);
        self.records.push(MutationRecord {
            target: node,
            kind: MutationKind::ChildList {
                added: vec![text_node],
                removed,
            },
        });
    }

    /// Concatenated text of `node` and all its descendants, without separators.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    pub fn element(&self, node: NodeId) -> Option<&ElementData> {
        match &self.node(node)?.kind {
            NodeKind::Element(el) => Some(el),
            NodeKind::Text(_) => None,
        }
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        self.element(node).is_some()
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|el| el.tag.as_str())
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)
            .and_then(|el| el.attrs.get(name))
            .map(String::as_str)
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.element(node)
            .is_some_and(|el| el.classes.iter().any(|c| c == class))
    }

    /// The `class` attribute as the host would serialize it.
    pub fn class_name(&self, node: NodeId) -> Option<String> {
        self.element(node).map(|el| el.classes.join(" "))
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.node(node).map_or(&[], |n| n.children.as_slice())
    }

    /// Descendants of `node` in document order, excluding `node` itself.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Whether `node` is `ancestor` or lies beneath it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.node(node).map(|_| node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.contains(self.root, node)
    }

    /// Every element in the document (root included) matching `matcher`, in document order.
    pub fn query_all(&self, matcher: &Matcher) -> Vec<NodeId> {
        let mut out = Vec::new();
        if matcher.matches(self, self.root) {
            out.push(self.root);
        }
        out.extend(self.query_within(self.root, matcher));
        out
    }

    pub fn query_first(&self, matcher: &Matcher) -> Option<NodeId> {
        self.query_all(matcher).into_iter().next()
    }

    /// Descendants of `scope` matching `matcher`, in document order.
    pub fn query_within(&self, scope: NodeId, matcher: &Matcher) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|n| matcher.matches(self, *n))
            .collect()
    }

    /// Drains the record queue. Nodes discarded before the previous drain are
    /// reclaimed first; nodes discarded since then stay readable for these records.
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        for node in std::mem::take(&mut self.retiring) {
            self.reclaim(node);
        }
        self.retiring = std::mem::take(&mut self.discarded);
        std::mem::take(&mut self.records)
    }

    pub fn pending_records(&self) -> usize {
        self.records.len()
    }

    /// Slots in the node arena, live or free.
    pub fn arena_size(&self) -> usize {
        self.nodes.len()
    }

    fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            discarded: Vec::new(),
            retiring: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            records: Vec::new(),
        }
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes
            .get(id.index)
            .filter(|n| n.generation == id.generation)
    }

    /// Only called with ids already checked by [`Self::node`].
    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index]
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.nodes[index];
            slot.kind = kind;
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.nodes.len();
        self.nodes.push(Node {
            generation: 0,
            parent: None,
            children: Vec::new(),
            kind,
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    /// Frees a discarded subtree unless the host has re-attached it.
    fn reclaim(&mut self, node: NodeId) {
        if self.node(node).is_none_or(|n| n.parent.is_some()) {
            return;
        }
        let mut subtree = self.descendants(node);
        subtree.push(node);
        for id in subtree {
            let slot = &mut self.nodes[id.index];
            slot.generation = slot.generation.wrapping_add(1);
            slot.parent = None;
            slot.children.clear();
            slot.kind = NodeKind::Text(String::new());
            self.free.push(id.index);
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Option<&mut ElementData> {
        self.node(node)?;
        match &mut self.node_mut(node).kind {
            NodeKind::Element(el) => Some(el),
            NodeKind::Text(_) => None,
        }
    }

    fn set_classes(&mut self, node: NodeId, classes: Vec<String>) {
        let Some(el) = self.element_mut(node) else {
            return;
        };
        if el.classes != classes {
            el.classes = classes;
            self.record_attribute(node, "class");
        }
    }

    fn record_attribute(&mut self, node: NodeId, name: &str) {
        self.records.push(MutationRecord {
            target: node,
            kind: MutationKind::Attributes {
                name: name.to_string(),
            },
        });
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let Some(n) = self.node(node) else {
            return;
        };
        match &n.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element(_) => {
                for child in &n.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    fn build(&mut self, snapshot: &SnapshotNode) -> NodeId {
        match snapshot {
            SnapshotNode::Text { text } => self.create_text(text),
            SnapshotNode::Element {
                tag,
                attrs,
                class,
                children,
            } => {
                let id = self.create_element(tag);
                for (name, value) in attrs {
                    self.set_attribute(id, name, value);
                }
                if !class.is_empty() {
                    self.set_attribute(id, "class", class);
                }
                for child in children {
                    let child_id = self.build(child);
                    self.append_child(id, child_id);
                }
                id
            }
        }
    }

    fn snapshot_of(&self, node: NodeId) -> SnapshotNode {
        match self.node(node).map(|n| &n.kind) {
            Some(NodeKind::Element(el)) => SnapshotNode::Element {
                tag: el.tag.clone(),
                attrs: el.attrs.clone(),
                class: el.classes.join(" "),
                children: self
                    .children(node)
                    .iter()
                    .map(|c| self.snapshot_of(*c))
                    .collect(),
            },
            Some(NodeKind::Text(text)) => SnapshotNode::Text { text: text.clone() },
            None => SnapshotNode::Text {
                text: String::new(),
            },
        }
    }
}
