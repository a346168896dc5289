//! A minimal document tree standing in for the browser DOM.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Every insertion
//! into the connected tree is reported to observers as a [`MutationRecord`],
//! the same way a `MutationObserver` watching `body` with `subtree: true`
//! would see it.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

pub mod markup;

pub type SharedDocument = Arc<Mutex<Document>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// The top of the tree; never serialized itself.
    Root,
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// One `childList` change: `added` were appended under `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added: Vec<NodeId>,
}

const BLOCK_TAGS: [&str; 16] = [
    "address", "article", "br", "dd", "div", "dl", "dt", "footer", "h1", "h2", "h3", "header",
    "li", "p", "section", "tr",
];

/// Elements whose text is not visible or not markup.
pub(crate) const RAW_TEXT_TAGS: [&str; 2] = ["script", "style"];

#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    observers: Vec<mpsc::UnboundedSender<MutationRecord>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty page: a root holding a single `body` element.
    pub fn new() -> Self {
        let mut doc = Self::empty();
        let body = doc.create_element("body");
        doc.append_child(doc.root, body);
        doc
    }

    /// A bare root with no `body`; used by the markup parser.
    pub fn empty() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
            root: NodeId(0),
            observers: Vec::new(),
        }
    }

    pub fn into_shared(self) -> SharedDocument {
        Arc::new(Mutex::new(self))
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The first `body` element, or the root when the page has none.
    pub fn body(&self) -> NodeId {
        self.descendants(self.root)
            .into_iter()
            .find(|&id| self.tag(id) == Some("body"))
            .unwrap_or(self.root)
    }

    /// Starts a new mutation feed. The feed ends on [`disconnect`](Self::disconnect)
    /// or when the document is dropped.
    pub fn observe(&mut self) -> mpsc::UnboundedReceiver<MutationRecord> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.push(tx);
        rx
    }

    /// Ends every mutation feed, as when the page goes away.
    pub fn disconnect(&mut self) {
        self.observers.clear();
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Moves `child` to the end of `parent`'s children. Appending a node into
    /// its own subtree is ignored. Observers are notified when `parent` is
    /// connected to the root.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if child == self.root || self.is_inclusive_ancestor(child, parent) {
            tracing::debug!("Ignoring append of {child:?} into its own subtree");
            return;
        }

        if let Some(old) = self.nodes[child.0].parent.take() {
            self.nodes[old.0].children.retain(|&c| c != child);
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);

        if self.is_connected(parent) {
            self.notify(MutationRecord {
                target: parent,
                added: vec![child],
            });
        }
    }

    /// Creates an element with the given classes and text and appends it.
    pub fn append_element(
        &mut self,
        parent: NodeId,
        tag: &str,
        classes: &[&str],
        text: Option<&str>,
    ) -> NodeId {
        let el = self.create_element(tag);
        for class in classes {
            self.add_class(el, class);
        }
        if let Some(text) = text {
            let t = self.create_text(text);
            self.append_child(el, t);
        }
        self.append_child(parent, el);
        el
    }

    fn notify(&mut self, record: MutationRecord) {
        self.observers.retain(|tx| tx.send(record.clone()).is_ok());
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            cur = self.nodes[id.0].parent;
        }
        false
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        self.is_inclusive_ancestor(self.root, id)
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// Sets or replaces an attribute. No-op on non-elements.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[id.0].kind {
            match attrs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
                Some((_, v)) => *v = value.to_string(),
                None => attrs.push((name.to_ascii_lowercase(), value.to_string())),
            }
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attribute(id, "class")
            .is_some_and(|list| list.split_ascii_whitespace().any(|c| c == class))
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if self.has_class(id, class) {
            return;
        }
        let list = match self.attribute(id, "class") {
            Some(existing) if !existing.trim().is_empty() => {
                format!("{} {}", existing.trim(), class)
            }
            _ => class.to_string(),
        };
        self.set_attribute(id, "class", &list);
    }

    /// Writes inline style declarations, e.g. `[("display", "block")]`.
    pub fn set_style(&mut self, id: NodeId, declarations: &[(&str, &str)]) {
        let style = declarations
            .iter()
            .map(|(prop, value)| format!("{prop}: {value}"))
            .collect::<Vec<_>>()
            .join("; ");
        self.set_attribute(id, "style", &style);
    }

    /// All nodes under `id` in document order, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[id.0].children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.nodes[next.0].children.iter().rev());
        }
        out
    }

    /// Elements under `root` carrying `class`, in document order.
    pub fn query_class(&self, root: NodeId, class: &str) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|&id| self.has_class(id, class))
            .collect()
    }

    /// Whether `id` itself or anything beneath it carries `class`.
    pub fn contains_class(&self, id: NodeId, class: &str) -> bool {
        self.has_class(id, class) || self.descendants(id).iter().any(|&d| self.has_class(d, class))
    }

    /// Visible text under `id` with whitespace collapsed. Block elements
    /// break words apart; script and style content is skipped.
    pub fn inner_text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        normalize_ws(&out)
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element { tag, .. } if RAW_TEXT_TAGS.contains(&tag.as_str()) => {}
            kind => {
                let block = matches!(
                    kind,
                    NodeKind::Element { tag, .. } if BLOCK_TAGS.contains(&tag.as_str())
                );
                if block {
                    out.push(' ');
                }
                for &child in &self.nodes[id.0].children {
                    self.collect_text(child, out);
                }
                if block {
                    out.push(' ');
                }
            }
        }
    }

    /// Serializes everything under the root back to HTML.
    pub fn to_html(&self) -> String {
        markup::serialize(self)
    }
}

/// Collapses runs of whitespace (including no-break spaces) to one space.
pub fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_class_is_in_document_order() {
        let mut doc = Document::new();
        let body = doc.body();
        let list = doc.append_element(body, "ul", &[], None);
        let first = doc.append_element(list, "li", &["price"], Some("1"));
        let other = doc.append_element(list, "li", &["title"], Some("x"));
        let nested = doc.append_element(other, "span", &["price"], Some("2"));
        let last = doc.append_element(body, "div", &["price", "big"], Some("3"));

        assert_eq!(doc.query_class(body, "price"), vec![first, nested, last]);
        assert!(doc.contains_class(list, "price"));
        assert!(!doc.contains_class(first, "title"));
    }

    #[test]
    fn class_list_matches_whole_names() {
        let mut doc = Document::new();
        let el = doc.create_element("div");
        doc.set_attribute(el, "class", "classified-price-container-wrapper  x");
        assert!(!doc.has_class(el, "classified-price-container"));
        doc.add_class(el, "classified-price-container");
        assert!(doc.has_class(el, "classified-price-container"));
        assert_eq!(
            doc.attribute(el, "class"),
            Some("classified-price-container-wrapper  x classified-price-container")
        );
    }

    #[test]
    fn inner_text_collapses_whitespace_and_skips_scripts() {
        let mut doc = Document::new();
        let body = doc.body();
        let container = doc.append_element(body, "div", &[], Some("  1.250,50\n"));
        doc.append_element(container, "span", &[], Some("TL "));
        doc.append_element(container, "script", &[], Some("var x = 1;"));
        assert_eq!(doc.inner_text(container), "1.250,50 TL");
    }

    #[test]
    fn connected_appends_are_observed() {
        let mut doc = Document::new();
        let mut feed = doc.observe();
        let body = doc.body();

        let detached = doc.create_element("div");
        let inner = doc.create_element("span");
        doc.append_child(detached, inner);
        assert!(feed.try_recv().is_err());

        doc.append_child(body, detached);
        assert_eq!(
            feed.try_recv().unwrap(),
            MutationRecord {
                target: body,
                added: vec![detached],
            }
        );
    }

    #[test]
    fn append_moves_node_and_rejects_cycles() {
        let mut doc = Document::new();
        let body = doc.body();
        let a = doc.append_element(body, "div", &[], None);
        let b = doc.append_element(a, "div", &[], None);

        doc.append_child(b, a);
        assert_eq!(doc.parent(a), Some(body));

        doc.append_child(body, b);
        assert_eq!(doc.parent(b), Some(body));
        assert!(doc.children(a).is_empty());
    }

    #[test]
    fn style_declarations_are_joined() {
        let mut doc = Document::new();
        let el = doc.create_element("span");
        doc.set_style(el, &[("display", "block"), ("color", "#007bff")]);
        assert_eq!(doc.attribute(el, "style"), Some("display: block; color: #007bff"));
    }
}
