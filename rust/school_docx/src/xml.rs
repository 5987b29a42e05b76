//! Owned XML tree used for WordprocessingML surgery.
//!
//! All nodes live in one arena owned by [`XmlTree`]; callers hold [`NodeId`]
//! handles. Detached nodes stay in the arena but are unreachable from the
//! document root, so they never serialize.

use quick_xml::escape::{escape, partial_escape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
    Declaration(String),
    ProcessingInstruction(String),
    DocType(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct XmlTree {
    nodes: Vec<Node>,
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn element_from(start: &BytesStart<'_>) -> quick_xml::Result<Element> {
    let name = lossy(start.name().as_ref());
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        attributes.push((lossy(attr.key.as_ref()), attr.unescape_value()?.into_owned()));
    }
    Ok(Element { name, attributes })
}

impl Default for XmlTree {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn parse(xml: &str) -> quick_xml::Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut tree = XmlTree::new();
        let mut open = vec![tree.root()];

        loop {
            let parent = *open.last().unwrap_or(&NodeId(0));
            match reader.read_event()? {
                Event::Start(start) => {
                    let id = tree.alloc(NodeKind::Element(element_from(&start)?));
                    tree.append_child(parent, id);
                    open.push(id);
                }
                Event::Empty(start) => {
                    let id = tree.alloc(NodeKind::Element(element_from(&start)?));
                    tree.append_child(parent, id);
                }
                Event::End(_) => {
                    if open.len() > 1 {
                        open.pop();
                    }
                }
                Event::Text(text) => {
                    let id = tree.alloc(NodeKind::Text(text.unescape()?.into_owned()));
                    tree.append_child(parent, id);
                }
                Event::CData(data) => {
                    let id = tree.alloc(NodeKind::CData(lossy(&data.into_inner())));
                    tree.append_child(parent, id);
                }
                Event::Comment(text) => {
                    let id = tree.alloc(NodeKind::Comment(lossy(&text.into_inner())));
                    tree.append_child(parent, id);
                }
                Event::Decl(decl) => {
                    let mut raw = format!("xml version=\"{}\"", lossy(&decl.version()?));
                    if let Some(encoding) = decl.encoding() {
                        raw.push_str(&format!(" encoding=\"{}\"", lossy(&encoding?)));
                    }
                    if let Some(standalone) = decl.standalone() {
                        raw.push_str(&format!(" standalone=\"{}\"", lossy(&standalone?)));
                    }
                    let id = tree.alloc(NodeKind::Declaration(raw));
                    tree.append_child(parent, id);
                }
                Event::PI(text) => {
                    let id = tree.alloc(NodeKind::ProcessingInstruction(lossy(&text.into_inner())));
                    tree.append_child(parent, id);
                }
                Event::DocType(text) => {
                    let id = tree.alloc(NodeKind::DocType(lossy(&text.into_inner())));
                    tree.append_child(parent, id);
                }
                Event::Eof => break,
            }
        }

        Ok(tree)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
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

    pub fn name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(element) => Some(element.name.as_str()),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId, name: &str) -> bool {
        self.name(id) == Some(name)
    }

    /// Element children only, in order.
    pub fn child_elements(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&child| self.name(child).is_some())
            .collect()
    }

    pub fn first_child_named(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&child| self.is_element(child, name))
    }

    /// Pre-order descendants of `id`, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Every descendant element named `name`, in document order.
    pub fn elements_named(&self, id: NodeId, name: &str) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|&node| self.is_element(node, name))
            .collect()
    }

    pub fn attr(&self, id: NodeId, key: &str) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(element) => element
                .attributes
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn set_attr(&mut self, id: NodeId, key: &str, value: &str) {
        if let NodeKind::Element(element) = &mut self.nodes[id.0].kind {
            match element.attributes.iter_mut().find(|(k, _)| k == key) {
                Some((_, existing)) => *existing = value.to_string(),
                None => element.attributes.push((key.to_string(), value.to_string())),
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, key: &str) {
        if let NodeKind::Element(element) = &mut self.nodes[id.0].kind {
            element.attributes.retain(|(k, _)| k != key);
        }
    }

    /// Creates a detached element.
    pub fn create_element(&mut self, name: &str, attributes: &[(&str, &str)]) -> NodeId {
        self.alloc(NodeKind::Element(Element {
            name: name.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeKind::Text(text.to_string()))
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(0, child);
    }

    /// Inserts `node` as the sibling right before `reference`. A detached
    /// reference leaves `node` detached.
    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) {
        self.insert_sibling(reference, node, 0);
    }

    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) {
        self.insert_sibling(reference, node, 1);
    }

    fn insert_sibling(&mut self, reference: NodeId, node: NodeId, offset: usize) {
        self.detach(node);
        let Some(parent) = self.parent(reference) else {
            return;
        };
        let Some(position) = self.position_in_parent(reference) else {
            return;
        };
        self.nodes[node.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(position + offset, node);
    }

    /// Inserts `node` under `parent` before the first child named in
    /// `followers`, or at the end when none is present. Keeps schema-ordered
    /// sequences valid.
    pub fn insert_ordered(&mut self, parent: NodeId, node: NodeId, followers: &[&str]) {
        let next = self
            .children(parent)
            .iter()
            .copied()
            .find(|&child| self.name(child).is_some_and(|name| followers.contains(&name)));
        match next {
            Some(next) => self.insert_before(next, node),
            None => self.append_child(parent, node),
        }
    }

    fn position_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&child| child == id)
    }

    /// Unlinks `id` from its parent. The subtree stays intact.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&child| child != id);
        }
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current == self.root()
    }

    /// Deep copy of `id`'s subtree, returned detached.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let kind = self.nodes[id.0].kind.clone();
        let copy = self.alloc(kind);
        let children = self.children(id).to_vec();
        for child in children {
            let child_copy = self.clone_subtree(child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    /// Concatenated text of every text/CDATA node below `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let NodeKind::Text(text) | NodeKind::CData(text) = self.kind(id) {
            out.push_str(text);
        }
        for node in self.descendants(id) {
            if let NodeKind::Text(text) | NodeKind::CData(text) = self.kind(node) {
                out.push_str(text);
            }
        }
        out
    }

    /// Replaces all children of `id` with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        for child in self.children(id).to_vec() {
            self.detach(child);
        }
        if !text.is_empty() {
            let node = self.create_text(text);
            self.append_child(id, node);
        }
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        for &child in self.children(self.root()) {
            self.write_node(child, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            NodeKind::Document => {
                for &child in self.children(id) {
                    self.write_node(child, out);
                }
            }
            NodeKind::Element(element) => {
                out.push('<');
                out.push_str(&element.name);
                for (key, value) in &element.attributes {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    out.push_str(&escape(value));
                    out.push('"');
                }
                let children = self.children(id);
                if children.is_empty() {
                    out.push_str("/>");
                    return;
                }
                out.push('>');
                for &child in children {
                    self.write_node(child, out);
                }
                out.push_str("</");
                out.push_str(&element.name);
                out.push('>');
            }
            NodeKind::Text(text) => out.push_str(&partial_escape(text)),
            NodeKind::CData(text) => {
                out.push_str("<![CDATA[");
                out.push_str(text);
                out.push_str("]]>");
            }
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeKind::Declaration(raw) | NodeKind::ProcessingInstruction(raw) => {
                out.push_str("<?");
                out.push_str(raw);
                out.push_str("?>");
            }
            NodeKind::DocType(raw) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(raw);
                out.push('>');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="urn:w"><w:body><w:p><w:r><w:t xml:space="preserve">A &amp; B </w:t></w:r></w:p><w:p/></w:body></w:document>"#;

    #[test]
    fn parse_and_serialize_preserves_markup() {
        let tree = XmlTree::parse(SAMPLE).unwrap();
        assert_eq!(tree.to_xml(), SAMPLE);
    }

    #[test]
    fn text_is_unescaped_in_the_tree() {
        let tree = XmlTree::parse(SAMPLE).unwrap();
        let t = tree.elements_named(tree.root(), "w:t")[0];
        assert_eq!(tree.text_content(t), "A & B ");
        assert_eq!(tree.attr(t, "xml:space"), Some("preserve"));
    }

    #[test]
    fn elements_named_follows_document_order() {
        let tree = XmlTree::parse(SAMPLE).unwrap();
        let paragraphs = tree.elements_named(tree.root(), "w:p");
        assert_eq!(paragraphs.len(), 2);
        assert!(tree.children(paragraphs[1]).is_empty());
    }

    #[test]
    fn clone_insert_and_detach() {
        let mut tree = XmlTree::parse(SAMPLE).unwrap();
        let paragraphs = tree.elements_named(tree.root(), "w:p");
        let copy = tree.clone_subtree(paragraphs[0]);
        assert!(!tree.is_attached(copy));
        tree.insert_after(paragraphs[0], copy);
        tree.detach(paragraphs[1]);

        let body = tree.elements_named(tree.root(), "w:body")[0];
        assert_eq!(tree.children(body), &[paragraphs[0], copy]);
        assert!(!tree.is_attached(paragraphs[1]));
        assert_eq!(tree.text_content(copy), "A & B ");
    }

    #[test]
    fn set_text_and_attributes() {
        let mut tree = XmlTree::parse("<a><b x=\"1\">old</b></a>").unwrap();
        let b = tree.elements_named(tree.root(), "b")[0];
        tree.set_text(b, "<new>");
        tree.set_attr(b, "y", "\"2\"");
        tree.remove_attr(b, "x");
        assert_eq!(tree.to_xml(), "<a><b y=\"&quot;2&quot;\">&lt;new&gt;</b></a>");
    }
}
