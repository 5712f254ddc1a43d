//! A small arena DOM built by html5ever.

use html5ever::{
    Attribute, QualName,
    driver::ParseOpts,
    parse_document,
    tendril::{StrTendril, TendrilSink},
    tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink},
};
use std::{borrow::Cow, cell::RefCell, fmt::Write as _, rc::Rc};

/// Elements which never have an end tag.
static VOID_ELEMENTS: phf::Set<&'static str> = phf::phf_set! {
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta",
    "source", "track", "wbr",
};

/// Elements whose text content is serialised without escaping.
static RAW_TEXT_ELEMENTS: phf::Set<&'static str> = phf::phf_set! {
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext",
};

/// A node identifier.
pub(crate) type NodeId = usize;

/// The payload of a node.
#[derive(Debug)]
enum Content {
    Document,
    Element {
        name: Rc<QualName>,
        attrs: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
    Doctype,
}

#[derive(Debug)]
struct Item {
    content: Content,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An HTML document.
#[derive(Debug)]
pub(crate) struct Dom {
    nodes: Vec<Item>,
}

impl Dom {
    /// Parses an HTML fragment as the body of a document.
    pub fn parse_fragment(html: &str) -> Self {
        let html = format!("<!DOCTYPE html><html><head></head><body>{html}</body></html>");
        parse_document(Sink::default(), ParseOpts::default())
            .from_utf8()
            .one(html.as_bytes())
            .into_inner()
    }

    /// The document node.
    pub fn root(&self) -> NodeId {
        0
    }

    /// The `<body>` element, or the document node if there is none.
    pub fn body(&self) -> NodeId {
        self.descendants(self.root())
            .into_iter()
            .find(|id| self.name(*id) == Some("body"))
            .unwrap_or(self.root())
    }

    /// The children of a node.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    /// All descendants of a node, in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = self.nodes[id].children.iter().rev().copied().collect::<Vec<_>>();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.nodes[id].children.iter().rev().copied());
        }
        out
    }

    /// The local name of an element.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id].content {
            Content::Element { name, .. } => Some(&*name.local),
            _ => None,
        }
    }

    /// The attributes of an element.
    pub fn attrs(&self, id: NodeId) -> &[(String, String)] {
        match &self.nodes[id].content {
            Content::Element { attrs, .. } => attrs,
            _ => &[],
        }
    }

    /// The value of an attribute of an element.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attrs(id)
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// The content of a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id].content {
            Content::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The concatenated text of a node and its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.text(id) {
            return text.to_string();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|id| self.text(id))
            .collect()
    }

    /// Removes a node from its parent.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent.take() {
            self.nodes[parent].children.retain(|child| *child != id);
        }
    }

    /// Serialises a node, including its own tags.
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(&mut out, id, false);
        out
    }

    /// Serialises the children of a node.
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        let raw = self.name(id).is_some_and(|name| RAW_TEXT_ELEMENTS.contains(name));
        for child in self.children(id) {
            self.write_node(&mut out, *child, raw);
        }
        out
    }

    /// Serialises the start tag of an element.
    pub fn start_tag(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let Some(name) = self.name(id) {
            out.push('<');
            out.push_str(name);
            for (key, value) in self.attrs(id) {
                let _ = write!(
                    out,
                    " {key}=\"{}\"",
                    html_escape::encode_double_quoted_attribute(value)
                );
            }
            out.push('>');
        }
        out
    }

    fn write_node(&self, out: &mut String, id: NodeId, raw: bool) {
        match &self.nodes[id].content {
            Content::Document => {
                for child in self.children(id) {
                    self.write_node(out, *child, false);
                }
            }
            Content::Element { name, .. } => {
                out.push_str(&self.start_tag(id));
                if !VOID_ELEMENTS.contains(&*name.local) {
                    out.push_str(&self.inner_html(id));
                    let _ = write!(out, "</{}>", name.local);
                }
            }
            Content::Text(text) if raw => out.push_str(text),
            Content::Text(text) => out.push_str(&html_escape::encode_text(text)),
            Content::Comment(text) => {
                let _ = write!(out, "<!--{text}-->");
            }
            Content::Doctype => out.push_str("<!DOCTYPE html>"),
        }
    }

    fn push(&mut self, content: Content) -> NodeId {
        self.nodes.push(Item {
            content,
            parent: None,
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }

    fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
    }

    fn append_text(&mut self, parent: NodeId, text: &str) {
        if let Some(&last) = self.nodes[parent].children.last()
            && let Content::Text(existing) = &mut self.nodes[last].content
        {
            existing.push_str(text);
            return;
        }
        let id = self.push(Content::Text(text.to_string()));
        self.append(parent, id);
    }

    fn insert_before(&mut self, sibling: NodeId, child: NodeId) {
        self.detach(child);
        let Some(parent) = self.nodes[sibling].parent else {
            return;
        };
        let index = self.index_in_parent(parent, sibling);
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.insert(index, child);
    }

    fn insert_text_before(&mut self, sibling: NodeId, text: &str) {
        let Some(parent) = self.nodes[sibling].parent else {
            return;
        };
        let index = self.index_in_parent(parent, sibling);
        if index > 0 {
            let previous = self.nodes[parent].children[index - 1];
            if let Content::Text(existing) = &mut self.nodes[previous].content {
                existing.push_str(text);
                return;
            }
        }
        let id = self.push(Content::Text(text.to_string()));
        self.insert_before(sibling, id);
    }

    fn index_in_parent(&self, parent: NodeId, child: NodeId) -> usize {
        self.nodes[parent]
            .children
            .iter()
            .position(|id| *id == child)
            .unwrap_or(self.nodes[parent].children.len())
    }
}

impl Default for Dom {
    fn default() -> Self {
        let mut dom = Self { nodes: Vec::new() };
        dom.push(Content::Document);
        dom
    }
}

/// A reference to a node during tree construction. Element handles carry
/// their name so that the tree builder can inspect it without borrowing the
/// arena.
#[derive(Clone, Debug)]
struct Handle {
    id: NodeId,
    name: Option<Rc<QualName>>,
}

/// Builds a [`Dom`] from html5ever tree builder callbacks.
#[derive(Default)]
struct Sink {
    dom: RefCell<Dom>,
}

impl Sink {
    fn into_inner(self) -> Dom {
        self.dom.into_inner()
    }
}

impl TreeSink for Sink {
    type Handle = Handle;
    type Output = Self;
    type ElemName<'a>
        = &'a QualName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        self
    }

    fn parse_error(&self, msg: Cow<'static, str>) {
        log::trace!("html parse error: {msg}");
    }

    fn get_document(&self) -> Self::Handle {
        Handle { id: 0, name: None }
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        static EMPTY: QualName = QualName {
            prefix: None,
            ns: html5ever::ns!(),
            local: html5ever::local_name!(""),
        };
        target.name.as_deref().unwrap_or(&EMPTY)
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        let name = Rc::new(name);
        let attrs = attrs
            .into_iter()
            .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
            .collect();
        let id = self.dom.borrow_mut().push(Content::Element {
            name: Rc::clone(&name),
            attrs,
        });
        Handle {
            id,
            name: Some(name),
        }
    }

    fn create_comment(&self, text: StrTendril) -> Self::Handle {
        let id = self.dom.borrow_mut().push(Content::Comment(text.to_string()));
        Handle { id, name: None }
    }

    fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> Self::Handle {
        let id = self.dom.borrow_mut().push(Content::Comment(String::new()));
        Handle { id, name: None }
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        let mut dom = self.dom.borrow_mut();
        match child {
            NodeOrText::AppendNode(node) => dom.append(parent.id, node.id),
            NodeOrText::AppendText(text) => dom.append_text(parent.id, &text),
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        let has_parent = self.dom.borrow().nodes[element.id].parent.is_some();
        if has_parent {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        _name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
        let mut dom = self.dom.borrow_mut();
        let id = dom.push(Content::Doctype);
        dom.append(0, id);
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        target.clone()
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        x.id == y.id
    }

    fn set_quirks_mode(&self, _mode: QuirksMode) {}

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        let mut dom = self.dom.borrow_mut();
        match new_node {
            NodeOrText::AppendNode(node) => dom.insert_before(sibling.id, node.id),
            NodeOrText::AppendText(text) => dom.insert_text_before(sibling.id, &text),
        }
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Attribute>) {
        let mut dom = self.dom.borrow_mut();
        if let Content::Element {
            attrs: existing, ..
        } = &mut dom.nodes[target.id].content
        {
            for attr in attrs {
                let key = attr.name.local.to_string();
                if !existing.iter().any(|(name, _)| *name == key) {
                    existing.push((key, attr.value.to_string()));
                }
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        self.dom.borrow_mut().detach(target.id);
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let mut dom = self.dom.borrow_mut();
        let children = core::mem::take(&mut dom.nodes[node.id].children);
        for child in children {
            dom.nodes[child].parent = None;
            dom.append(new_parent.id, child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_round_trip() {
        let dom = Dom::parse_fragment(r#"<a href="/x?a=1&amp;b=2">A &lt; B</a><br>text"#);
        assert_eq!(
            dom.inner_html(dom.body()),
            r#"<a href="/x?a=1&amp;b=2">A &lt; B</a><br>text"#
        );
    }

    #[test]
    fn text_content_and_detach() {
        let mut dom = Dom::parse_fragment("<p>one <b>two</b><script>x()</script></p>");
        let script = dom
            .descendants(dom.root())
            .into_iter()
            .find(|id| dom.name(*id) == Some("script"))
            .unwrap();
        assert_eq!(dom.inner_html(script), "x()");
        dom.detach(script);
        let body = dom.body();
        assert_eq!(dom.text_content(body), "one two");
        assert_eq!(dom.inner_html(body), "<p>one <b>two</b></p>");
    }

    #[test]
    fn misnested_markup_is_repaired() {
        let dom = Dom::parse_fragment("<p>a<p>b</div>");
        assert_eq!(dom.inner_html(dom.body()), "<p>a</p><p>b</p>");
    }
}
