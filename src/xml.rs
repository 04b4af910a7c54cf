//! Lossless XML tree for OOXML parts.
//!
//! Nodes live in an arena and refer to each other by index. Every node keeps
//! the exact source bytes it was parsed from, so serializing an unmodified
//! tree reproduces the input byte-for-byte. Only nodes that were edited or
//! created are re-rendered.

use quick_xml::escape::{escape, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::ops::Range;
use thiserror::Error;

/// Index of a node in the arena.
pub type NodeId = usize;

/// The synthetic document node that owns the prolog and the root element.
pub const ROOT: NodeId = 0;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("{0}")]
    Syntax(#[from] quick_xml::Error),

    #[error("invalid character reference in text at byte {0}")]
    BadText(usize),

    #[error("closing tag without matching opening tag at byte {0}")]
    UnexpectedEnd(usize),

    #[error("{0} element(s) left unclosed at end of input")]
    Unclosed(usize),
}

#[derive(Debug, Clone)]
enum Raw {
    Source(Range<usize>),
    Owned(String),
}

/// A start tag (or self-closing tag) with its parsed attributes.
#[derive(Debug, Clone)]
pub struct Element {
    /// Qualified name as written, e.g. `w:t`.
    pub name: String,
    /// Attributes as (qualified name, unescaped value).
    pub attributes: Vec<(String, String)>,
    start: Raw,
    /// `None` for a self-closing element.
    end: Option<Raw>,
}

impl Element {
    /// Name without namespace prefix.
    pub fn local_name(&self) -> &str {
        local(&self.name)
    }

    /// Namespace prefix, if any (`w` for `w:t`).
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(p, _)| p)
    }

    /// Attribute value by local name (`val` matches `w:val`).
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| local(k) == name)
            .map(|(_, v)| v.as_str())
    }

    fn render_start(&self, self_closing: bool) -> String {
        let mut tag = format!("<{}", self.name);
        for (key, value) in &self.attributes {
            tag.push_str(&format!(" {}=\"{}\"", key, escape(value)));
        }
        tag.push_str(if self_closing { "/>" } else { ">" });
        tag
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Element(Element),
    /// Character data; `text` is the unescaped value of `raw`.
    Text { raw: Raw, text: String },
    /// Anything copied through verbatim: declaration, comments, CDATA, PIs.
    Markup(Raw),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// An editable, losslessly serializable XML document.
#[derive(Debug, Clone)]
pub struct XmlTree {
    source: String,
    nodes: Vec<Node>,
}

fn local(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, l)| l)
}

fn parse_element(start: &BytesStart, raw: Range<usize>, self_closing: bool) -> Result<Element, XmlError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attributes.push((key, value));
    }
    Ok(Element {
        name,
        attributes,
        start: Raw::Source(raw),
        end: if self_closing { None } else { Some(Raw::Owned(String::new())) },
    })
}

impl XmlTree {
    /// Parse a complete XML document.
    pub fn parse(source: String) -> Result<Self, XmlError> {
        let mut nodes = vec![Node {
            parent: None,
            children: Vec::new(),
            kind: NodeKind::Markup(Raw::Owned(String::new())),
        }];

        {
            let mut reader = Reader::from_str(&source);
            reader.trim_text(false);
            reader.check_end_names(true);

            let mut stack: Vec<NodeId> = vec![ROOT];
            let mut pos = 0usize;

            loop {
                let event = reader.read_event()?;
                // the reader may already have consumed the `<` that ends a text node
                let end = match &event {
                    Event::Text(t) => pos + t.len(),
                    _ => reader.buffer_position(),
                };
                let span = pos..end;
                pos = end;

                let kind = match event {
                    Event::Eof => break,
                    Event::Start(ref e) => NodeKind::Element(parse_element(e, span.clone(), false)?),
                    Event::Empty(ref e) => NodeKind::Element(parse_element(e, span.clone(), true)?),
                    Event::End(_) => {
                        if stack.len() <= 1 {
                            return Err(XmlError::UnexpectedEnd(span.start));
                        }
                        let open = stack.pop().unwrap_or(ROOT);
                        if let NodeKind::Element(el) = &mut nodes[open].kind {
                            el.end = Some(Raw::Source(span));
                        }
                        continue;
                    }
                    Event::Text(_) => {
                        let text = unescape(&source[span.clone()])
                            .map_err(|_| XmlError::BadText(span.start))?
                            .into_owned();
                        NodeKind::Text {
                            raw: Raw::Source(span.clone()),
                            text,
                        }
                    }
                    _ => NodeKind::Markup(Raw::Source(span.clone())),
                };

                let parent = *stack.last().unwrap_or(&ROOT);
                let id = nodes.len();
                let opens = matches!(&kind, NodeKind::Element(el) if el.end.is_some());
                nodes.push(Node {
                    parent: Some(parent),
                    children: Vec::new(),
                    kind,
                });
                nodes[parent].children.push(id);
                if opens {
                    stack.push(id);
                }
            }

            if stack.len() > 1 {
                return Err(XmlError::Unclosed(stack.len() - 1));
            }
        }

        Ok(Self { source, nodes })
    }

    /// Render the tree back to text. Untouched nodes are emitted verbatim.
    pub fn serialize(&self) -> String {
        let mut out = String::with_capacity(self.source.len());
        for &child in &self.nodes[ROOT].children {
            self.write_node(child, &mut out);
        }
        out
    }

    fn raw<'a>(&'a self, raw: &'a Raw) -> &'a str {
        match raw {
            Raw::Source(range) => &self.source[range.clone()],
            Raw::Owned(s) => s,
        }
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let node = &self.nodes[id];
        match &node.kind {
            NodeKind::Element(el) => {
                out.push_str(self.raw(&el.start));
                for &child in &node.children {
                    self.write_node(child, out);
                }
                if let Some(end) = &el.end {
                    out.push_str(self.raw(end));
                }
            }
            NodeKind::Text { raw, .. } => out.push_str(self.raw(raw)),
            NodeKind::Markup(raw) => out.push_str(self.raw(raw)),
        }
    }

    // ─── Navigation ─────────────────────────────────────────────────────────

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id].kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Local name of an element node, `None` for text and markup.
    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(Element::local_name)
    }

    pub fn is(&self, id: NodeId, local_name: &str) -> bool {
        self.local_name(id) == Some(local_name)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    /// First child element with the given local name.
    pub fn child(&self, id: NodeId, local_name: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&c| self.is(c, local_name))
    }

    /// All attached elements with the given local name, in document order.
    pub fn find_all(&self, local_name: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[ROOT].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if self.is(id, local_name) {
                found.push(id);
            }
            stack.extend(self.nodes[id].children.iter().rev().copied());
        }
        found
    }

    /// Concatenated character data of a node and its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id].kind {
            NodeKind::Text { text, .. } => out.push_str(text),
            _ => {
                for &child in &self.nodes[id].children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    // ─── Editing ────────────────────────────────────────────────────────────

    /// Replace the content of an element with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        for child in std::mem::take(&mut self.nodes[id].children) {
            self.nodes[child].parent = None;
        }
        let text_id = self.push(NodeKind::Text {
            raw: Raw::Owned(escape(text).into_owned()),
            text: text.to_string(),
        });
        self.nodes[text_id].parent = Some(id);
        self.nodes[id].children.push(text_id);

        if let NodeKind::Element(el) = &mut self.nodes[id].kind {
            if el.end.is_none() {
                el.start = Raw::Owned(el.render_start(false));
                el.end = Some(Raw::Owned(format!("</{}>", el.name)));
            }
        }
    }

    /// Set (or add) an attribute, re-rendering the element's start tag.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeKind::Element(el) = &mut self.nodes[id].kind {
            if el.attribute(local(name)).is_some_and(|v| v == value) {
                return;
            }
            match el.attributes.iter_mut().find(|(k, _)| *k == name) {
                Some((_, v)) => *v = value.to_string(),
                None => el.attributes.push((name.to_string(), value.to_string())),
            }
            let self_closing = el.end.is_none();
            el.start = Raw::Owned(el.render_start(self_closing));
        }
    }

    /// Create a detached element, optionally holding text.
    pub fn create_element(&mut self, name: &str, attributes: &[(&str, &str)], text: Option<&str>) -> NodeId {
        let mut el = Element {
            name: name.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            start: Raw::Owned(String::new()),
            end: None,
        };
        el.start = Raw::Owned(el.render_start(true));
        let id = self.push(NodeKind::Element(el));
        if let Some(text) = text {
            self.set_text(id, text);
        }
        id
    }

    /// Attach a detached node directly after `anchor` under the same parent.
    pub fn insert_after(&mut self, anchor: NodeId, node: NodeId) {
        let Some(parent) = self.nodes[anchor].parent else {
            return;
        };
        self.detach(node);
        let siblings = &mut self.nodes[parent].children;
        let index = siblings
            .iter()
            .position(|&c| c == anchor)
            .map_or(siblings.len(), |i| i + 1);
        siblings.insert(index, node);
        self.nodes[node].parent = Some(parent);
    }

    /// Remove a node (and its subtree) from its parent.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent.take() {
            self.nodes[parent].children.retain(|&c| c != id);
        }
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        while let Some(parent) = self.nodes[current].parent {
            current = parent;
        }
        current == ROOT
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            kind,
        });
        self.nodes.len() - 1
    }
}
