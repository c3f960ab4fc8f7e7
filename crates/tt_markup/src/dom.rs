//! A small owned element tree.
//!
//! Only what the game's data files use is modelled: elements, attributes,
//! text, CDATA and comments. Whitespace-only text is dropped on parse and
//! the writer re-indents with tabs.

use std::fmt::Write as _;
use std::path::Path;

use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};

/// Declaration written at the top of every document.
pub const DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

pub type Attributes = IndexMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Attributes,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// First attribute in document order.
    pub fn first_attribute(&self) -> Option<(&str, &str)> {
        self.attributes
            .first()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Child elements, skipping text and comments.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn has_elements(&self) -> bool {
        self.elements().next().is_some()
    }

    /// Child element at raw child position `index`.
    pub fn element_at(&self, index: usize) -> Option<&Element> {
        match self.children.get(index) {
            Some(Node::Element(e)) => Some(e),
            _ => None,
        }
    }

    pub fn element_at_mut(&mut self, index: usize) -> Option<&mut Element> {
        match self.children.get_mut(index) {
            Some(Node::Element(e)) => Some(e),
            _ => None,
        }
    }

    /// Follow a path of raw child positions from this element.
    pub fn descendant(&self, path: &[usize]) -> Option<&Element> {
        path.iter()
            .try_fold(self, |element, &index| element.element_at(index))
    }

    pub fn descendant_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        path.iter()
            .try_fold(self, |element, &index| element.element_at_mut(index))
    }

    /// Serialize this element without a declaration.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        write_element(&mut out, self, 0);
        out
    }
}

/// A parsed document: one root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub root: Element,
}

impl Document {
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut roots = parse_nodes(text)?;
        match roots.len() {
            0 => Err(Error::parse("document has no root element")),
            1 => Ok(Self {
                root: roots.remove(0),
            }),
            n => Err(Error::parse(format!("document has {} root elements", n))),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse(&text).map_err(|e| e.in_file(path))
    }

    /// Serialize with the declaration and tab indentation.
    pub fn to_markup(&self) -> String {
        let mut out = String::with_capacity(256);
        out.push_str(DECLARATION);
        out.push('\n');
        write_element(&mut out, &self.root, 0);
        out
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        std::fs::write(path, self.to_markup()).map_err(|e| Error::io(path, e))
    }
}

/// Parse one or more sibling elements.
pub fn parse_fragment(text: &str) -> Result<Vec<Element>> {
    parse_nodes(text)
}

/// Serialize sibling elements, one per line, without a declaration.
pub fn write_fragment<'a>(elements: impl IntoIterator<Item = &'a Element>) -> String {
    let mut out = String::new();
    for element in elements {
        write_element(&mut out, element, 0);
    }
    out
}

fn parse_nodes(text: &str) -> Result<Vec<Element>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut open: Vec<Element> = Vec::new();
    let mut top: Vec<Element> = Vec::new();

    loop {
        let event = reader.read_event().map_err(|e| {
            Error::parse(format!("{} at byte {}", e, reader.buffer_position()))
        })?;

        match event {
            Event::Start(start) => open.push(element_from(&start)?),
            Event::Empty(start) => {
                let element = element_from(&start)?;
                attach(&mut open, &mut top, element);
            }
            Event::End(_) => {
                let element = open
                    .pop()
                    .ok_or_else(|| Error::parse("unexpected closing tag"))?;
                attach(&mut open, &mut top, element);
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(Error::parse)?;
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                if let Some(parent) = open.last_mut() {
                    parent.children.push(Node::Text(text.to_string()));
                }
            }
            Event::CData(data) => {
                if let Some(parent) = open.last_mut() {
                    let data = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    parent.children.push(Node::CData(data));
                }
            }
            Event::Comment(comment) => {
                if let Some(parent) = open.last_mut() {
                    let comment = String::from_utf8_lossy(&comment).into_owned();
                    parent.children.push(Node::Comment(comment));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(unclosed) = open.last() {
        return Err(Error::parse(format!("unclosed element <{}>", unclosed.name)));
    }

    Ok(top)
}

fn element_from(start: &BytesStart) -> Result<Element> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());

    for attribute in start.attributes() {
        let attribute = attribute.map_err(Error::parse)?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value().map_err(Error::parse)?.into_owned();
        element.attributes.insert(key, value);
    }

    Ok(element)
}

fn attach(open: &mut [Element], top: &mut Vec<Element>, element: Element) {
    match open.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None => top.push(element),
    }
}

fn write_element(out: &mut String, element: &Element, depth: usize) {
    indent(out, depth);
    let _ = write!(out, "<{}", element.name);
    for (key, value) in &element.attributes {
        let _ = write!(out, " {}=\"{}\"", key, escape_attribute(value));
    }

    if element.children.is_empty() {
        out.push_str("/>\n");
        return;
    }

    // text-only elements stay on one line
    if let [Node::Text(text)] = element.children.as_slice() {
        let _ = writeln!(out, ">{}</{}>", escape_text(text), element.name);
        return;
    }

    out.push_str(">\n");
    for child in &element.children {
        match child {
            Node::Element(e) => write_element(out, e, depth + 1),
            Node::Text(text) => {
                indent(out, depth + 1);
                out.push_str(&escape_text(text));
                out.push('\n');
            }
            Node::CData(data) => {
                indent(out, depth + 1);
                let _ = writeln!(out, "<![CDATA[{}]]>", data);
            }
            Node::Comment(comment) => {
                indent(out, depth + 1);
                let _ = writeln!(out, "<!--{}-->", comment);
            }
        }
    }
    indent(out, depth);
    let _ = writeln!(out, "</{}>", element.name);
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push('\t');
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(s: &str) -> String {
    escape_text(s)
        .replace('"', "&quot;")
        .replace('\n', "&#10;")
        .replace('\t', "&#9;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_and_write() {
        let doc = Document::parse(
            "<?xml version=\"1.0\"?>\n<root a=\"1\">\n  <!-- note -->\n  <item id=\"x\" v=\"a &amp; b\"/>\n  <name>Hi</name>\n</root>\n",
        )
        .unwrap();

        assert_eq!(doc.root.name, "root");
        assert_eq!(doc.root.children.len(), 3);
        assert_eq!(doc.root.elements().count(), 2);
        assert_eq!(
            doc.to_markup(),
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<root a=\"1\">\n\t<!-- note -->\n\t<item id=\"x\" v=\"a &amp; b\"/>\n\t<name>Hi</name>\n</root>\n"
        );
    }

    #[test]
    fn test_reparse_is_stable() {
        let doc = Document::parse("<a><b k=\"1\"><c/></b>text</a>").unwrap();
        let again = Document::parse(&doc.to_markup()).unwrap();
        assert_eq!(doc, again);
    }

    #[test]
    fn test_fragment() {
        let nodes = parse_fragment("<a id=\"1\"/><b id=\"2\"><c/></b>").unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(write_fragment(&nodes), "<a id=\"1\"/>\n<b id=\"2\">\n\t<c/>\n</b>\n");
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(matches!(Document::parse("<a><b></a>"), Err(Error::Parse { .. })));
        assert!(matches!(Document::parse("<a>"), Err(Error::Parse { .. })));
        assert!(matches!(Document::parse(""), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_descendant_path() {
        let root = Element::new("r")
            .with_child(Element::new("a"))
            .with_child(Element::new("b").with_child(Element::new("c")));
        assert_eq!(root.descendant(&[1, 0]).map(|e| e.name.as_str()), Some("c"));
        assert!(root.descendant(&[0, 0]).is_none());
    }
}
