//! Structural locators: `tag[@name="value"]/child[@id='x']`.
//!
//! A locator is relative to the document root and addresses a node by the
//! identifying attributes of each ancestor instead of by position, so it
//! still resolves after unrelated siblings are added or reordered.

use std::fmt;

use crate::dom::Element;
use crate::error::{Error, Result};

/// One step of a locator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    pub tag: String,
    pub predicates: Vec<(String, String)>,
}

impl Segment {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            predicates: Vec::new(),
        }
    }

    pub fn with_predicate(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.predicates.push((name.into(), value.into()));
        self
    }

    pub fn matches(&self, element: &Element) -> bool {
        element.name == self.tag
            && self
                .predicates
                .iter()
                .all(|(name, value)| element.attribute(name) == Some(value.as_str()))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag)?;
        for (name, value) in &self.predicates {
            if value.contains(['"', '&']) && !value.contains('\'') {
                write!(f, "[@{}='{}']", name, value)?;
            } else {
                write!(f, "[@{}=\"{}\"]", name, escape_double_quoted(value))?;
            }
        }
        Ok(())
    }
}

fn escape_double_quoted(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

/// Single pass, so an escaped `&amp;quot;` stays a literal `&quot;`.
fn unescape_double_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(at) = rest.find('&') {
        out.push_str(&rest[..at]);
        rest = &rest[at..];
        if let Some(tail) = rest.strip_prefix("&quot;") {
            out.push('"');
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("&amp;") {
            out.push('&');
            rest = tail;
        } else {
            out.push('&');
            rest = &rest[1..];
        }
    }
    out.push_str(rest);
    out
}

/// A parsed locator. The empty locator addresses the root itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Locator {
    pub segments: Vec<Segment>,
}

impl Locator {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn parse(text: &str) -> Result<Self> {
        let invalid = |message: &str| Error::InvalidLocator {
            locator: text.to_string(),
            message: message.to_string(),
        };

        let mut rest = text.trim();
        let mut segments = Vec::new();
        if rest.is_empty() {
            return Ok(Self { segments });
        }

        loop {
            let tag_end = rest.find(['[', '/']).unwrap_or(rest.len());
            let tag = rest[..tag_end].trim();
            if tag.is_empty() {
                return Err(invalid("empty tag"));
            }
            let mut segment = Segment::new(tag);
            rest = &rest[tag_end..];

            while let Some(predicate) = rest.strip_prefix("[@") {
                let (name, after) = predicate
                    .split_once('=')
                    .ok_or_else(|| invalid("predicate without '='"))?;
                let quote = after
                    .chars()
                    .next()
                    .filter(|c| *c == '"' || *c == '\'')
                    .ok_or_else(|| invalid("unquoted predicate value"))?;
                let body = &after[1..];
                let close = body
                    .find(quote)
                    .ok_or_else(|| invalid("unterminated predicate value"))?;
                let value = &body[..close];
                let value = if quote == '"' {
                    unescape_double_quoted(value)
                } else {
                    value.to_string()
                };
                rest = body[close + 1..]
                    .strip_prefix(']')
                    .ok_or_else(|| invalid("expected ']'"))?;
                segment.predicates.push((name.trim().to_string(), value));
            }

            segments.push(segment);
            if rest.is_empty() {
                break;
            }
            rest = rest
                .strip_prefix('/')
                .ok_or_else(|| invalid("expected '/' between segments"))?;
        }

        Ok(Self { segments })
    }

    /// Raw child positions from `root` to the addressed element.
    pub fn resolve_path(&self, root: &Element) -> Option<Vec<usize>> {
        let mut path = Vec::with_capacity(self.segments.len());
        let mut current = root;
        for segment in &self.segments {
            let (index, next) = current
                .children
                .iter()
                .enumerate()
                .find_map(|(i, node)| match node {
                    crate::dom::Node::Element(e) if segment.matches(e) => Some((i, e)),
                    _ => None,
                })?;
            path.push(index);
            current = next;
        }
        Some(path)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl Element {
    /// Find the first element a locator addresses, relative to `self`.
    pub fn find(&self, locator: &Locator) -> Option<&Element> {
        let path = locator.resolve_path(self)?;
        self.descendant(&path)
    }

    pub fn find_mut(&mut self, locator: &Locator) -> Option<&mut Element> {
        let path = locator.resolve_path(self)?;
        self.descendant_mut(&path)
    }

    /// Parse `locator` and find the element it addresses.
    pub fn find_by_locator(&self, locator: &str) -> Result<&Element> {
        let parsed = Locator::parse(locator)?;
        self.find(&parsed)
            .ok_or_else(|| Error::LocatorNotFound(locator.to_string()))
    }

    pub fn find_by_locator_mut(&mut self, locator: &str) -> Result<&mut Element> {
        let parsed = Locator::parse(locator)?;
        self.find_mut(&parsed)
            .ok_or_else(|| Error::LocatorNotFound(locator.to_string()))
    }
}
