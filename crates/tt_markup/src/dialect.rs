//! Node identity rules.
//!
//! Two nodes in a base and an incoming document are "the same node" when
//! their [`NodeKey`]s are equal. How the key is derived, and which nodes are
//! too ambiguous to be matched or inserted, depends on the file dialect.

use std::path::Path;

use crate::dom::Element;
use crate::locator::Segment;

/// Attributes that identify a stage node, in priority order.
pub const STAGE_IDENTITY_ATTRIBUTES: [&str; 5] = ["Key", "Name", "Id", "Object", "Type"];

/// Secondary attribute that scopes a stage identity.
pub const STAGE_GROUP_ATTRIBUTE: &str = "Group";

/// Structural key of a node: its tag plus the identifying attribute pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
}

impl NodeKey {
    /// Locator step that re-finds a node with this key.
    pub fn segment(&self) -> Segment {
        Segment {
            tag: self.tag.clone(),
            predicates: self.attributes.clone(),
        }
    }
}

/// Result of identifying one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub key: NodeKey,
    /// Non-unique nodes are matched for descent but never inserted or diffed.
    pub unique: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rules {
    Generic,
    Stage,
}

/// Identity rule plus non-unique predicate for one family of files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    rules: Rules,
}

impl Default for Dialect {
    fn default() -> Self {
        Self::generic()
    }
}

impl Dialect {
    /// Identity is the tag plus the first attribute in document order. Nodes
    /// without attributes, or whose first attribute name is capitalized, are
    /// non-unique.
    pub fn generic() -> Self {
        Self {
            rules: Rules::Generic,
        }
    }

    /// Identity for stage files: the first of [`STAGE_IDENTITY_ATTRIBUTES`]
    /// present plus [`STAGE_GROUP_ATTRIBUTE`]. Condition nodes, and actions
    /// without a `Key`, are skipped entirely.
    pub fn stage() -> Self {
        Self {
            rules: Rules::Stage,
        }
    }

    /// Pick the dialect from a file extension.
    pub fn for_path(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("stage") => Self::stage(),
            _ => Self::generic(),
        }
    }

    pub fn is_stage(&self) -> bool {
        self.rules == Rules::Stage
    }

    /// Identify a node, or `None` when the dialect skips it altogether.
    pub fn identify(&self, element: &Element) -> Option<Identity> {
        match self.rules {
            Rules::Generic => Some(generic_identity(element)),
            Rules::Stage => stage_identity(element),
        }
    }

    /// Locator step for a node already known to the merger.
    pub fn segment(&self, element: &Element) -> Segment {
        match self.identify(element) {
            Some(identity) => identity.key.segment(),
            None => Segment::new(element.name.clone()),
        }
    }
}

fn generic_identity(element: &Element) -> Identity {
    let attributes: Vec<(String, String)> = element
        .first_attribute()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .into_iter()
        .collect();

    let unique = attributes
        .first()
        .and_then(|(name, _)| name.chars().next())
        .is_some_and(|c| !c.is_uppercase());

    Identity {
        key: NodeKey {
            tag: element.name.clone(),
            attributes,
        },
        unique,
    }
}

fn is_condition(tag: &str) -> bool {
    tag.contains("Condition")
}

fn stage_identity(element: &Element) -> Option<Identity> {
    if is_condition(&element.name) {
        return None;
    }
    if element.name == "Action" && element.attribute("Key").is_none() {
        return None;
    }

    let mut attributes = Vec::with_capacity(2);
    if let Some((name, value)) = STAGE_IDENTITY_ATTRIBUTES
        .iter()
        .find_map(|name| element.attribute(name).map(|value| (*name, value)))
    {
        attributes.push((name.to_string(), value.to_string()));
    }
    let unique = !attributes.is_empty();
    if let Some(group) = element.attribute(STAGE_GROUP_ATTRIBUTE) {
        attributes.push((STAGE_GROUP_ATTRIBUTE.to_string(), group.to_string()));
    }

    Some(Identity {
        key: NodeKey {
            tag: element.name.clone(),
            attributes,
        },
        unique,
    })
}
