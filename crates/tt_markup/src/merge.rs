//! Lock-step merge of an incoming document into a base document.
//!
//! The walk keeps an explicit stack of `(base path, incoming element,
//! locator)` entries, so nesting depth never grows the call stack. For every
//! incoming child the base parent's children are looked up by [`NodeKey`]:
//!
//! - unmatched and unique: a new node, appended or recorded
//! - matched: descended into if the incoming node has children, then (if
//!   unique) its attributes are compared
//! - unmatched and non-unique: ignored

use std::collections::HashMap;

use crate::dialect::{Dialect, NodeKey};
use crate::dom::{Attributes, Element, Node};
use crate::error::{Error, Result};
use crate::locator::{Locator, Segment};

/// How a merge treats differences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Mutate the base document.
    Apply,
    /// Leave the base document untouched and record change records.
    Record,
}

/// One path-addressed change, replayable against a clean base document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeRecord {
    /// New children under the node at `parent`, in incoming order.
    NewChildren { parent: Locator, nodes: Vec<Element> },
    /// Attributes whose values differ on the node at `target`.
    Attributes { target: Locator, changed: Attributes },
}

impl ChangeRecord {
    pub fn locator(&self) -> &Locator {
        match self {
            ChangeRecord::NewChildren { parent, .. } => parent,
            ChangeRecord::Attributes { target, .. } => target,
        }
    }

    /// Replay this change against `root`.
    pub fn apply_to(&self, root: &mut Element) -> Result<()> {
        let target = root
            .find_mut(self.locator())
            .ok_or_else(|| Error::LocatorNotFound(self.locator().to_string()))?;

        match self {
            ChangeRecord::NewChildren { nodes, .. } => {
                target.children.extend(nodes.iter().cloned().map(Node::Element));
            }
            ChangeRecord::Attributes { changed, .. } => {
                for (name, value) in changed {
                    target.set_attribute(name.clone(), value.clone());
                }
            }
        }
        Ok(())
    }
}

/// Index a parent's element children by key. The first child with a given
/// key wins, matching what a locator resolves to.
fn index_children(parent: &Element, dialect: &Dialect) -> HashMap<NodeKey, usize> {
    let mut index = HashMap::new();
    for (position, node) in parent.children.iter().enumerate() {
        let Node::Element(child) = node else {
            continue;
        };
        if let Some(identity) = dialect.identify(child) {
            index.entry(identity.key).or_insert(position);
        }
    }
    index
}

/// Merge `incoming` into `base`, returning the recorded changes.
///
/// In [`MergeMode::Apply`] the returned list is empty and `base` is mutated.
pub fn merge(base: &mut Element, incoming: &Element, dialect: &Dialect, mode: MergeMode) -> Result<Vec<ChangeRecord>> {
    if base.name != incoming.name {
        return Err(Error::RootMismatch {
            base: base.name.clone(),
            incoming: incoming.name.clone(),
        });
    }

    let mut records: Vec<ChangeRecord> = Vec::new();
    let mut pending_new: HashMap<Locator, usize> = HashMap::new();
    let mut stack: Vec<(Vec<usize>, &Element, Vec<Segment>)> = vec![(Vec::new(), incoming, Vec::new())];

    while let Some((path, incoming_parent, segments)) = stack.pop() {
        let Some(base_parent) = base.descendant(&path) else {
            continue;
        };
        let index = index_children(base_parent, dialect);

        let mut appended: Vec<Element> = Vec::new();
        let mut updated: Vec<(usize, Attributes)> = Vec::new();

        for incoming_child in incoming_parent.elements() {
            let Some(identity) = dialect.identify(incoming_child) else {
                continue;
            };

            let Some(&position) = index.get(&identity.key) else {
                if !identity.unique {
                    continue;
                }
                match mode {
                    MergeMode::Apply => appended.push(incoming_child.clone()),
                    MergeMode::Record => {
                        let parent = Locator::new(segments.clone());
                        match pending_new.get(&parent) {
                            Some(&at) => {
                                if let ChangeRecord::NewChildren { nodes, .. } = &mut records[at] {
                                    nodes.push(incoming_child.clone());
                                }
                            }
                            None => {
                                pending_new.insert(parent.clone(), records.len());
                                records.push(ChangeRecord::NewChildren {
                                    parent,
                                    nodes: vec![incoming_child.clone()],
                                });
                            }
                        }
                    }
                }
                continue;
            };

            let Some(base_child) = base_parent.element_at(position) else {
                continue;
            };

            let mut child_segments = segments.clone();
            child_segments.push(dialect.segment(base_child));

            if incoming_child.has_elements() {
                let mut child_path = path.clone();
                child_path.push(position);
                stack.push((child_path, incoming_child, child_segments.clone()));
            }

            if !identity.unique || base_child.attributes == incoming_child.attributes {
                continue;
            }

            match mode {
                MergeMode::Apply => updated.push((position, incoming_child.attributes.clone())),
                MergeMode::Record => {
                    let changed: Attributes = incoming_child
                        .attributes
                        .iter()
                        .filter(|(name, value)| base_child.attribute(name) != Some(value.as_str()))
                        .map(|(name, value)| (name.clone(), value.clone()))
                        .collect();
                    if !changed.is_empty() {
                        records.push(ChangeRecord::Attributes {
                            target: Locator::new(child_segments),
                            changed,
                        });
                    }
                }
            }
        }

        if appended.is_empty() && updated.is_empty() {
            continue;
        }

        let Some(base_parent) = base.descendant_mut(&path) else {
            continue;
        };
        for (position, attributes) in updated {
            if let Some(child) = base_parent.element_at_mut(position) {
                child.attributes.extend(attributes);
            }
        }
        base_parent
            .children
            .extend(appended.into_iter().map(Node::Element));
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use pretty_assertions::assert_eq;

    fn doc(text: &str) -> Element {
        Document::parse(text).unwrap().root
    }

    #[test]
    fn test_apply_appends_and_updates() {
        let mut base = doc(r#"<root><item id="1" v="a"/><list name="l"><e id="x"/></list></root>"#);
        let incoming = doc(r#"<root><item id="1" v="b"/><item id="2"/><list name="l"><e id="y"/></list></root>"#);

        let records = merge(&mut base, &incoming, &Dialect::generic(), MergeMode::Apply).unwrap();
        assert!(records.is_empty());
        assert_eq!(
            base,
            doc(r#"<root><item id="1" v="b"/><list name="l"><e id="x"/><e id="y"/></list><item id="2"/></root>"#)
        );
    }

    #[test]
    fn test_record_coalesces_new_children() {
        let mut base = doc(r#"<root><item id="1" v="a"/></root>"#);
        let before = base.clone();
        let incoming = doc(r#"<root><item id="1" v="b" w="c"/><item id="2"/><item id="3"/></root>"#);

        let records = merge(&mut base, &incoming, &Dialect::generic(), MergeMode::Record).unwrap();
        assert_eq!(base, before);
        assert_eq!(
            records,
            vec![
                ChangeRecord::Attributes {
                    target: Locator::parse(r#"item[@id="1"]"#).unwrap(),
                    changed: [("v".to_string(), "b".to_string()), ("w".to_string(), "c".to_string())]
                        .into_iter()
                        .collect(),
                },
                ChangeRecord::NewChildren {
                    parent: Locator::default(),
                    nodes: vec![
                        Element::new("item").with_attribute("id", "2"),
                        Element::new("item").with_attribute("id", "3"),
                    ],
                },
            ]
        );
    }

    #[test]
    fn test_record_is_deterministic() {
        let base = doc(r#"<root><a id="1"><b k="1"/></a></root>"#);
        let incoming = doc(r#"<root><a id="1" x="2"><b k="2"/><b k="1" y="3"/></a><c id="9"/></root>"#);

        let first = merge(&mut base.clone(), &incoming, &Dialect::generic(), MergeMode::Record).unwrap();
        let second = merge(&mut base.clone(), &incoming, &Dialect::generic(), MergeMode::Record).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_replay_matches_direct_apply() {
        let base = doc(r#"<root><a id="1"><b k="1"/></a><Rows><r id="1"/></Rows></root>"#);
        let incoming = doc(
            r#"<root><a id="1"><b k="1"/><b k="2"><c id="z"/></b></a><Rows><r id="2"/></Rows><d id="4"/></root>"#,
        );

        let mut direct = base.clone();
        merge(&mut direct, &incoming, &Dialect::generic(), MergeMode::Apply).unwrap();

        let mut replayed = base.clone();
        let records = merge(&mut replayed.clone(), &incoming, &Dialect::generic(), MergeMode::Record).unwrap();
        for record in &records {
            record.apply_to(&mut replayed).unwrap();
        }

        assert_eq!(replayed, direct);
    }

    #[test]
    fn test_non_unique_nodes_are_never_duplicated_or_diffed() {
        let mut base = doc(r#"<root><Row Name="a" v="1"/><Row Name="b"/></root>"#);
        let incoming = doc(r#"<root><Row Name="a" v="2"/><Row Name="c"/><Row Name="c"/><Plain/></root>"#);

        let records = merge(&mut base.clone(), &incoming, &Dialect::generic(), MergeMode::Record).unwrap();
        assert!(records.is_empty());

        let before = base.clone();
        merge(&mut base, &incoming, &Dialect::generic(), MergeMode::Apply).unwrap();
        assert_eq!(base, before);
    }

    #[test]
    fn test_root_mismatch() {
        let mut base = doc("<a/>");
        let err = merge(&mut base, &doc("<b/>"), &Dialect::generic(), MergeMode::Apply).unwrap_err();
        assert!(matches!(err, Error::RootMismatch { .. }));
    }

    #[test]
    fn test_stage_dialect_matches_by_key() {
        let mut base = doc(r#"<Stage><Object Type="Npc" Name="A" Hp="1"/><Condition Type="x"/></Stage>"#);
        let incoming = doc(
            r#"<Stage><Object Type="Npc" Name="A" Hp="2"/><Object Type="Npc" Name="B"/><Condition Type="y"/></Stage>"#,
        );

        merge(&mut base, &incoming, &Dialect::stage(), MergeMode::Apply).unwrap();
        assert_eq!(
            base,
            doc(r#"<Stage><Object Type="Npc" Name="A" Hp="2"/><Condition Type="x"/><Object Type="Npc" Name="B"/></Stage>"#)
        );
    }

    #[test]
    fn test_stage_nodes_without_identity_are_never_added_or_diffed() {
        let base = doc(r#"<Stage><Object Foo="x" Hp="1"/><Mission><Object Key="a"/></Mission></Stage>"#);
        let incoming = doc(
            r#"<Stage><Object Foo="y" Hp="2"/><Trigger Hp="3"/><Mission><Object Key="a" Hp="5"/><Object Key="b"/></Mission></Stage>"#,
        );

        let mut recorded = base.clone();
        let records = merge(&mut recorded, &incoming, &Dialect::stage(), MergeMode::Record).unwrap();
        assert_eq!(recorded, base);
        assert_eq!(
            records,
            vec![
                ChangeRecord::Attributes {
                    target: Locator::parse(r#"Mission/Object[@Key="a"]"#).unwrap(),
                    changed: [("Hp".to_string(), "5".to_string())].into_iter().collect(),
                },
                ChangeRecord::NewChildren {
                    parent: Locator::parse("Mission").unwrap(),
                    nodes: vec![Element::new("Object").with_attribute("Key", "b")],
                },
            ]
        );

        let mut direct = base.clone();
        merge(&mut direct, &incoming, &Dialect::stage(), MergeMode::Apply).unwrap();
        assert_eq!(
            direct,
            doc(r#"<Stage><Object Foo="x" Hp="1"/><Mission><Object Key="a" Hp="5"/><Object Key="b"/></Mission></Stage>"#)
        );

        let mut replayed = base.clone();
        for record in &records {
            record.apply_to(&mut replayed).unwrap();
        }
        assert_eq!(replayed, direct);
    }

    #[test]
    fn test_comments_are_not_indexed() {
        let mut base = doc(r#"<root><!-- c --><item id="1"/></root>"#);
        let incoming = doc(r#"<root><item id="1" v="2"/></root>"#);
        merge(&mut base, &incoming, &Dialect::generic(), MergeMode::Apply).unwrap();
        assert_eq!(base.find_by_locator(r#"item[@id="1"]"#).unwrap().attribute("v"), Some("2"));
    }
}
