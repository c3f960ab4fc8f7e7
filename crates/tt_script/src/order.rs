//! Dependency-safe ordering of definitions.
//!
//! Lua executes a chunk top to bottom, so a definition that reads a name at
//! load time must come after whatever defines that name. The order is a Kahn
//! topological sort over three kinds of edges:
//!
//! 1. `function Obj.method` / `function Obj:method` after the definer of `Obj`
//! 2. `Obj.field = ...` after the definer of `Obj` (unless `Obj` is one of the
//!    assignment's own targets)
//! 3. any definition after the definers of identifiers its body mentions
//!
//! Only `local` declarations and `if _G['Obj'] ...` guards define names. Plain
//! global assignments never do, so globals that call each other stay in map
//! order instead of forming a cycle.
//!
//! Ready definitions are emitted in map order, so the result is deterministic.

use std::collections::VecDeque;
use std::sync::LazyLock;

use indexmap::{IndexMap, IndexSet};
use regex::Regex;

use crate::error::{Error, Result};
use crate::parse::Definitions;

static LOCAL_TARGETS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^local\s+(?:function\s+)?([ \t,\w]+)").expect("local targets pattern")
});

static GLOBAL_GUARD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^if\s+.+").expect("global guard pattern"));

static GUARDED_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"_G\[['"]([A-Za-z_]\w*)['"]\]"#).expect("guarded object pattern")
});

static METHOD_OWNER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^function\s+(\w+)(?:[.:]\w+)+").expect("method owner pattern"));

static FUNCTION_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^function\b").expect("function key pattern"));

static FIELD_OWNER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)(?:[.]\w+)+").expect("field owner pattern"));

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-zA-Z_]\w*\b").expect("identifier pattern"));

/// Edge list plus in-degree counts, keyed by definition key.
struct Graph<'a> {
    in_degree: IndexMap<&'a str, usize>,
    dependents: IndexMap<&'a str, IndexSet<&'a str>>,
}

impl<'a> Graph<'a> {
    fn new(definitions: &'a Definitions) -> Self {
        Self {
            in_degree: definitions.keys().map(|k| (k.as_str(), 0)).collect(),
            dependents: IndexMap::new(),
        }
    }

    /// Record that `dependent` must follow `definer`. Self edges and repeated
    /// edges are ignored.
    fn add_edge(&mut self, definer: &'a str, dependent: &'a str) {
        if definer == dependent {
            return;
        }
        if self.dependents.entry(definer).or_default().insert(dependent) {
            if let Some(degree) = self.in_degree.get_mut(dependent) {
                *degree += 1;
            }
        }
    }
}

/// Names a definition declares, and the index from each name back to the key
/// declaring it.
struct Declarations<'a> {
    definer: IndexMap<String, &'a str>,
    own_names: IndexMap<&'a str, IndexSet<String>>,
}

impl<'a> Declarations<'a> {
    fn collect(definitions: &'a Definitions) -> Self {
        let mut definer = IndexMap::new();
        let mut own_names: IndexMap<&'a str, IndexSet<String>> = IndexMap::new();

        for (key, body) in definitions {
            let key = key.as_str();

            if let Some(captures) = LOCAL_TARGETS.captures(key) {
                let names: IndexSet<String> = captures[1]
                    .split(',')
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .collect();
                for name in &names {
                    definer.insert(name.clone(), key);
                }
                own_names.insert(key, names);
            } else if GLOBAL_GUARD.is_match(key) {
                let names: IndexSet<String> = GUARDED_OBJECT
                    .captures_iter(body)
                    .map(|c| c[1].to_string())
                    .collect();
                if names.is_empty() {
                    continue;
                }
                for name in &names {
                    definer.insert(name.clone(), key);
                }
                own_names.insert(key, names);
            }
        }

        Self { definer, own_names }
    }

    fn definer_of(&self, name: &str) -> Option<&'a str> {
        self.definer.get(name).copied()
    }

    fn is_own(&self, key: &str, name: &str) -> bool {
        self.own_names
            .get(key)
            .is_some_and(|names| names.contains(name))
    }
}

fn add_key_edges<'a>(definitions: &'a Definitions, declarations: &Declarations<'a>, graph: &mut Graph<'a>) {
    for key in definitions.keys() {
        let key = key.as_str();
        if LOCAL_TARGETS.is_match(key) || GLOBAL_GUARD.is_match(key) {
            continue;
        }

        if let Some(captures) = METHOD_OWNER.captures(key) {
            match declarations.definer_of(&captures[1]) {
                Some(definer) => graph.add_edge(definer, key),
                None => tracing::debug!("'{}' has no local owner, treating as standalone", key),
            }
            continue;
        }

        if FUNCTION_KEY.is_match(key) {
            continue;
        }

        for target in key.split(',').map(str::trim) {
            let Some(captures) = FIELD_OWNER.captures(target) else {
                continue;
            };
            let owner = &captures[1];
            if declarations.is_own(key, owner) {
                continue;
            }
            if let Some(definer) = declarations.definer_of(owner) {
                graph.add_edge(definer, key);
            }
        }
    }
}

fn add_body_edges<'a>(definitions: &'a Definitions, declarations: &Declarations<'a>, graph: &mut Graph<'a>) {
    for (key, body) in definitions {
        let key = key.as_str();
        let referenced: IndexSet<&str> = IDENTIFIER.find_iter(body).map(|m| m.as_str()).collect();

        for name in referenced {
            if declarations.is_own(key, name) {
                continue;
            }
            if let Some(&definer) = declarations.definer.get(name) {
                graph.add_edge(definer, key);
            }
        }
    }
}

/// Order definition keys so every definer precedes its dependents.
///
/// Fails with [`Error::CyclicDependency`] naming every blocked key when the
/// graph has a cycle; no partial order is returned in that case.
pub fn resolve_order(definitions: &Definitions) -> Result<Vec<&str>> {
    let declarations = Declarations::collect(definitions);
    let mut graph = Graph::new(definitions);

    add_key_edges(definitions, &declarations, &mut graph);
    add_body_edges(definitions, &declarations, &mut graph);

    let mut ready: VecDeque<&str> = graph
        .in_degree
        .iter()
        .filter(|&(_, &degree)| degree == 0)
        .map(|(&key, _)| key)
        .collect();
    let mut sorted = Vec::with_capacity(definitions.len());

    while let Some(key) = ready.pop_front() {
        sorted.push(key);
        let Some(dependents) = graph.dependents.get(key) else {
            continue;
        };
        for &dependent in dependents {
            if let Some(degree) = graph.in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(dependent);
                }
            }
        }
    }

    if sorted.len() != definitions.len() {
        let mut keys: Vec<String> = graph
            .in_degree
            .iter()
            .filter(|&(_, &degree)| degree > 0)
            .map(|(&key, _)| key.to_string())
            .collect();
        keys.sort();
        return Err(Error::CyclicDependency { keys });
    }

    Ok(sorted)
}
