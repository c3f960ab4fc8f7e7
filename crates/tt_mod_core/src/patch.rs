//! Patch scripts: replayable edits stored as TOML (`*.tpatch`).
//!
//! A patch script is an ordered list of operations, each naming its target
//! file by logical path:
//!
//! ```toml
//! [[op]]
//! kind = "replace_definition"
//! file = "script/battle.lua"
//! key = "function CalcDamage(a, b)"
//! code = """
//! function CalcDamage(a, b)
//!     return a * 2 - b
//! end"""
//!
//! [[op]]
//! kind = "set_attributes"
//! file = "xml/Item.xml"
//! locator = 'item[@id="sword"]'
//!
//! [op.attributes]
//! Price = "120"
//! ```
//!
//! Script operations take their code either inline (`code`) or from a file
//! (`from_file`, resolved under the mod's `lua/` directory with `.lua`
//! appended when missing).

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tt_markup::{parse_fragment, write_fragment, ChangeRecord, Node};
use tt_script::{ChangeKind, DefinitionChange, InsertPosition};

use crate::error::{Error, Result};
use crate::files::GameFiles;

/// Extension of patch script files.
pub const PATCH_EXTENSION: &str = "tpatch";

/// Name of the patch script that replaces per-file merging for a whole mod.
pub const MAIN_PATCH: &str = "main.tpatch";

/// Where inserted code goes relative to the marker line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Before,
    #[default]
    After,
}

impl From<Position> for InsertPosition {
    fn from(position: Position) -> Self {
        match position {
            Position::Before => InsertPosition::Before,
            Position::After => InsertPosition::After,
        }
    }
}

fn is_default_position(position: &Position) -> bool {
    *position == Position::After
}

/// One edit against one game file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PatchOp {
    AddDefinition {
        file: String,
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_file: Option<String>,
    },
    ReplaceDefinition {
        file: String,
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_file: Option<String>,
    },
    /// Replace literal text `old` inside a definition with `code`.
    ReplaceCode {
        file: String,
        key: String,
        old: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_file: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        count: Option<usize>,
    },
    InsertCode {
        file: String,
        key: String,
        marker: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_file: Option<String>,
        #[serde(default, skip_serializing_if = "is_default_position")]
        position: Position,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        count: Option<usize>,
    },
    /// Append serialized elements under the node at `locator`.
    AppendNodes {
        file: String,
        #[serde(default)]
        locator: String,
        markup: String,
    },
    SetAttributes {
        file: String,
        #[serde(default)]
        locator: String,
        attributes: IndexMap<String, String>,
    },
    SetDictionaryLine {
        file: String,
        line: String,
    },
}

impl PatchOp {
    /// Logical path of the file this operation edits.
    pub fn file(&self) -> &str {
        match self {
            PatchOp::AddDefinition { file, .. }
            | PatchOp::ReplaceDefinition { file, .. }
            | PatchOp::ReplaceCode { file, .. }
            | PatchOp::InsertCode { file, .. }
            | PatchOp::AppendNodes { file, .. }
            | PatchOp::SetAttributes { file, .. }
            | PatchOp::SetDictionaryLine { file, .. } => file,
        }
    }
}

/// A program that edits game files through [`GameFiles`].
pub trait PatchProgram {
    fn run(&self, files: &mut dyn GameFiles) -> Result<()>;
}

/// An ordered list of [`PatchOp`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchScript {
    #[serde(rename = "op", default)]
    pub ops: Vec<PatchOp>,
    #[serde(skip)]
    code_dir: Option<PathBuf>,
}

impl PatchScript {
    pub fn new(ops: Vec<PatchOp>) -> Self {
        Self { ops, code_dir: None }
    }

    /// Read a patch script. `from_file` code resolves under `lua/` next to it
    /// unless [`with_code_dir`](Self::with_code_dir) says otherwise.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let mut script: Self = toml::from_str(&text).map_err(|source| Error::PatchParse {
            path: path.to_string_lossy().into_owned().into(),
            source,
        })?;
        script.code_dir = path.parent().map(|dir| dir.join("lua"));
        Ok(script)
    }

    pub fn with_code_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.code_dir = Some(dir.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Operations that replay recorded script changes against `file`.
    pub fn from_script_changes(file: &str, changes: Vec<DefinitionChange>) -> Self {
        let ops = changes
            .into_iter()
            .map(|change| match change.kind {
                ChangeKind::New => PatchOp::AddDefinition {
                    file: file.to_string(),
                    key: change.key,
                    code: Some(change.code),
                    from_file: None,
                },
                ChangeKind::Update => PatchOp::ReplaceDefinition {
                    file: file.to_string(),
                    key: change.key,
                    code: Some(change.code),
                    from_file: None,
                },
            })
            .collect();
        Self::new(ops)
    }

    /// Operations that replay recorded markup changes against `file`.
    pub fn from_markup_changes(file: &str, records: Vec<ChangeRecord>) -> Self {
        let ops = records
            .into_iter()
            .map(|record| match record {
                ChangeRecord::NewChildren { parent, nodes } => PatchOp::AppendNodes {
                    file: file.to_string(),
                    locator: parent.to_string(),
                    markup: write_fragment(&nodes),
                },
                ChangeRecord::Attributes { target, changed } => PatchOp::SetAttributes {
                    file: file.to_string(),
                    locator: target.to_string(),
                    attributes: changed,
                },
            })
            .collect();
        Self::new(ops)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    /// Write the script unless `path` already holds the same text.
    ///
    /// Returns whether it wrote.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        let text = self.to_toml()?;
        if std::fs::read_to_string(path).is_ok_and(|existing| existing == text) {
            return Ok(false);
        }
        std::fs::write(path, text).map_err(|e| Error::io(path, e))?;
        Ok(true)
    }

    fn code(&self, key: &str, code: &Option<String>, from_file: &Option<String>) -> Result<String> {
        match (code, from_file) {
            (Some(code), None) => Ok(code.clone()),
            (None, Some(name)) => {
                let name = if name.ends_with(".lua") {
                    name.clone()
                } else {
                    format!("{}.lua", name)
                };
                let path = match &self.code_dir {
                    Some(dir) => dir.join(name),
                    None => PathBuf::from(name),
                };
                std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))
            }
            _ => Err(Error::CodeSource { key: key.to_string() }),
        }
    }

    fn apply(&self, op: &PatchOp, files: &mut dyn GameFiles) -> Result<()> {
        match op {
            PatchOp::AddDefinition {
                file,
                key,
                code,
                from_file,
            } => {
                let code = self.code(key, code, from_file)?;
                files.script(file)?.add_definition(key, &code);
            }
            PatchOp::ReplaceDefinition {
                file,
                key,
                code,
                from_file,
            } => {
                let code = self.code(key, code, from_file)?;
                files.script(file)?.replace_definition(key, &code);
            }
            PatchOp::ReplaceCode {
                file,
                key,
                old,
                code,
                from_file,
                count,
            } => {
                let code = self.code(key, code, from_file)?;
                files.script(file)?.replace_code(key, old, &code, *count)?;
            }
            PatchOp::InsertCode {
                file,
                key,
                marker,
                code,
                from_file,
                position,
                count,
            } => {
                let code = self.code(key, code, from_file)?;
                files
                    .script(file)?
                    .insert_code(key, marker, &code, (*position).into(), *count)?;
            }
            PatchOp::AppendNodes { file, locator, markup } => {
                let nodes = parse_fragment(markup)?;
                let target = files.markup(file)?.root_mut().find_by_locator_mut(locator)?;
                target.children.extend(nodes.into_iter().map(Node::Element));
            }
            PatchOp::SetAttributes {
                file,
                locator,
                attributes,
            } => {
                let target = files.markup(file)?.root_mut().find_by_locator_mut(locator)?;
                for (name, value) in attributes {
                    target.set_attribute(name.clone(), value.clone());
                }
            }
            PatchOp::SetDictionaryLine { file, line } => {
                files.dictionary(file)?.set_line(line)?;
            }
        }
        Ok(())
    }
}

impl PatchProgram for PatchScript {
    /// Apply every operation in order, stopping at the first failure.
    fn run(&self, files: &mut dyn GameFiles) -> Result<()> {
        for op in &self.ops {
            self.apply(op, files)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::DictionaryFile;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tt_markup::{Document, MarkupFile, MergeMode};
    use tt_script::ScriptFile;

    #[derive(Default)]
    struct MemoryFiles {
        scripts: HashMap<String, ScriptFile>,
        markups: HashMap<String, MarkupFile>,
        dictionaries: HashMap<String, DictionaryFile>,
    }

    impl GameFiles for MemoryFiles {
        fn script(&mut self, path: &str) -> Result<&mut ScriptFile> {
            Ok(self
                .scripts
                .entry(path.to_string())
                .or_insert_with(|| ScriptFile::from_source(path, "")))
        }

        fn markup(&mut self, path: &str) -> Result<&mut MarkupFile> {
            self.markups
                .get_mut(path)
                .ok_or_else(|| Error::BaseNotFound(path.into()))
        }

        fn dictionary(&mut self, path: &str) -> Result<&mut DictionaryFile> {
            Ok(self
                .dictionaries
                .entry(path.to_string())
                .or_insert_with(|| DictionaryFile::from_text(path, "")))
        }
    }

    const SCRIPT: &str = r##"
[[op]]
kind = "add_definition"
file = "script/a.lua"
key = "y"
code = "y = x + 1"

[[op]]
kind = "insert_code"
file = "script/a.lua"
key = "function f()"
marker = "return"
code = "    log()"
position = "before"

[[op]]
kind = "set_attributes"
file = "xml/Item.xml"
locator = 'item[@id="1"]'

[op.attributes]
v = "2"

[[op]]
kind = "append_nodes"
file = "xml/Item.xml"
markup = '<item id="3"/>'

[[op]]
kind = "set_dictionary_line"
file = "Dictionary/text.dic"
line = "#5\tHi"
"##;

    #[test]
    fn test_parse_and_run() {
        let script: PatchScript = toml::from_str(SCRIPT).unwrap();
        assert_eq!(script.ops.len(), 5);

        let mut files = MemoryFiles::default();
        files.scripts.insert(
            "script/a.lua".into(),
            ScriptFile::from_source("a.lua", "x = 1\nfunction f()\n    return 1\nend\n"),
        );
        files.markups.insert(
            "xml/Item.xml".into(),
            MarkupFile::from_document("Item.xml", Document::parse(r#"<items><item id="1" v="1"/></items>"#).unwrap()),
        );

        script.run(&mut files).unwrap();

        let lua = &files.scripts["script/a.lua"];
        assert_eq!(lua.get("y"), Some("y = x + 1"));
        assert_eq!(lua.get("function f()"), Some("function f()\n    log()\n    return 1\nend"));

        let xml = &files.markups["xml/Item.xml"];
        assert_eq!(
            xml.root(),
            &Document::parse(r#"<items><item id="1" v="2"/><item id="3"/></items>"#).unwrap().root
        );
        assert_eq!(files.dictionaries["Dictionary/text.dic"].get("#5"), Some("#5\tHi\n"));
    }

    #[test]
    fn test_markup_changes_replay() {
        let base = Document::parse(r#"<items><item id="1" v="1"/></items>"#).unwrap();
        let incoming = Document::parse(r#"<items><item id="1" v="2"/><item id="2"/></items>"#).unwrap();

        let mut recorder = MarkupFile::from_document("xml/Item.xml", base.clone());
        recorder.merge_document(&incoming, MergeMode::Record).unwrap();
        let script = PatchScript::from_markup_changes("xml/Item.xml", recorder.take_changes());

        let text = script.to_toml().unwrap();
        let reparsed: PatchScript = toml::from_str(&text).unwrap();
        assert_eq!(reparsed, script);

        let mut files = MemoryFiles::default();
        files
            .markups
            .insert("xml/Item.xml".into(), MarkupFile::from_document("xml/Item.xml", base.clone()));
        reparsed.run(&mut files).unwrap();

        let mut direct = MarkupFile::from_document("xml/Item.xml", base);
        direct.merge_document(&incoming, MergeMode::Apply).unwrap();
        assert_eq!(files.markups["xml/Item.xml"].root(), direct.root());
    }

    #[test]
    fn test_script_changes_become_definition_ops() {
        let mut file = ScriptFile::from_source("a.lua", "x = 1\n");
        file.merge_source("x = 2\ny = x + 1\n", tt_script::MergeMode::Record);
        let script = PatchScript::from_script_changes("script/a.lua", file.take_changes());

        assert_eq!(
            script.ops,
            vec![
                PatchOp::AddDefinition {
                    file: "script/a.lua".into(),
                    key: "y".into(),
                    code: Some("y = x + 1".into()),
                    from_file: None,
                },
                PatchOp::ReplaceDefinition {
                    file: "script/a.lua".into(),
                    key: "x".into(),
                    code: Some("x = 2".into()),
                    from_file: None,
                },
            ]
        );
    }

    #[test]
    fn test_code_from_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("lua")).unwrap();
        std::fs::write(dir.path().join("lua").join("extra.lua"), "z = 3").unwrap();
        let patch = dir.path().join("p.tpatch");
        std::fs::write(
            &patch,
            "[[op]]\nkind = \"add_definition\"\nfile = \"script/a\"\nkey = \"z\"\nfrom_file = \"extra\"\n",
        )
        .unwrap();

        let script = PatchScript::open(&patch).unwrap();
        let mut files = MemoryFiles::default();
        script.run(&mut files).unwrap();
        assert_eq!(files.scripts["script/a"].get("z"), Some("z = 3"));
    }

    #[test]
    fn test_code_source_must_be_exclusive() {
        let script = PatchScript::new(vec![PatchOp::AddDefinition {
            file: "a".into(),
            key: "k".into(),
            code: None,
            from_file: None,
        }]);
        let err = script.run(&mut MemoryFiles::default()).unwrap_err();
        assert!(matches!(err, Error::CodeSource { .. }));
    }

    #[test]
    fn test_failed_op_reports_error() {
        let script = PatchScript::new(vec![PatchOp::SetAttributes {
            file: "xml/Missing.xml".into(),
            locator: String::new(),
            attributes: IndexMap::new(),
        }]);
        assert!(matches!(
            script.run(&mut MemoryFiles::default()),
            Err(Error::BaseNotFound(_))
        ));
    }
}
