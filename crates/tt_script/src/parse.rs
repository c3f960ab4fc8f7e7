//! Splitting Lua source into top-level definitions.
//!
//! The game's scripts keep every top-level definition at column 0 and indent
//! everything else, so definitions are found by scanning line starts rather
//! than by parsing Lua.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

/// Ordered map from definition key to its raw (trimmed) source block.
pub type Definitions = IndexMap<String, String>;

/// Line starts where a new top-level definition begins.
static DEFINITION_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(?:(?:local\s+)?function\s+[.\w:]+|(?:local\s+)?[.\w]+\s*=\s*function\b|(?:local\s+)?\w[ \t\w,.\[\]"']+\s*=|if\s+(?:not\s+)?_G\[)"#,
    )
    .expect("definition start pattern")
});

static FUNCTION_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:local\s+)?function\s+[.\w:]+").expect("function header pattern"));

static IF_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^if\s+.+").expect("if header pattern"));

/// Remove comments that start at column 0.
///
/// Long comments (`--[[ ]]`, `--[==[ ]==]`) must close with the same number
/// of `=` signs; an unterminated long comment degrades to a line comment.
/// Indented comments are part of a definition body and stay.
pub fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    let mut at_line_start = true;

    while !rest.is_empty() {
        if at_line_start && rest.starts_with("--") {
            let end = long_comment_len(rest).unwrap_or_else(|| rest.find('\n').unwrap_or(rest.len()));
            rest = &rest[end..];
            at_line_start = false;
            continue;
        }

        match rest.find('\n') {
            Some(newline) => {
                out.push_str(&rest[..=newline]);
                rest = &rest[newline + 1..];
                at_line_start = true;
            }
            None => {
                out.push_str(rest);
                break;
            }
        }
    }

    out
}

/// Byte length of a long comment at the start of `text`, if it is one and
/// it is terminated.
fn long_comment_len(text: &str) -> Option<usize> {
    let bracket = text.strip_prefix("--[")?;
    let level = bracket.bytes().take_while(|&b| b == b'=').count();
    let body = bracket[level..].strip_prefix('[')?;

    let closing = format!("]{}]", "=".repeat(level));
    let close_at = body.find(&closing)?;

    Some(text.len() - body.len() + close_at + closing.len())
}

/// Split comment-free source into raw blocks, one per definition start.
fn split_blocks(source: &str) -> Vec<&str> {
    let mut starts = Vec::new();
    let mut line_start = 0;

    loop {
        if DEFINITION_START.is_match(&source[line_start..]) {
            starts.push(line_start);
        }
        match source[line_start..].find('\n') {
            Some(offset) => line_start += offset + 1,
            None => break,
        }
    }

    let mut blocks = Vec::with_capacity(starts.len() + 1);
    let mut previous = 0;
    for start in starts {
        if start > previous {
            blocks.push(&source[previous..start]);
        }
        previous = start;
    }
    blocks.push(&source[previous..]);
    blocks
}

/// Key a trimmed block by its header.
///
/// Functions are keyed by their header up to the name, `if` guards by their
/// first line, assignments by the target list before the first `=`.
pub fn block_key(block: &str) -> Option<String> {
    if let Some(header) = FUNCTION_HEADER.find(block) {
        return Some(header.as_str().to_string());
    }

    if let Some(header) = IF_HEADER.find(block) {
        return Some(header.as_str().to_string());
    }

    block
        .split_once('=')
        .map(|(targets, _)| targets.trim_end().to_string())
}

/// Parse source text into its top-level definitions.
///
/// Later duplicates of a key replace the earlier block in place.
pub fn parse_definitions(source: &str) -> Definitions {
    let stripped = strip_comments(source);
    let mut definitions = Definitions::new();

    for block in split_blocks(&stripped) {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }

        match block_key(block) {
            Some(key) => {
                definitions.insert(key, block.to_string());
            }
            None => tracing::warn!("Unrecognized block: {}", block),
        }
    }

    definitions
}
