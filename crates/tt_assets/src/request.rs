use std::collections::BTreeSet;

use crate::utils::normalize_logical_path;

/// How requested paths are compared against index entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Any entry whose logical path starts with a requested path.
    #[default]
    Prefix,
    /// Entries whose logical path equals a requested path. The scan stops
    /// once every request has been matched.
    Exact,
}

/// A set of logical paths (or prefixes) to extract.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtractRequest {
    targets: BTreeSet<String>,
    mode: MatchMode,
}

impl ExtractRequest {
    /// Parse a comma-separated list such as `"script, stage\\Mission"`.
    pub fn parse(text: &str, mode: MatchMode) -> Self {
        Self::from_paths(text.split(','), mode)
    }

    pub fn from_paths<I, S>(paths: I, mode: MatchMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let targets = paths
            .into_iter()
            .map(|p| normalize_logical_path(p.as_ref()))
            .filter(|p| !p.is_empty())
            .collect();
        Self { targets, mode }
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn targets(&self) -> &BTreeSet<String> {
        &self.targets
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Whether `logical` is selected by this request.
    pub fn matches(&self, logical: &str) -> bool {
        match self.mode {
            MatchMode::Prefix => self.targets.iter().any(|t| logical.starts_with(t.as_str())),
            MatchMode::Exact => self.targets.contains(logical),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_and_drops_empty() {
        let request = ExtractRequest::parse(" script\\a.lua, ,stage ", MatchMode::Exact);
        let targets: Vec<&str> = request.targets().iter().map(String::as_str).collect();
        assert_eq!(targets, vec!["script/a.lua", "stage"]);
        assert!(ExtractRequest::parse(" , ", MatchMode::Prefix).is_empty());
    }

    #[test]
    fn test_matching_modes() {
        let prefix = ExtractRequest::from_paths(["script"], MatchMode::Prefix);
        assert!(prefix.matches("script/a.lua"));
        assert!(!prefix.matches("xml/a.xml"));

        let exact = ExtractRequest::from_paths(["script/a.lua"], MatchMode::Exact);
        assert!(exact.matches("script/a.lua"));
        assert!(!exact.matches("script/a.lua.bak"));
    }
}
