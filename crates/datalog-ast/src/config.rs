//! Frontend configuration
//!
//! Options are threaded explicitly through the checker and every pass;
//! there is no global configuration. Relation selections are comma lists
//! of name globs, where `*` matches any run of characters and a bare `*`
//! selects everything.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Comma list of relation-name globs whose "unused/empty" warnings are
    /// muted, or `*` for all
    pub suppress_warnings: Option<String>,
    /// Comma list of relation-name globs selected for the demand
    /// transformation, or `*` for all; `None` disables the transformation
    pub magic_transform: Option<String>,
    /// Execution engine requested by the driver; cleared when the program
    /// uses record types, which the subprogram engine cannot compile
    pub engine: Option<String>,
}

impl Config {
    /// The suppress-warnings globs, empty when the option is unset
    pub fn suppressed_patterns(&self) -> Vec<&str> {
        split_list(self.suppress_warnings.as_deref())
    }

    /// The magic-transform globs, empty when the option is unset
    pub fn magic_patterns(&self) -> Vec<&str> {
        split_list(self.magic_transform.as_deref())
    }
}

fn split_list(value: Option<&str>) -> Vec<&str> {
    match value {
        None => Vec::new(),
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect(),
    }
}

/// Glob match with `*` as the only wildcard
pub fn name_matches(name: &str, pattern: &str) -> bool {
    match pattern.split_once('*') {
        None => name == pattern,
        Some((prefix, rest)) => {
            if let Some(stripped) = name.strip_prefix(prefix) {
                // Try every position the rest of the pattern could start at
                (0..=stripped.len())
                    .filter(|&i| stripped.is_char_boundary(i))
                    .any(|i| name_matches(&stripped[i..], rest))
            } else {
                false
            }
        }
    }
}
