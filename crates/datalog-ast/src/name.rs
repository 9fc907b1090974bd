//! Qualified names
//!
//! Relations and types live in one shared namespace keyed by qualified
//! names: nonempty sequences of dot-separated segments. The rewriting
//! passes encode bookkeeping in extra segments (`@magic`, adornment
//! markers), so the prepend/append API is load-bearing here.

use internment::Intern;
use std::fmt;

/// Interned string for efficient storage and comparison
pub type Symbol = Intern<String>;

/// A nonempty sequence of name segments, compared segment-wise.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualifiedName {
    segments: Vec<Symbol>,
}

impl QualifiedName {
    /// Create a single-segment name
    pub fn new(segment: impl Into<String>) -> Self {
        QualifiedName {
            segments: vec![Intern::new(segment.into())],
        }
    }

    /// Create a name from a sequence of segments; the sequence must be nonempty
    pub fn from_segments(segments: Vec<Symbol>) -> Self {
        assert!(!segments.is_empty(), "qualified name must be nonempty");
        QualifiedName { segments }
    }

    pub fn segments(&self) -> &[Symbol] {
        &self.segments
    }

    pub fn first(&self) -> Symbol {
        self.segments[0]
    }

    pub fn last(&self) -> Symbol {
        self.segments[self.segments.len() - 1]
    }

    /// Add a segment at the front
    pub fn prepend(&mut self, segment: impl Into<String>) {
        self.segments.insert(0, Intern::new(segment.into()));
    }

    /// Add a segment at the back
    pub fn append(&mut self, segment: impl Into<String>) {
        self.segments.push(Intern::new(segment.into()));
    }

    /// Copy of this name with a segment added at the front
    pub fn prepended(&self, segment: impl Into<String>) -> Self {
        let mut name = self.clone();
        name.prepend(segment);
        name
    }

    /// Copy of this name with a segment added at the back
    pub fn appended(&self, segment: impl Into<String>) -> Self {
        let mut name = self.clone();
        name.append(segment);
        name
    }

    /// The reserved numeric primitive type name
    pub fn number() -> Self {
        QualifiedName::new("number")
    }

    /// The reserved symbolic primitive type name
    pub fn symbol() -> Self {
        QualifiedName::new("symbol")
    }

    /// Whether this is one of the reserved primitive type names
    pub fn is_primitive(&self) -> bool {
        self.segments.len() == 1
            && (self.segments[0].as_ref() == "number" || self.segments[0].as_ref() == "symbol")
    }
}

impl From<&str> for QualifiedName {
    fn from(name: &str) -> Self {
        QualifiedName::from_segments(name.split('.').map(|s| Intern::new(s.to_string())).collect())
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl fmt::Debug for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepend_append() {
        let mut name = QualifiedName::from("edge");
        name.prepend("@magic");
        name.append("{bf}");
        assert_eq!(name.to_string(), "@magic.edge.{bf}");
        assert_eq!(name.segments().len(), 3);
    }

    #[test]
    fn test_equality_is_segment_wise() {
        let a = QualifiedName::from("a.b");
        let b = QualifiedName::from("a").appended("b");
        assert_eq!(a, b);
        assert_ne!(a, QualifiedName::from("a"));
    }

    #[test]
    fn test_primitive_names() {
        assert!(QualifiedName::number().is_primitive());
        assert!(QualifiedName::symbol().is_primitive());
        assert!(!QualifiedName::from("number.x").is_primitive());
        assert!(!QualifiedName::from("edge").is_primitive());
    }
}
