//! Source locations
//!
//! Every AST node carries a [`Span`]: a byte range into an interned source
//! id. Nodes synthesised by the rewriting passes carry the span of the node
//! they were derived from, or [`Span::none`] when there is no such node.

use internment::Intern;
use std::{
    fmt,
    ops::Range,
    path::{Path, PathBuf},
};

/// Interned identifier of a source file (or of a synthetic origin)
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SrcId(Intern<Vec<String>>);

impl SrcId {
    /// A source id with no path; used for spans of synthesised nodes
    pub fn none() -> Self {
        Self(Intern::new(Vec::new()))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Self(Intern::new(
            path.as_ref()
                .iter()
                .map(|segment| segment.to_string_lossy().into_owned())
                .collect(),
        ))
    }

    pub fn to_path(&self) -> PathBuf {
        self.0.iter().map(|segment| segment.to_string()).collect()
    }
}

impl fmt::Display for SrcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "?")
        } else {
            write!(f, "{}", self.0.join("/"))
        }
    }
}

impl fmt::Debug for SrcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// A byte range in a source
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Span {
    src: SrcId,
    range: (usize, usize),
}

impl Span {
    pub fn new(src: SrcId, range: Range<usize>) -> Self {
        assert!(range.start <= range.end);
        Self {
            src,
            range: (range.start, range.end),
        }
    }

    /// The span of a node with no source text (synthesised by a pass)
    pub fn none() -> Self {
        Self {
            src: SrcId::none(),
            range: (0, 0),
        }
    }

    pub fn src(&self) -> SrcId {
        self.src
    }

    pub fn start(&self) -> usize {
        self.range.0
    }

    pub fn end(&self) -> usize {
        self.range.1
    }

    pub fn range(&self) -> Range<usize> {
        self.start()..self.end()
    }

    /// Smallest span covering both inputs; both must come from one source
    pub fn union(self, other: Self) -> Self {
        assert_eq!(self.src, other.src, "span source ids must match");
        Self {
            src: self.src,
            range: (self.start().min(other.start()), self.end().max(other.end())),
        }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{:?}", self.src, self.range())
    }
}

impl ariadne::Span for Span {
    type SourceId = SrcId;

    fn source(&self) -> &Self::SourceId {
        &self.src
    }

    fn start(&self) -> usize {
        self.range.0
    }

    fn end(&self) -> usize {
        self.range.1
    }
}
