//! Read-only analyses over a Datalog program
//!
//! Each analysis is an immutable snapshot derived from a program. Passes
//! that mutate the program must construct fresh snapshots afterwards;
//! nothing here holds references into the AST, only qualified names and
//! pre-order argument indices.
//!
//! # Analyses
//!
//! - [`IoTypes`]: input/output/printsize classification from directives
//! - [`PrecedenceGraph`]: which relations reference which
//! - [`SccGraph`]: strongly connected components, topologically ordered
//! - [`RecursiveClauses`]: clauses participating in a cycle
//! - [`Grounding`]: per-clause groundedness of variables and argument nodes
//! - [`TypeEnvironment`], [`TypeLattice`], [`TypeAnalysis`]: declared-type
//!   resolution and per-argument type inference

mod ground;
mod io;
mod lattice;
mod precedence;
mod recursive;
mod scc;
mod typing;

pub use ground::{grounded_names, Grounding};
pub use io::IoTypes;
pub use lattice::{AnalysisType, TypeEnvironment, TypeLattice};
pub use precedence::PrecedenceGraph;
pub use recursive::RecursiveClauses;
pub use scc::SccGraph;
pub use typing::TypeAnalysis;
