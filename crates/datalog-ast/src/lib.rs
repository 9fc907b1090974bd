//! Abstract syntax tree for the Datalog frontend
//!
//! This crate defines the program representation shared by the semantic
//! checker and the demand-driven rewriting passes.
//!
//! # Key Components
//!
//! - **Program**: relations, type declarations, clauses and I/O directives,
//!   keyed by qualified name
//! - **Clause**: a head atom and a body of literals (a fact has no body)
//! - **Literal**: positive atoms, negated atoms, binary constraints
//! - **Argument**: variables, constants, functors, records, casts,
//!   aggregates
//! - **Visitors**: closure-based pre-order traversal, including a stable
//!   pre-order numbering of argument nodes used by the analyses
//! - **Rewriter**: owning post-order argument transform and atom renaming
//!
//! # Example
//!
//! ```ignore
//! let mut program = Program::new();
//! program.add_relation(Relation::new(QualifiedName::from("edge"), attrs));
//! program.add_clause(clause);
//! ```

mod ast;
mod config;
mod name;
mod program;
mod rewrite;
mod span;
mod visit;

pub use ast::{
    Aggregate, AggregateOp, Argument, Atom, Attribute, BinaryConstraint, BooleanConstraint,
    Clause, ConstraintOp, Counter, Directive, DirectiveKind, ExecutionPlan, FunctorDecl,
    FunctorOp, IntrinsicFunctor, Kind, Literal, Negation, NumberLiteral, PlanOrder, PrimitiveType,
    Qualifiers, RecordField, RecordInit, RecordType, Relation, Representation, TextLiteral,
    TypeCast, TypeDecl, UnionType, Unnamed, UserDefinedFunctor, Variable, MAX_NUMBER,
    MIN_NUMBER,
};
pub use config::{name_matches, Config};
pub use name::{QualifiedName, Symbol};
pub use program::Program;
pub use rewrite::{rewrite_args_in_clause, rewrite_args_in_literal};
pub use span::{Span, SrcId};
pub use visit::{
    for_each_arg_indexed, rename_atoms_in_clause, rename_atoms_in_literal, visit_aggregates,
    visit_atoms_in_body, visit_atoms_in_clause, visit_constraints_in_clause,
    visit_negations_in_clause, visit_variables_in_argument, visit_variables_in_atom,
    visit_variables_in_clause, visit_variables_in_literals, walk_argument, walk_clause,
    walk_literal, Node,
};
