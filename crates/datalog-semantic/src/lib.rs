//! Semantic checking for Datalog programs
//!
//! A multi-pass validator over the shared AST. The checker enforces the
//! language's static semantics — type well-formedness, groundedness,
//! stratification of negation and aggregation, inlining legality,
//! aggregate-scope hygiene, fact constancy, constraint and functor kinds,
//! and I/O sanity — accumulating diagnostics instead of stopping at the
//! first problem.
//!
//! The driver must not run any rewriting pass if [`ErrorReport::has_errors`]
//! holds afterwards; warnings never gate.
//!
//! # Example
//!
//! ```ignore
//! let mut report = ErrorReport::new();
//! let summary = check_program(&mut program, &config, &mut report);
//! if report.has_errors() {
//!     report.write(&mut cache, &mut stderr)?;
//! }
//! ```

mod checker;
mod clauses;
mod decls;
mod diagnostics;
mod inlining;
mod stratification;
mod typecheck;
mod witness;

pub use checker::{check_program, CheckSummary};
pub use diagnostics::{Diagnostic, ErrorReport, Note, Severity};
