//! Frontend driver
//!
//! Ties the semantic checker and the demand transformation together with
//! the gating rule: validation always runs; rewriting only runs when
//! validation produced no error-severity diagnostics. Warnings never gate.
//!
//! The one configuration side effect lives here: when the checker reports
//! that the program uses record types, the `engine` option is cleared
//! (the subprogram engine cannot compile records).
//!
//! # Example
//!
//! ```ignore
//! let mut config = Config { magic_transform: Some("*".into()), ..Config::default() };
//! let outcome = transform(program, &mut config);
//! if outcome.report.has_errors() {
//!     outcome.report.write(&mut cache, &mut std::io::stderr())?;
//! }
//! ```

use datalog_ast::{Config, Program};
use datalog_semantic::{check_program, CheckSummary, ErrorReport};
use log::debug;

pub use datalog_ast as ast;
pub use datalog_magic as magic;
pub use datalog_semantic as semantic;

/// The checked (and, absent errors, rewritten) program plus everything
/// the checker reported
#[derive(Debug, Clone)]
pub struct TransformOutcome {
    pub program: Program,
    pub report: ErrorReport,
    pub summary: CheckSummary,
}

/// Validate, then rewrite. On error the program comes back untouched
/// (apart from suppression qualifiers) together with the diagnostics.
pub fn transform(mut program: Program, config: &mut Config) -> TransformOutcome {
    let mut report = ErrorReport::new();
    let summary = check_program(&mut program, config, &mut report);

    if summary.uses_records && config.engine.is_some() {
        debug!("program uses records, disabling the subprogram engine");
        config.engine = None;
    }

    if report.has_errors() {
        debug!("{} errors, skipping the demand transformation", report.error_count());
        return TransformOutcome {
            program,
            report,
            summary,
        };
    }

    datalog_magic::transform(&mut program, config);
    TransformOutcome {
        program,
        report,
        summary,
    }
}
