//! Demand-driven rewriting (magic sets)
//!
//! Rewrites a checked program so that bottom-up evaluation only derives
//! tuples relevant to the output relations. Four passes run in order, each
//! recomputing the analyses it needs (any earlier pass may have changed
//! the program):
//!
//! 1. **Normalise** — split dual input/output roles, separate rule-defined
//!    input relations, lift constants in atoms to equalities, give every
//!    output relation a single thin rule
//! 2. **Label** — copy negated and aggregated computations under
//!    `@neglabel` names, then copy the positive strata they depend on
//!    under `@poscopy_<k>` names, so demand restriction cannot change what
//!    a negation observes
//! 3. **Adorn** — specialise every reachable predicate occurrence to its
//!    binding pattern, propagating bindings with a sideways information
//!    passing strategy
//! 4. **Magic** — guard each adorned rule with a `@magic` predicate and
//!    derive the rules that populate the guards
//!
//! Labelling must precede adornment: adornment drops the original clauses
//! of every relation it specialises, which is only sound once negated
//! occurrences have been moved onto their own labelled copies.
//!
//! The rewrite preserves the set of facts derivable for output relations.

mod adorn;
mod label;
mod magic;
mod names;
mod normalise;
mod sips;

pub use adorn::adorn;
pub use label::label;
pub use magic::magic;
pub use normalise::normalise;
pub use sips::{BindingStore, SipsStrategy};

use datalog_ast::{Config, Program};
use log::debug;

/// Run the full pipeline with the default (max-bound) SIPS.
///
/// Does nothing unless the configuration selects relations for the
/// transformation. Returns whether the program changed.
pub fn transform(program: &mut Program, config: &Config) -> bool {
    transform_with_sips(program, config, SipsStrategy::MaxBound)
}

pub fn transform_with_sips(program: &mut Program, config: &Config, sips: SipsStrategy) -> bool {
    if config.magic_transform.is_none() {
        return false;
    }
    let mut changed = false;

    changed |= normalise(program);
    debug!("normalise done, {} clauses", program.clauses.len());

    changed |= label(program);
    debug!("label done, {} clauses", program.clauses.len());

    changed |= adorn(program, config, sips);
    debug!("adorn done, {} clauses", program.clauses.len());

    changed |= magic(program);
    debug!("magic done, {} clauses", program.clauses.len());

    changed
}
