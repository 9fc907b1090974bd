//! Sideways information passing
//!
//! During adornment the body atoms of a clause are consumed one at a time;
//! the SIPS decides which comes next, and with it how bindings flow
//! sideways through the body. The default picks the atom with the most
//! bound argument positions; ties prefer relations known in constant time
//! (inputs and fact-only relations), then the leftmost atom. The naive
//! strategy ignores the bound counts and just prefers constant-time
//! relations left to right.

use datalog_ast::{visit_variables_in_argument, Argument, Atom, QualifiedName, Symbol};
use std::collections::BTreeSet;

/// The set of variables bound so far while adorning one clause
#[derive(Debug, Clone, Default)]
pub struct BindingStore {
    bound: BTreeSet<Symbol>,
}

impl BindingStore {
    pub fn bind(&mut self, name: Symbol) {
        self.bound.insert(name);
    }

    pub fn is_bound(&self, name: Symbol) -> bool {
        self.bound.contains(&name)
    }

    /// An argument is bound when every variable it references is bound;
    /// constants reference none and are always bound, underscores never
    pub fn is_argument_bound(&self, arg: &Argument) -> bool {
        if let Argument::Unnamed(_) = arg {
            return false;
        }
        let mut all_bound = true;
        visit_variables_in_argument(arg, &mut |var| {
            all_bound &= self.is_bound(var.name);
        });
        all_bound
    }

    pub fn bound_args(&self, atom: &Atom) -> usize {
        atom.args
            .iter()
            .filter(|arg| self.is_argument_bound(arg))
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SipsStrategy {
    /// Most bound argument positions first; ties prefer constant-time
    /// relations, then source order
    #[default]
    MaxBound,
    /// Source order, preferring constant-time relations with a bound
    /// argument
    Naive,
}

impl SipsStrategy {
    /// Pick the next atom to consume out of `remaining` (nonempty)
    pub fn select(
        &self,
        remaining: &[Atom],
        bindings: &BindingStore,
        is_constant_time: &impl Fn(&QualifiedName) -> bool,
    ) -> usize {
        assert!(!remaining.is_empty(), "no atoms left to select");
        match self {
            SipsStrategy::MaxBound => {
                let mut best = 0;
                let mut best_key = (0usize, false);
                for (i, atom) in remaining.iter().enumerate() {
                    let key = (bindings.bound_args(atom), is_constant_time(&atom.relation));
                    if key > best_key {
                        best = i;
                        best_key = key;
                    }
                }
                best
            }
            SipsStrategy::Naive => {
                let mut first_bound = None;
                let mut first_constant_time = None;
                for (i, atom) in remaining.iter().enumerate() {
                    let constant_time = is_constant_time(&atom.relation);
                    let bound = atom.args.iter().any(|a| bindings.is_argument_bound(a));
                    if constant_time && bound {
                        return i;
                    }
                    if bound && first_bound.is_none() {
                        first_bound = Some(i);
                    }
                    if constant_time && first_constant_time.is_none() {
                        first_constant_time = Some(i);
                    }
                }
                first_bound.or(first_constant_time).unwrap_or(0)
            }
        }
    }
}
