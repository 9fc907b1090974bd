//! Recursive-clause detection
//!
//! A clause is recursive when some atom in its body belongs to the same
//! strongly connected component as its head, i.e. evaluating the clause
//! feeds back into its own stratum.

use crate::scc::SccGraph;
use datalog_ast::{visit_atoms_in_body, Program};

#[derive(Debug, Clone)]
pub struct RecursiveClauses {
    recursive: Vec<bool>,
}

impl RecursiveClauses {
    pub fn analyse(program: &Program, sccs: &SccGraph) -> Self {
        let recursive = program
            .clauses
            .iter()
            .map(|clause| {
                let mut found = false;
                visit_atoms_in_body(&clause.body, &mut |atom| {
                    found |= sccs.same_scc(&atom.relation, &clause.head.relation);
                });
                found
            })
            .collect();
        RecursiveClauses { recursive }
    }

    /// Whether the clause at the given program index is recursive
    pub fn is_recursive(&self, clause_index: usize) -> bool {
        self.recursive[clause_index]
    }
}
