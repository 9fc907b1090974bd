//! I/O classification of relations

use datalog_ast::{DirectiveKind, Program, QualifiedName};
use std::collections::BTreeSet;

/// Which relations are read from disk, written out, or size-printed
#[derive(Debug, Clone, Default)]
pub struct IoTypes {
    inputs: BTreeSet<QualifiedName>,
    outputs: BTreeSet<QualifiedName>,
    printsizes: BTreeSet<QualifiedName>,
}

impl IoTypes {
    pub fn analyse(program: &Program) -> Self {
        let mut io = IoTypes::default();
        for directive in &program.directives {
            let name = directive.relation.clone();
            match directive.kind {
                DirectiveKind::Input => {
                    io.inputs.insert(name);
                }
                DirectiveKind::Output => {
                    io.outputs.insert(name);
                }
                DirectiveKind::PrintSize => {
                    io.printsizes.insert(name);
                }
            }
        }
        io
    }

    pub fn is_input(&self, name: &QualifiedName) -> bool {
        self.inputs.contains(name)
    }

    pub fn is_output(&self, name: &QualifiedName) -> bool {
        self.outputs.contains(name)
    }

    pub fn is_printsize(&self, name: &QualifiedName) -> bool {
        self.printsizes.contains(name)
    }

    /// Output or printsize: relations whose full extent must be produced
    pub fn is_observed(&self, name: &QualifiedName) -> bool {
        self.is_output(name) || self.is_printsize(name)
    }

    pub fn is_io(&self, name: &QualifiedName) -> bool {
        self.is_input(name) || self.is_observed(name)
    }
}
