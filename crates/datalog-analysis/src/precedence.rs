//! Precedence graph
//!
//! An edge `a -> b` means some clause with head `a` references `b` in its
//! body: positively, under negation, or inside an aggregate. Vertices are
//! all declared relations plus every relation referenced by a clause.

use datalog_ast::{visit_atoms_in_body, Program, QualifiedName};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
pub struct PrecedenceGraph {
    vertices: BTreeSet<QualifiedName>,
    successors: BTreeMap<QualifiedName, BTreeSet<QualifiedName>>,
}

impl PrecedenceGraph {
    pub fn analyse(program: &Program) -> Self {
        let mut graph = PrecedenceGraph::default();
        for name in program.relations.keys() {
            graph.vertices.insert(name.clone());
        }
        for clause in &program.clauses {
            let head = clause.head.relation.clone();
            graph.vertices.insert(head.clone());
            visit_atoms_in_body(&clause.body, &mut |atom| {
                graph.vertices.insert(atom.relation.clone());
                graph
                    .successors
                    .entry(head.clone())
                    .or_default()
                    .insert(atom.relation.clone());
            });
        }
        graph
    }

    pub fn vertices(&self) -> impl Iterator<Item = &QualifiedName> {
        self.vertices.iter()
    }

    /// Relations referenced by clauses of `name`
    pub fn successors(&self, name: &QualifiedName) -> impl Iterator<Item = &QualifiedName> {
        self.successors.get(name).into_iter().flatten()
    }

    /// Whether `to` is reachable from `from` following one or more edges
    pub fn reaches(&self, from: &QualifiedName, to: &QualifiedName) -> bool {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&QualifiedName> = self.successors(from).collect();
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if seen.insert(current.clone()) {
                stack.extend(self.successors(current));
            }
        }
        false
    }

    /// The set of relations mutually reachable with `name`, itself included
    pub fn clique(&self, name: &QualifiedName) -> BTreeSet<QualifiedName> {
        let mut clique = BTreeSet::new();
        clique.insert(name.clone());
        for other in &self.vertices {
            if other != name && self.reaches(name, other) && self.reaches(other, name) {
                clique.insert(other.clone());
            }
        }
        clique
    }
}
