//! Strongly connected components of the precedence graph
//!
//! Tarjan's algorithm; components are emitted dependencies-first, so the
//! component index doubles as the stratum number for stratified
//! evaluation.

use crate::precedence::PrecedenceGraph;
use datalog_ast::QualifiedName;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct SccGraph {
    scc_of: BTreeMap<QualifiedName, usize>,
    members: Vec<Vec<QualifiedName>>,
}

impl SccGraph {
    pub fn analyse(graph: &PrecedenceGraph) -> Self {
        let mut state = Tarjan {
            graph,
            index: BTreeMap::new(),
            low: BTreeMap::new(),
            on_stack: BTreeMap::new(),
            stack: Vec::new(),
            next_index: 0,
            components: Vec::new(),
        };
        for v in graph.vertices() {
            if !state.index.contains_key(v) {
                state.strongconnect(v);
            }
        }

        let mut scc_of = BTreeMap::new();
        for (i, component) in state.components.iter().enumerate() {
            for name in component {
                scc_of.insert(name.clone(), i);
            }
        }
        SccGraph {
            scc_of,
            members: state.components,
        }
    }

    /// Number of components (strata)
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Stratum of the given relation
    pub fn scc_of(&self, name: &QualifiedName) -> Option<usize> {
        self.scc_of.get(name).copied()
    }

    /// Relations in the given stratum
    pub fn relations_in(&self, stratum: usize) -> &[QualifiedName] {
        &self.members[stratum]
    }

    /// Whether two relations share a component
    pub fn same_scc(&self, a: &QualifiedName, b: &QualifiedName) -> bool {
        match (self.scc_of(a), self.scc_of(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }
}

struct Tarjan<'g> {
    graph: &'g PrecedenceGraph,
    index: BTreeMap<QualifiedName, usize>,
    low: BTreeMap<QualifiedName, usize>,
    on_stack: BTreeMap<QualifiedName, bool>,
    stack: Vec<QualifiedName>,
    next_index: usize,
    components: Vec<Vec<QualifiedName>>,
}

impl Tarjan<'_> {
    fn strongconnect(&mut self, v: &QualifiedName) {
        self.index.insert(v.clone(), self.next_index);
        self.low.insert(v.clone(), self.next_index);
        self.next_index += 1;
        self.stack.push(v.clone());
        self.on_stack.insert(v.clone(), true);

        let successors: Vec<QualifiedName> = self.graph.successors(v).cloned().collect();
        for w in &successors {
            if !self.index.contains_key(w) {
                self.strongconnect(w);
                let low = self.low[v].min(self.low[w]);
                self.low.insert(v.clone(), low);
            } else if self.on_stack.get(w).copied().unwrap_or(false) {
                let low = self.low[v].min(self.index[w]);
                self.low.insert(v.clone(), low);
            }
        }

        if self.low[v] == self.index[v] {
            let mut component = Vec::new();
            loop {
                let w = self.stack.pop().unwrap();
                self.on_stack.insert(w.clone(), false);
                let done = &w == v;
                component.push(w);
                if done {
                    break;
                }
            }
            component.sort();
            self.components.push(component);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datalog_ast::{Argument, Atom, Clause, Literal, Program};

    fn rule(head: &str, body: &[&str]) -> Clause {
        Clause::new(
            Atom::new(QualifiedName::from(head), vec![Argument::var("x")]),
            body.iter()
                .map(|name| {
                    Literal::Atom(Atom::new(QualifiedName::from(*name), vec![Argument::var("x")]))
                })
                .collect(),
        )
    }

    #[test]
    fn test_strata_are_topologically_ordered() {
        // c is a leaf; a and b form a cycle above it; d sits on top.
        let mut program = Program::new();
        program.add_clause(rule("a", &["b", "c"]));
        program.add_clause(rule("b", &["a"]));
        program.add_clause(rule("d", &["a"]));

        let graph = PrecedenceGraph::analyse(&program);
        let sccs = SccGraph::analyse(&graph);

        let a = QualifiedName::from("a");
        let b = QualifiedName::from("b");
        let c = QualifiedName::from("c");
        let d = QualifiedName::from("d");

        assert_eq!(sccs.len(), 3);
        assert!(sccs.same_scc(&a, &b));
        assert!(sccs.scc_of(&c).unwrap() < sccs.scc_of(&a).unwrap());
        assert!(sccs.scc_of(&a).unwrap() < sccs.scc_of(&d).unwrap());
        assert_eq!(
            sccs.relations_in(sccs.scc_of(&a).unwrap()),
            &[a.clone(), b.clone()]
        );
    }
}
