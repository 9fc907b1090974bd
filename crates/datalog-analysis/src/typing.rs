//! Per-argument type inference
//!
//! Assigns every argument node of a clause an [`AnalysisType`], computed as
//! a meet over everything the clause asserts about the node: literal
//! constants, functor result kinds, declared attribute types at the
//! positions of positive body atoms, record and cast annotations,
//! equalities, and variable-name sharing.
//!
//! Head atoms and negated atoms are checked against, not inferred from, so
//! their attribute types do not flow into the meet; the checker compares
//! them afterwards.
//!
//! Results share the clause's pre-order argument numbering with the
//! groundedness analysis.

use crate::lattice::{AnalysisType, TypeEnvironment, TypeLattice};
use datalog_ast::{Argument, Atom, Clause, Kind, Literal, Program, Symbol};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct TypeAnalysis {
    types: Vec<AnalysisType>,
}

impl TypeAnalysis {
    pub fn analyse(clause: &Clause, program: &Program, env: &TypeEnvironment) -> Self {
        let lattice = TypeLattice::new(env);
        let mut collector = Collector {
            program,
            lattice: &lattice,
            bounds: Vec::new(),
            var_nodes: BTreeMap::new(),
            equalities: Vec::new(),
        };
        collector.collect_atom(&clause.head, false);
        for lit in &clause.body {
            collector.collect_literal(lit, true);
        }

        let Collector {
            bounds,
            var_nodes,
            equalities,
            ..
        } = collector;

        let mut types: Vec<AnalysisType> = vec![AnalysisType::Top; bounds.len()];
        let mut changed = true;
        while changed {
            changed = false;
            for (i, node_bounds) in bounds.iter().enumerate() {
                for bound in node_bounds {
                    let met = lattice.meet(&types[i], bound);
                    if met != types[i] {
                        types[i] = met;
                        changed = true;
                    }
                }
            }
            for &(l, r) in &equalities {
                let met = lattice.meet(&types[l], &types[r]);
                if met != types[l] || met != types[r] {
                    types[l] = met.clone();
                    types[r] = met;
                    changed = true;
                }
            }
            for nodes in var_nodes.values() {
                let mut met = AnalysisType::Top;
                for &i in nodes {
                    met = lattice.meet(&met, &types[i]);
                }
                for &i in nodes {
                    if types[i] != met {
                        types[i] = met.clone();
                        changed = true;
                    }
                }
            }
        }

        TypeAnalysis { types }
    }

    /// The inferred type of the argument node with the given pre-order index
    pub fn type_of(&self, index: usize) -> &AnalysisType {
        &self.types[index]
    }
}

struct Collector<'a> {
    program: &'a Program,
    lattice: &'a TypeLattice<'a>,
    /// Upper bounds per node, met together during solving
    bounds: Vec<Vec<AnalysisType>>,
    var_nodes: BTreeMap<Symbol, Vec<usize>>,
    equalities: Vec<(usize, usize)>,
}

impl Collector<'_> {
    fn collect_literal(&mut self, lit: &Literal, positive: bool) {
        match lit {
            Literal::Atom(atom) => self.collect_atom(atom, positive),
            Literal::Negation(neg) => self.collect_atom(&neg.atom, false),
            Literal::Constraint(c) => {
                let lhs = self.collect_argument(&c.lhs);
                let rhs = self.collect_argument(&c.rhs);
                if c.op == datalog_ast::ConstraintOp::Eq {
                    self.equalities.push((lhs, rhs));
                }
            }
            Literal::Boolean(_) => {}
        }
    }

    fn collect_atom(&mut self, atom: &Atom, positive: bool) {
        let declared = self.program.relation(&atom.relation);
        for (position, arg) in atom.args.iter().enumerate() {
            let index = self.collect_argument(arg);
            if positive {
                if let Some(rel) = declared {
                    if let Some(attr) = rel.attributes.get(position) {
                        let bound = self.lattice.from_name(&attr.type_name);
                        self.bounds[index].push(bound);
                    }
                }
            }
        }
    }

    /// Pre-order collection; indices must agree with `for_each_arg_indexed`
    fn collect_argument(&mut self, arg: &Argument) -> usize {
        let index = self.bounds.len();
        self.bounds.push(Vec::new());

        match arg {
            Argument::Variable(v) => {
                self.var_nodes.entry(v.name).or_default().push(index);
            }
            Argument::Unnamed(_) => {}
            Argument::Number(_) | Argument::Counter(_) => {
                self.bounds[index].push(AnalysisType::Primitive(Kind::Number));
            }
            Argument::Text(_) => {
                self.bounds[index].push(AnalysisType::Primitive(Kind::Symbol));
            }
            Argument::Intrinsic(fun) => {
                self.bounds[index].push(AnalysisType::Primitive(fun.op.result()));
                for arg in &fun.args {
                    self.collect_argument(arg);
                }
            }
            Argument::UserDefined(fun) => {
                if let Some(decl) = self.program.functor(&fun.name) {
                    self.bounds[index].push(AnalysisType::Primitive(decl.result));
                }
                for arg in &fun.args {
                    self.collect_argument(arg);
                }
            }
            Argument::Cast(cast) => {
                self.bounds[index].push(self.lattice.from_name(&cast.type_name));
                self.collect_argument(&cast.value);
            }
            Argument::Record(rec) => {
                self.bounds[index].push(self.lattice.from_name(&rec.type_name));
                for arg in &rec.args {
                    self.collect_argument(arg);
                }
            }
            Argument::Aggregate(agg) => {
                self.bounds[index].push(AnalysisType::Primitive(Kind::Number));
                if let Some(target) = &agg.target {
                    self.collect_argument(target);
                }
                for lit in &agg.body {
                    self.collect_literal(lit, true);
                }
            }
        }
        index
    }
}
