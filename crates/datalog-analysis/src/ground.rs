//! Groundedness analysis
//!
//! A term is grounded when its value is forced by the positive part of the
//! clause body: it is an argument of a positive atom, it is a constant, or
//! it is connected to grounded terms through equalities, record
//! constructors or casts. Functors ground their result from their inputs
//! but cannot be inverted; negated atoms ground nothing.
//!
//! Results are keyed by the clause's pre-order argument numbering (see
//! `for_each_arg_indexed` in the AST crate) and, for variables, by name:
//! all occurrences of one variable in a clause share groundedness,
//! including occurrences inside aggregate bodies.

use datalog_ast::{Argument, Atom, Clause, Literal, Symbol};
use std::collections::{BTreeMap, BTreeSet};

/// Per-clause groundedness of argument nodes and variables
#[derive(Debug, Clone)]
pub struct Grounding {
    grounded: Vec<bool>,
    vars: BTreeMap<Symbol, bool>,
}

impl Grounding {
    pub fn analyse(clause: &Clause) -> Self {
        let mut solver = Solver::default();
        solver.collect_atom(&clause.head, Role::Head);
        for lit in &clause.body {
            solver.collect_literal(lit, Role::Positive);
        }
        solver.solve(&BTreeSet::new());
        let vars = solver.var_results();
        Grounding {
            grounded: solver.grounded,
            vars,
        }
    }

    /// Whether the argument node with the given pre-order index is grounded
    pub fn is_grounded(&self, index: usize) -> bool {
        self.grounded[index]
    }

    /// Whether every occurrence of the variable is grounded
    pub fn is_variable_grounded(&self, name: Symbol) -> bool {
        self.vars.get(&name).copied().unwrap_or(false)
    }
}

/// Variable names grounded by a body on its own, with `forced` names taken
/// as grounded up front; used for the aggregate-scope escape check
pub fn grounded_names(body: &[Literal], forced: &BTreeSet<Symbol>) -> BTreeSet<Symbol> {
    let mut solver = Solver::default();
    for lit in body {
        solver.collect_literal(lit, Role::Positive);
    }
    solver.solve(forced);
    solver
        .var_results()
        .into_iter()
        .filter_map(|(name, grounded)| grounded.then_some(name))
        .collect()
}

/// How an atom's arguments relate to groundedness
#[derive(Clone, Copy, PartialEq)]
enum Role {
    /// Head arguments are what the analysis is asked about; they ground nothing
    Head,
    /// Arguments of a positive body atom are grounded
    Positive,
    /// Arguments under negation ground nothing
    Negated,
}

enum NodeKind {
    Var(Symbol),
    /// Constants, counters, underscores, aggregate values
    Always,
    /// Grounded iff all children are; grounding it grounds the children
    Record,
    /// Grounded iff the inner value is, in both directions
    Cast,
    /// Grounded once all inputs are; never inverted
    Functor,
}

#[derive(Default)]
struct Solver {
    kinds: Vec<NodeKind>,
    children: Vec<Vec<usize>>,
    /// Argument roots of positive atoms
    roots: Vec<usize>,
    /// Node pairs linked by `=` constraints
    equalities: Vec<(usize, usize)>,
    var_nodes: BTreeMap<Symbol, Vec<usize>>,
    grounded: Vec<bool>,
}

impl Solver {
    fn collect_literal(&mut self, lit: &Literal, role: Role) {
        match lit {
            Literal::Atom(atom) => self.collect_atom(atom, role),
            Literal::Negation(neg) => self.collect_atom(&neg.atom, Role::Negated),
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

    fn collect_atom(&mut self, atom: &Atom, role: Role) {
        for arg in &atom.args {
            let index = self.collect_argument(arg);
            if role == Role::Positive {
                self.roots.push(index);
            }
        }
    }

    /// Pre-order collection; indices must agree with `for_each_arg_indexed`
    fn collect_argument(&mut self, arg: &Argument) -> usize {
        let index = self.kinds.len();
        let kind = match arg {
            Argument::Variable(v) => {
                self.var_nodes.entry(v.name).or_default().push(index);
                NodeKind::Var(v.name)
            }
            Argument::Unnamed(_)
            | Argument::Number(_)
            | Argument::Text(_)
            | Argument::Counter(_)
            | Argument::Aggregate(_) => NodeKind::Always,
            Argument::Record(_) => NodeKind::Record,
            Argument::Cast(_) => NodeKind::Cast,
            Argument::Intrinsic(_) | Argument::UserDefined(_) => NodeKind::Functor,
        };
        self.kinds.push(kind);
        self.children.push(Vec::new());
        self.grounded.push(false);

        match arg {
            Argument::Intrinsic(fun) => {
                let children: Vec<usize> =
                    fun.args.iter().map(|a| self.collect_argument(a)).collect();
                self.children[index] = children;
            }
            Argument::UserDefined(fun) => {
                let children: Vec<usize> =
                    fun.args.iter().map(|a| self.collect_argument(a)).collect();
                self.children[index] = children;
            }
            Argument::Cast(cast) => {
                let child = self.collect_argument(&cast.value);
                self.children[index] = vec![child];
            }
            Argument::Record(rec) => {
                let children: Vec<usize> =
                    rec.args.iter().map(|a| self.collect_argument(a)).collect();
                self.children[index] = children;
            }
            Argument::Aggregate(agg) => {
                // The aggregate's value is grounded, and atoms in its body
                // ground their own arguments; the sub-collection keeps the
                // pre-order numbering aligned.
                if let Some(target) = &agg.target {
                    self.collect_argument(target);
                }
                for lit in &agg.body {
                    self.collect_literal(lit, Role::Positive);
                }
            }
            _ => {}
        }
        index
    }

    fn solve(&mut self, forced: &BTreeSet<Symbol>) {
        for name in forced {
            if let Some(nodes) = self.var_nodes.get(name) {
                for &i in nodes {
                    self.grounded[i] = true;
                }
            }
        }
        for &r in &self.roots {
            self.grounded[r] = true;
        }

        let mut changed = true;
        while changed {
            changed = false;
            for i in 0..self.kinds.len() {
                let newly = match &self.kinds[i] {
                    NodeKind::Always => !self.grounded[i],
                    NodeKind::Var(_) => false,
                    NodeKind::Record => {
                        let mut any = false;
                        if self.grounded[i] {
                            for &c in &self.children[i] {
                                if !self.grounded[c] {
                                    self.grounded[c] = true;
                                    any = true;
                                }
                            }
                        } else if !self.children[i].is_empty()
                            && self.children[i].iter().all(|&c| self.grounded[c])
                        {
                            any = true;
                            self.grounded[i] = true;
                        } else if self.children[i].is_empty() && !self.grounded[i] {
                            // the empty record is a constant
                            any = true;
                            self.grounded[i] = true;
                        }
                        changed |= any;
                        false
                    }
                    NodeKind::Cast => {
                        let child = self.children[i][0];
                        if self.grounded[i] != self.grounded[child] {
                            self.grounded[i] = true;
                            self.grounded[child] = true;
                            changed = true;
                        }
                        false
                    }
                    NodeKind::Functor => {
                        !self.grounded[i] && self.children[i].iter().all(|&c| self.grounded[c])
                    }
                };
                if newly {
                    self.grounded[i] = true;
                    changed = true;
                }
            }

            for &(l, r) in &self.equalities {
                if self.grounded[l] != self.grounded[r] {
                    self.grounded[l] = true;
                    self.grounded[r] = true;
                    changed = true;
                }
            }

            for nodes in self.var_nodes.values() {
                if nodes.iter().any(|&i| self.grounded[i])
                    && !nodes.iter().all(|&i| self.grounded[i])
                {
                    for &i in nodes {
                        self.grounded[i] = true;
                    }
                    changed = true;
                }
            }
        }
    }

    fn var_results(&self) -> BTreeMap<Symbol, bool> {
        self.var_nodes
            .iter()
            .map(|(name, nodes)| (*name, nodes.iter().any(|&i| self.grounded[i])))
            .collect()
    }
}
