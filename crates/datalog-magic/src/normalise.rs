//! Normalisation
//!
//! Establishes the structural invariants the later passes rely on:
//!
//! 1. no relation is both read in and written out (`@split_in` mirrors)
//! 2. input relations are fact-only (`@interm_in` carries their rules)
//! 3. every atom argument is a plain variable; constants live in
//!    equalities (`@abdul<n> = c`)
//! 4. every output relation has exactly one rule and is referenced by no
//!    body (`@interm_out` carries the real computation)

use datalog_analysis::IoTypes;
use datalog_ast::{
    rename_atoms_in_clause, Argument, Atom, BinaryConstraint, Clause, ConstraintOp,
    DirectiveKind, Literal, Program, QualifiedName, Variable,
};
use internment::Intern;
use std::collections::BTreeSet;

const SPLIT_IN: &str = "@split_in";
const INTERM_IN: &str = "@interm_in";
const INTERM_OUT: &str = "@interm_out";

pub fn normalise(program: &mut Program) -> bool {
    let mut changed = false;
    changed |= partition_io(program);
    changed |= extract_idb(program);
    changed |= name_constants(program);
    changed |= querify_outputs(program);
    changed
}

/// Relations both read and observed get an input mirror: the original
/// relation keeps its rules and outputs, the mirror takes the input
/// directive, and a bridge rule copies the mirror over
fn partition_io(program: &mut Program) -> bool {
    let io = IoTypes::analyse(program);
    let to_split: Vec<QualifiedName> = program
        .relations
        .keys()
        .filter(|name| io.is_input(name) && io.is_observed(name))
        .cloned()
        .collect();

    for name in &to_split {
        let relation = program.relation(name).expect("relation must exist").clone();
        let mirror = name.prepended(SPLIT_IN);
        program.add_relation(relation.renamed(mirror.clone()));

        let head_vars: Vec<Argument> = (0..relation.arity())
            .map(|i| Argument::var(format!("@var{}", i)))
            .collect();
        let mut bridge = Clause::new(
            Atom::new(name.clone(), head_vars.clone()),
            vec![Literal::Atom(Atom::new(mirror.clone(), head_vars))],
        );
        bridge.generated = true;
        program.add_clause(bridge);

        for directive in &mut program.directives {
            if &directive.relation == name && directive.kind == DirectiveKind::Input {
                directive.relation = mirror.clone();
                if !directive.params.contains_key("filename") {
                    directive.params.insert("IO".to_string(), "file".to_string());
                    directive
                        .params
                        .insert("filename".to_string(), format!("{}.facts", name));
                }
            }
        }
    }

    !to_split.is_empty()
}

/// Input relations with rules are split: the rules (and every body
/// reference) move to an `@interm_in` twin fed by the raw input relation
fn extract_idb(program: &mut Program) -> bool {
    let io = IoTypes::analyse(program);
    let to_extract: BTreeSet<QualifiedName> = program
        .relations
        .keys()
        .filter(|name| {
            io.is_input(name)
                && program
                    .clauses_of(name)
                    .any(|(_, clause)| clause.body_atoms().next().is_some())
        })
        .cloned()
        .collect();
    if to_extract.is_empty() {
        return false;
    }

    for name in &to_extract {
        let relation = program.relation(name).expect("relation must exist").clone();
        program.add_relation(relation.renamed(name.prepended(INTERM_IN)));
    }

    // Heads move the rules over; body references follow.
    for clause in &mut program.clauses {
        rename_atoms_in_clause(clause, &mut |atom| {
            if to_extract.contains(&atom.relation) {
                atom.relation.prepend(INTERM_IN);
            }
        });
    }

    for name in &to_extract {
        let arity = program.relation(name).expect("relation must exist").arity();
        let vars: Vec<Argument> = (0..arity)
            .map(|i| Argument::var(format!("@query_x{}", i)))
            .collect();
        let mut bridge = Clause::new(
            Atom::new(name.prepended(INTERM_IN), vars.clone()),
            vec![Literal::Atom(Atom::new(name.clone(), vars))],
        );
        bridge.generated = true;
        program.add_clause(bridge);
    }

    true
}

/// Lift every non-variable atom argument into a fresh variable, adding
/// `@abdul<n> = <lifted>` for everything except underscores. Literals of
/// the form `var = ...` stay as they are; the adorn pass reads its
/// binding seeds off them.
fn name_constants(program: &mut Program) -> bool {
    let mut changed = false;
    for clause in &mut program.clauses {
        let mut lifter = Lifter {
            next: 0,
            lifted: Vec::new(),
        };
        lifter.lift_atom(&mut clause.head);
        for lit in &mut clause.body {
            lifter.lift_literal(lit);
        }
        changed |= lifter.next > 0;
        clause.body.extend(lifter.lifted);
    }
    changed
}

struct Lifter {
    /// Per-clause counter; variables are clause-scoped, so names may
    /// repeat across clauses
    next: usize,
    lifted: Vec<Literal>,
}

impl Lifter {
    fn fresh(&mut self, span: datalog_ast::Span) -> Variable {
        let name = Intern::new(format!("@abdul{}", self.next));
        self.next += 1;
        Variable { name, span }
    }

    fn lift_literal(&mut self, lit: &mut Literal) {
        match lit {
            Literal::Atom(atom) => self.lift_atom(atom),
            Literal::Negation(neg) => self.lift_atom(&mut neg.atom),
            // Constraint operands are not atom arguments; only aggregate
            // bodies below them contain more atoms to lift.
            Literal::Constraint(c) => {
                self.lift_below(&mut c.lhs);
                self.lift_below(&mut c.rhs);
            }
            Literal::Boolean(_) => {}
        }
    }

    fn lift_atom(&mut self, atom: &mut Atom) {
        for arg in &mut atom.args {
            self.lift_below(arg);
            match arg {
                Argument::Variable(_) => {}
                Argument::Unnamed(u) => {
                    let var = self.fresh(u.span);
                    *arg = Argument::Variable(var);
                }
                _ => {
                    let span = arg.span();
                    let var = self.fresh(span);
                    let old = std::mem::replace(arg, Argument::Variable(var.clone()));
                    let mut eq = BinaryConstraint::new(
                        ConstraintOp::Eq,
                        Argument::Variable(var),
                        old,
                    );
                    eq.span = span;
                    self.lifted.push(Literal::Constraint(eq));
                }
            }
        }
    }

    /// Descend into aggregate bodies below an argument without touching
    /// the argument itself
    fn lift_below(&mut self, arg: &mut Argument) {
        match arg {
            Argument::Aggregate(agg) => {
                for lit in &mut agg.body {
                    self.lift_literal(lit);
                }
            }
            Argument::Intrinsic(fun) => fun.args.iter_mut().for_each(|a| self.lift_below(a)),
            Argument::UserDefined(fun) => fun.args.iter_mut().for_each(|a| self.lift_below(a)),
            Argument::Cast(cast) => self.lift_below(&mut cast.value),
            Argument::Record(rec) => rec.args.iter_mut().for_each(|a| self.lift_below(a)),
            _ => {}
        }
    }
}

/// Observed relations that carry several rules or are referenced by other
/// bodies get their computation moved to an `@interm_out` twin; the
/// original becomes a single thin projection
fn querify_outputs(program: &mut Program) -> bool {
    let io = IoTypes::analyse(program);

    let mut referenced: BTreeSet<QualifiedName> = BTreeSet::new();
    for clause in &program.clauses {
        datalog_ast::visit_atoms_in_body(&clause.body, &mut |atom| {
            referenced.insert(atom.relation.clone());
        });
    }

    let to_querify: BTreeSet<QualifiedName> = program
        .relations
        .keys()
        .filter(|name| {
            if !io.is_observed(name) {
                return false;
            }
            let rule_count = program.clauses_of(name).count();
            referenced.contains(*name) || rule_count > 1
        })
        .cloned()
        .collect();
    if to_querify.is_empty() {
        return false;
    }

    for name in &to_querify {
        let relation = program.relation(name).expect("relation must exist").clone();
        program.add_relation(relation.renamed(name.prepended(INTERM_OUT)));
    }

    for clause in &mut program.clauses {
        rename_atoms_in_clause(clause, &mut |atom| {
            if to_querify.contains(&atom.relation) {
                atom.relation.prepend(INTERM_OUT);
            }
        });
    }

    for name in &to_querify {
        let arity = program.relation(name).expect("relation must exist").arity();
        let vars: Vec<Argument> = (0..arity)
            .map(|i| Argument::var(format!("@query_x{}", i)))
            .collect();
        let mut bridge = Clause::new(
            Atom::new(name.clone(), vars.clone()),
            vec![Literal::Atom(Atom::new(name.prepended(INTERM_OUT), vars))],
        );
        bridge.generated = true;
        program.add_clause(bridge);
    }

    true
}
