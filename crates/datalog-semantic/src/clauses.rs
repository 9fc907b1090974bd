//! Structural checks on clauses: atom existence and arity, underscore
//! placement, fact constancy, use-once variables, execution plans, and the
//! `$` counter in recursive rules

use crate::diagnostics::ErrorReport;
use datalog_analysis::RecursiveClauses;
use datalog_ast::{
    visit_atoms_in_clause, visit_variables_in_clause, walk_clause, Argument, Atom, Clause, Node,
    Program, Span, Symbol, Variable,
};
use std::collections::BTreeMap;

pub fn check_clauses(program: &Program, recursive: &RecursiveClauses, report: &mut ErrorReport) {
    for (index, clause) in program.clauses.iter().enumerate() {
        check_clause(program, clause, recursive.is_recursive(index), report);
    }
}

fn check_clause(program: &Program, clause: &Clause, is_recursive: bool, report: &mut ErrorReport) {
    // Every atom, head included, must name a declared relation of the
    // right arity.
    visit_atoms_in_clause(clause, &mut |atom| check_atom(program, atom, report));

    if has_unnamed_in_atom(&clause.head) {
        report.error("Underscore in head of rule", clause.head.span);
    }

    // Underscores are fine in atoms and negations, not in constraints.
    walk_clause(clause, &mut |node| {
        if let Node::Constraint(c) = node {
            if has_unnamed_in_argument(&c.lhs) || has_unnamed_in_argument(&c.rhs) {
                report.error("Underscore in binary constraint", c.span);
            }
        }
    });

    // User-defined functor calls must match a declaration.
    walk_clause(clause, &mut |node| {
        if let Node::Argument(Argument::UserDefined(fun)) = node {
            match program.functor(&fun.name) {
                None => report.error("User-defined functor hasn't been declared", fun.span),
                Some(decl) if decl.params.len() != fun.args.len() => {
                    report.error("Mismatching number of arguments of functor", fun.span)
                }
                Some(_) => {}
            }
        }
    });

    if clause.is_fact() {
        check_fact(clause, report);
    } else {
        check_use_once_variables(clause, report);
    }

    check_plan(clause, report);

    if is_recursive {
        walk_clause(clause, &mut |node| {
            if let Node::Argument(Argument::Counter(counter)) = node {
                report.error("Auto-increment counter in a recursive rule", counter.span);
            }
        });
    }
}

fn check_atom(program: &Program, atom: &Atom, report: &mut ErrorReport) {
    match program.relation(&atom.relation) {
        None => report.error(format!("Undefined relation {}", atom.relation), atom.span),
        Some(relation) if relation.arity() != atom.arity() => report.error(
            format!("Mismatching arity of relation {}", atom.relation),
            atom.span,
        ),
        Some(_) => {}
    }
}

/// A fact's head may only contain values known at compile time: constants,
/// all-constant numeric functors, records and casts of such
fn check_fact(fact: &Clause, report: &mut ErrorReport) {
    for arg in &fact.head.args {
        check_constant(arg, report);
    }
}

fn check_constant(arg: &Argument, report: &mut ErrorReport) {
    match arg {
        Argument::Number(_) | Argument::Text(_) => {}
        Argument::Variable(var) => {
            report.error(format!("Variable {} in fact", var.name), var.span)
        }
        Argument::Unnamed(u) => report.error("Underscore in fact", u.span),
        Argument::Counter(c) => report.error("Counter in fact", c.span),
        Argument::UserDefined(fun) => report.error("User-defined functor in fact", fun.span),
        Argument::Intrinsic(fun) => {
            if !is_constant_numeric_expr(arg) {
                report.error("Function in fact", fun.span);
            }
        }
        Argument::Cast(cast) => check_constant(&cast.value, report),
        Argument::Record(rec) => {
            for arg in &rec.args {
                check_constant(arg, report);
            }
        }
        Argument::Aggregate(agg) => report.error("Aggregate in fact", agg.span),
    }
}

/// Numeric intrinsic functors over constants evaluate to constants
fn is_constant_numeric_expr(arg: &Argument) -> bool {
    match arg {
        Argument::Number(_) => true,
        Argument::Intrinsic(fun) => {
            fun.op.is_numeric() && fun.args.iter().all(is_constant_numeric_expr)
        }
        _ => false,
    }
}

/// A variable occurring exactly once is usually a typo; `_`-prefixed names
/// opt out, as do clauses a pass generated
fn check_use_once_variables(clause: &Clause, report: &mut ErrorReport) {
    if clause.generated {
        return;
    }
    let mut count: BTreeMap<Symbol, usize> = BTreeMap::new();
    let mut first: BTreeMap<Symbol, Span> = BTreeMap::new();
    visit_variables_in_clause(clause, &mut |var: &Variable| {
        *count.entry(var.name).or_insert(0) += 1;
        first.entry(var.name).or_insert(var.span);
    });
    for (name, n) in count {
        if n == 1 && !name.as_ref().starts_with('_') {
            report.warning(format!("Variable {} only occurs once", name), first[&name]);
        }
    }
}

/// Each plan order must be a complete permutation over the body atoms
fn check_plan(clause: &Clause, report: &mut ErrorReport) {
    let Some(plan) = &clause.plan else { return };
    let atom_count = clause.body_atoms().count();
    for order in plan.orders.values() {
        if !order.is_complete_permutation(atom_count) {
            report.error("Invalid execution plan", order.span);
        }
    }
}

fn has_unnamed_in_atom(atom: &Atom) -> bool {
    atom.args.iter().any(has_unnamed_in_argument)
}

/// Unnamed variables below the argument, not looking into aggregates
/// (their bodies are their own scope)
fn has_unnamed_in_argument(arg: &Argument) -> bool {
    match arg {
        Argument::Unnamed(_) => true,
        Argument::Intrinsic(fun) => fun.args.iter().any(has_unnamed_in_argument),
        Argument::UserDefined(fun) => fun.args.iter().any(has_unnamed_in_argument),
        Argument::Cast(cast) => has_unnamed_in_argument(&cast.value),
        Argument::Record(rec) => rec.args.iter().any(has_unnamed_in_argument),
        _ => false,
    }
}
