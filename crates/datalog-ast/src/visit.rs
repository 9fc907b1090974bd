//! Pre-order traversal
//!
//! The checker and the rewriting passes mostly need "call this closure on
//! every node of one shape", so traversal is exposed as a single generic
//! walker plus thin closure adapters, rather than a visitor trait.
//!
//! [`for_each_arg_indexed`] numbers argument nodes in pre-order; that
//! numbering is the stable node identity the groundedness and typing
//! analyses key their results by. Both the walker and the adapters must
//! therefore agree on one traversal order: head atom first, then body
//! literals in source order, children of a node in declaration order.

use crate::ast::{
    Aggregate, Argument, Atom, BinaryConstraint, BooleanConstraint, Clause, Literal, Negation,
    Variable,
};

/// A node encountered during traversal
#[derive(Clone, Copy)]
pub enum Node<'a> {
    Atom(&'a Atom),
    Negation(&'a Negation),
    Constraint(&'a BinaryConstraint),
    Boolean(&'a BooleanConstraint),
    Argument(&'a Argument),
}

/// Walk a clause in pre-order: head, then body literals in source order
pub fn walk_clause<'a>(clause: &'a Clause, f: &mut impl FnMut(Node<'a>)) {
    walk_atom(&clause.head, f);
    for lit in &clause.body {
        walk_literal(lit, f);
    }
}

pub fn walk_literal<'a>(lit: &'a Literal, f: &mut impl FnMut(Node<'a>)) {
    match lit {
        Literal::Atom(atom) => walk_atom(atom, f),
        Literal::Negation(neg) => {
            f(Node::Negation(neg));
            walk_atom(&neg.atom, f);
        }
        Literal::Constraint(c) => {
            f(Node::Constraint(c));
            walk_argument(&c.lhs, f);
            walk_argument(&c.rhs, f);
        }
        Literal::Boolean(b) => f(Node::Boolean(b)),
    }
}

fn walk_atom<'a>(atom: &'a Atom, f: &mut impl FnMut(Node<'a>)) {
    f(Node::Atom(atom));
    for arg in &atom.args {
        walk_argument(arg, f);
    }
}

pub fn walk_argument<'a>(arg: &'a Argument, f: &mut impl FnMut(Node<'a>)) {
    f(Node::Argument(arg));
    match arg {
        Argument::Intrinsic(fun) => {
            for arg in &fun.args {
                walk_argument(arg, f);
            }
        }
        Argument::UserDefined(fun) => {
            for arg in &fun.args {
                walk_argument(arg, f);
            }
        }
        Argument::Cast(cast) => walk_argument(&cast.value, f),
        Argument::Record(rec) => {
            for arg in &rec.args {
                walk_argument(arg, f);
            }
        }
        Argument::Aggregate(agg) => {
            if let Some(target) = &agg.target {
                walk_argument(target, f);
            }
            for lit in &agg.body {
                walk_literal(lit, f);
            }
        }
        Argument::Variable(_)
        | Argument::Unnamed(_)
        | Argument::Number(_)
        | Argument::Text(_)
        | Argument::Counter(_) => {}
    }
}

// ---------------------------------------------------------------------------
// Closure adapters
// ---------------------------------------------------------------------------

/// Every atom in the clause, head included, aggregates and negations included
pub fn visit_atoms_in_clause<'a>(clause: &'a Clause, f: &mut impl FnMut(&'a Atom)) {
    walk_clause(clause, &mut |node| {
        if let Node::Atom(atom) = node {
            f(atom)
        }
    });
}

/// Every atom below a sequence of body literals
pub fn visit_atoms_in_body<'a>(body: &'a [Literal], f: &mut impl FnMut(&'a Atom)) {
    for lit in body {
        walk_literal(lit, &mut |node| {
            if let Node::Atom(atom) = node {
                f(atom)
            }
        });
    }
}

pub fn visit_variables_in_clause<'a>(clause: &'a Clause, f: &mut impl FnMut(&'a Variable)) {
    walk_clause(clause, &mut |node| {
        if let Node::Argument(Argument::Variable(var)) = node {
            f(var)
        }
    });
}

pub fn visit_variables_in_literals<'a>(body: &'a [Literal], f: &mut impl FnMut(&'a Variable)) {
    for lit in body {
        walk_literal(lit, &mut |node| {
            if let Node::Argument(Argument::Variable(var)) = node {
                f(var)
            }
        });
    }
}

pub fn visit_variables_in_atom<'a>(atom: &'a Atom, f: &mut impl FnMut(&'a Variable)) {
    for arg in &atom.args {
        visit_variables_in_argument(arg, f);
    }
}

pub fn visit_variables_in_argument<'a>(arg: &'a Argument, f: &mut impl FnMut(&'a Variable)) {
    walk_argument(arg, &mut |node| {
        if let Node::Argument(Argument::Variable(var)) = node {
            f(var)
        }
    });
}

/// Every aggregate in the clause, nested ones included
pub fn visit_aggregates<'a>(clause: &'a Clause, f: &mut impl FnMut(&'a Aggregate)) {
    walk_clause(clause, &mut |node| {
        if let Node::Argument(Argument::Aggregate(agg)) = node {
            f(agg)
        }
    });
}

pub fn visit_constraints_in_clause<'a>(
    clause: &'a Clause,
    f: &mut impl FnMut(&'a BinaryConstraint),
) {
    walk_clause(clause, &mut |node| {
        if let Node::Constraint(c) = node {
            f(c)
        }
    });
}

pub fn visit_negations_in_clause<'a>(clause: &'a Clause, f: &mut impl FnMut(&'a Negation)) {
    walk_clause(clause, &mut |node| {
        if let Node::Negation(neg) = node {
            f(neg)
        }
    });
}

/// Argument nodes of a clause in pre-order, numbered from zero.
///
/// The index passed to the closure identifies the node across analyses of
/// the same (unmutated) clause.
pub fn for_each_arg_indexed<'a>(clause: &'a Clause, f: &mut impl FnMut(usize, &'a Argument)) {
    let mut next = 0usize;
    walk_clause(clause, &mut |node| {
        if let Node::Argument(arg) = node {
            f(next, arg);
            next += 1;
        }
    });
}

// ---------------------------------------------------------------------------
// In-place atom renaming
// ---------------------------------------------------------------------------

/// Apply `f` to every atom in the clause, head included, nested ones
/// included; `f` may change the atom's relation name but must not add or
/// remove arguments
pub fn rename_atoms_in_clause(clause: &mut Clause, f: &mut impl FnMut(&mut Atom)) {
    rename_atoms_in_atom(&mut clause.head, f);
    for lit in &mut clause.body {
        rename_atoms_in_literal(lit, f);
    }
}

pub fn rename_atoms_in_literal(lit: &mut Literal, f: &mut impl FnMut(&mut Atom)) {
    match lit {
        Literal::Atom(atom) => rename_atoms_in_atom(atom, f),
        Literal::Negation(neg) => rename_atoms_in_atom(&mut neg.atom, f),
        Literal::Constraint(c) => {
            rename_atoms_in_argument(&mut c.lhs, f);
            rename_atoms_in_argument(&mut c.rhs, f);
        }
        Literal::Boolean(_) => {}
    }
}

fn rename_atoms_in_atom(atom: &mut Atom, f: &mut impl FnMut(&mut Atom)) {
    f(atom);
    for arg in &mut atom.args {
        rename_atoms_in_argument(arg, f);
    }
}

fn rename_atoms_in_argument(arg: &mut Argument, f: &mut impl FnMut(&mut Atom)) {
    match arg {
        Argument::Intrinsic(fun) => {
            for arg in &mut fun.args {
                rename_atoms_in_argument(arg, f);
            }
        }
        Argument::UserDefined(fun) => {
            for arg in &mut fun.args {
                rename_atoms_in_argument(arg, f);
            }
        }
        Argument::Cast(cast) => rename_atoms_in_argument(&mut cast.value, f),
        Argument::Record(rec) => {
            for arg in &mut rec.args {
                rename_atoms_in_argument(arg, f);
            }
        }
        Argument::Aggregate(agg) => {
            if let Some(target) = &mut agg.target {
                rename_atoms_in_argument(target, f);
            }
            for lit in &mut agg.body {
                rename_atoms_in_literal(lit, f);
            }
        }
        _ => {}
    }
}
