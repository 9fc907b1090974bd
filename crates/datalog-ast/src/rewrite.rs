//! Owning argument rewriting
//!
//! The rewriter applies a mapper to every argument node in post-order:
//! children are rewritten first, then the mapper sees the (already
//! rewritten) node and may return a replacement, which takes the node's
//! place in its owner. Returning `None` keeps the node.
//!
//! Post-order plus ownership transfer means a mapper never observes a
//! half-replaced subtree, and the replaced value is dropped immediately.

use crate::ast::{Argument, Clause, Literal};

/// Rewrite every argument node of the clause, head included
pub fn rewrite_args_in_clause(
    clause: &mut Clause,
    f: &mut impl FnMut(&Argument) -> Option<Argument>,
) {
    for arg in &mut clause.head.args {
        rewrite_argument(arg, f);
    }
    for lit in &mut clause.body {
        rewrite_args_in_literal(lit, f);
    }
}

pub fn rewrite_args_in_literal(lit: &mut Literal, f: &mut impl FnMut(&Argument) -> Option<Argument>) {
    match lit {
        Literal::Atom(atom) => {
            for arg in &mut atom.args {
                rewrite_argument(arg, f);
            }
        }
        Literal::Negation(neg) => {
            for arg in &mut neg.atom.args {
                rewrite_argument(arg, f);
            }
        }
        Literal::Constraint(c) => {
            rewrite_argument(&mut c.lhs, f);
            rewrite_argument(&mut c.rhs, f);
        }
        Literal::Boolean(_) => {}
    }
}

fn rewrite_argument(arg: &mut Argument, f: &mut impl FnMut(&Argument) -> Option<Argument>) {
    match arg {
        Argument::Intrinsic(fun) => {
            for arg in &mut fun.args {
                rewrite_argument(arg, f);
            }
        }
        Argument::UserDefined(fun) => {
            for arg in &mut fun.args {
                rewrite_argument(arg, f);
            }
        }
        Argument::Cast(cast) => rewrite_argument(&mut cast.value, f),
        Argument::Record(rec) => {
            for arg in &mut rec.args {
                rewrite_argument(arg, f);
            }
        }
        Argument::Aggregate(agg) => {
            if let Some(target) = &mut agg.target {
                rewrite_argument(target, f);
            }
            for lit in &mut agg.body {
                rewrite_args_in_literal(lit, f);
            }
        }
        _ => {}
    }
    if let Some(replacement) = f(arg) {
        *arg = replacement;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Atom, FunctorOp, IntrinsicFunctor};
    use crate::name::QualifiedName;
    use crate::span::Span;

    #[test]
    fn test_rewrite_is_post_order() {
        // f(1, 2) with a mapper that doubles numbers and then sums constant
        // functors; post-order means the doubling is visible to the sum.
        let mut clause = Clause::new(
            Atom::new(
                QualifiedName::from("a"),
                vec![Argument::Intrinsic(IntrinsicFunctor {
                    op: FunctorOp::Add,
                    args: vec![Argument::number(1), Argument::number(2)],
                    span: Span::none(),
                })],
            ),
            vec![],
        );

        rewrite_args_in_clause(&mut clause, &mut |arg| match arg {
            Argument::Number(n) => Some(Argument::number(n.value * 2)),
            Argument::Intrinsic(fun) if fun.op == FunctorOp::Add => {
                let mut sum = 0;
                for arg in &fun.args {
                    match arg {
                        Argument::Number(n) => sum += n.value,
                        _ => return None,
                    }
                }
                Some(Argument::number(sum))
            }
            _ => None,
        });

        assert_eq!(clause.head.args, vec![Argument::number(6)]);
    }

    #[test]
    fn test_rewrite_inside_aggregate() {
        use crate::ast::{Aggregate, AggregateOp};
        let mut clause = Clause::new(
            Atom::new(QualifiedName::from("a"), vec![Argument::var("x")]),
            vec![Literal::Atom(Atom::new(
                QualifiedName::from("b"),
                vec![Argument::Aggregate(Aggregate {
                    op: AggregateOp::Count,
                    target: None,
                    body: vec![Literal::Atom(Atom::new(
                        QualifiedName::from("c"),
                        vec![Argument::number(7)],
                    ))],
                    span: Span::none(),
                })],
            ))],
        );

        rewrite_args_in_clause(&mut clause, &mut |arg| match arg {
            Argument::Number(_) => Some(Argument::var("lifted")),
            _ => None,
        });

        let mut found = false;
        crate::visit::visit_variables_in_clause(&clause, &mut |v| {
            found |= v.name.as_ref() == "lifted";
        });
        assert!(found);
    }
}
