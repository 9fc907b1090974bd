//! Aggregate-scope escape detection
//!
//! A variable bound only inside an aggregate's body must not be used as if
//! it were bound outside: the aggregate collapses its body to one value, so
//! there is no witness for the variable in the outer scope.
//!
//! Detection is differential. For each clause body, groundedness is
//! computed twice: once as written (aggregate bodies ground their
//! variables, which is exactly where the leak comes from) and once with
//! every aggregate replaced by a fresh variable that is forced grounded.
//! A variable grounded in the first but not the second can only have been
//! grounded through an aggregate's scope; report it. Each aggregate body
//! is then checked recursively, taking everything grounded at this level
//! as given.

use crate::diagnostics::ErrorReport;
use datalog_analysis::grounded_names;
use datalog_ast::{
    rewrite_args_in_literal, visit_variables_in_atom, visit_variables_in_literals, Aggregate,
    Argument, Atom, Literal, Negation, Program, QualifiedName, Span, Symbol, Variable,
};
use internment::Intern;
use std::collections::BTreeSet;

const MESSAGE: &str =
    "Witness problem: argument grounded by an aggregator's inner scope is used ungrounded in outer scope";

pub fn check(program: &Program, report: &mut ErrorReport) {
    for clause in &program.clauses {
        if clause.is_fact() {
            continue;
        }

        // Head variables are uses that need grounding but provide none;
        // a negated pseudo-atom models that exactly.
        let mut literals = clause.body.clone();
        let mut head_vars = Vec::new();
        visit_variables_in_atom(&clause.head, &mut |v| {
            head_vars.push(Argument::Variable(v.clone()))
        });
        literals.push(Literal::Negation(Negation {
            atom: Atom::new(QualifiedName::from("@head_scope"), head_vars),
            span: Span::none(),
        }));

        let mut counter = 0u64;
        check_literals(&literals, &BTreeSet::new(), &mut counter, report);
    }
}

fn check_literals(
    literals: &[Literal],
    given: &BTreeSet<Symbol>,
    counter: &mut u64,
    report: &mut ErrorReport,
) {
    let with_aggregates = grounded_names(literals, given);

    // The aggregate-free twin: every aggregate becomes a fresh variable
    // that is grounded by fiat.
    let mut replaced = literals.to_vec();
    let mut forced = given.clone();
    for lit in &mut replaced {
        rewrite_args_in_literal(lit, &mut |arg| match arg {
            Argument::Aggregate(agg) => {
                let name = Intern::new(format!("+aggr_var_{}", counter));
                *counter += 1;
                forced.insert(name);
                Some(Argument::Variable(Variable {
                    name,
                    span: agg.span,
                }))
            }
            _ => None,
        });
    }
    let without_aggregates = grounded_names(&replaced, &forced);

    // Variables visible outside aggregate scope, in occurrence order.
    let mut seen = BTreeSet::new();
    let mut outer_vars: Vec<(Symbol, Span)> = Vec::new();
    visit_variables_in_literals(&replaced, &mut |var| {
        if seen.insert(var.name) {
            outer_vars.push((var.name, var.span));
        }
    });

    for (name, span) in &outer_vars {
        if with_aggregates.contains(name) && !without_aggregates.contains(name) {
            report.error(MESSAGE, *span);
        }
    }

    // Everything visible at this level counts as given inside the bodies.
    let mut given_below = given.clone();
    given_below.extend(outer_vars.iter().map(|(name, _)| *name));

    for lit in literals {
        visit_top_level_aggregates(lit, &mut |agg| {
            check_literals(&agg.body, &given_below, counter, report);
        });
    }
}

/// Aggregates of a literal that are not nested inside another aggregate
fn visit_top_level_aggregates<'a>(lit: &'a Literal, f: &mut impl FnMut(&'a Aggregate)) {
    fn in_argument<'a>(arg: &'a Argument, f: &mut impl FnMut(&'a Aggregate)) {
        match arg {
            Argument::Aggregate(agg) => f(agg),
            Argument::Intrinsic(fun) => fun.args.iter().for_each(|a| in_argument(a, f)),
            Argument::UserDefined(fun) => fun.args.iter().for_each(|a| in_argument(a, f)),
            Argument::Cast(cast) => in_argument(&cast.value, f),
            Argument::Record(rec) => rec.args.iter().for_each(|a| in_argument(a, f)),
            _ => {}
        }
    }
    match lit {
        Literal::Atom(atom) => atom.args.iter().for_each(|a| in_argument(a, f)),
        Literal::Negation(neg) => neg.atom.args.iter().for_each(|a| in_argument(a, f)),
        Literal::Constraint(c) => {
            in_argument(&c.lhs, f);
            in_argument(&c.rhs, f);
        }
        Literal::Boolean(_) => {}
    }
}
