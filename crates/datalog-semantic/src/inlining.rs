//! Inlining legality
//!
//! Relations marked `inline` are substituted into their callers by a later
//! pass; six situations make that substitution unsound or impossible and
//! are rejected here:
//!
//! 1. an inlined relation that is also an I/O relation
//! 2. a cycle consisting entirely of inlined relations
//! 3. the `$` counter in an inlined atom or in an inlined relation's clauses
//! 4. a negated inlined relation whose clauses introduce body-only variables
//! 5. a negated inlined atom containing a (non-aggregate) unnamed variable
//! 6. an inlined atom inside an aggregate body

use crate::diagnostics::ErrorReport;
use datalog_analysis::{IoTypes, PrecedenceGraph};
use datalog_ast::{
    visit_aggregates, visit_atoms_in_body, visit_atoms_in_clause, visit_negations_in_clause,
    visit_variables_in_atom, visit_variables_in_clause, walk_clause, Argument, Atom, Node,
    Program, QualifiedName,
};
use std::collections::BTreeSet;

pub fn check(
    program: &Program,
    precedence: &PrecedenceGraph,
    io: &IoTypes,
    report: &mut ErrorReport,
) {
    let inlined: BTreeSet<QualifiedName> = program
        .relations
        .values()
        .filter(|rel| rel.qualifiers.inline)
        .map(|rel| rel.name.clone())
        .collect();
    if inlined.is_empty() {
        return;
    }

    for name in &inlined {
        if io.is_io(name) {
            let relation = &program.relations[name];
            report.error(
                format!("IO relation {} cannot be inlined", name),
                relation.span,
            );
        }
    }

    check_cycle(program, precedence, &inlined, report);
    check_counters(program, &inlined, report);
    check_negated_body_variables(program, &inlined, report);
    check_negated_underscores(program, &inlined, report);
    check_aggregate_bodies(program, &inlined, report);
}

/// Reject a cycle within the inlined-only subgraph of the precedence graph
fn check_cycle(
    program: &Program,
    precedence: &PrecedenceGraph,
    inlined: &BTreeSet<QualifiedName>,
    report: &mut ErrorReport,
) {
    let mut visited: BTreeSet<QualifiedName> = BTreeSet::new();
    for start in inlined {
        if visited.contains(start) {
            continue;
        }
        let mut path: Vec<QualifiedName> = Vec::new();
        let mut on_path: BTreeSet<QualifiedName> = BTreeSet::new();
        if let Some(cycle) =
            find_cycle(precedence, inlined, start, &mut path, &mut on_path, &mut visited)
        {
            let listing = cycle
                .iter()
                .map(|name| name.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            let origin = &cycle[0];
            let span = program
                .relation(origin)
                .map(|rel| rel.span)
                .unwrap_or_else(datalog_ast::Span::none);
            report.error(
                format!("Cannot inline cyclically dependent relations {{{}}}", listing),
                span,
            );
            return;
        }
    }
}

fn find_cycle(
    precedence: &PrecedenceGraph,
    inlined: &BTreeSet<QualifiedName>,
    current: &QualifiedName,
    path: &mut Vec<QualifiedName>,
    on_path: &mut BTreeSet<QualifiedName>,
    visited: &mut BTreeSet<QualifiedName>,
) -> Option<Vec<QualifiedName>> {
    path.push(current.clone());
    on_path.insert(current.clone());

    for successor in precedence.successors(current) {
        if !inlined.contains(successor) {
            continue;
        }
        if on_path.contains(successor) {
            // Close the loop at the first repeated relation.
            let start = path.iter().position(|n| n == successor).unwrap();
            return Some(path[start..].to_vec());
        }
        if visited.contains(successor) {
            continue;
        }
        if let Some(cycle) = find_cycle(precedence, inlined, successor, path, on_path, visited) {
            return Some(cycle);
        }
    }

    on_path.remove(current);
    visited.insert(current.clone());
    path.pop();
    None
}

/// The `$` counter produces one value per evaluation; duplicating it by
/// inlining changes meaning
fn check_counters(program: &Program, inlined: &BTreeSet<QualifiedName>, report: &mut ErrorReport) {
    // In any atom referencing an inlined relation...
    for clause in &program.clauses {
        visit_atoms_in_clause(clause, &mut |atom| {
            if inlined.contains(&atom.relation) {
                for arg in &atom.args {
                    for_each_counter(arg, &mut |span| {
                        report.error("Cannot inline literal containing a counter argument '$'", span)
                    });
                }
            }
        });
    }

    // ...and in the clauses of the inlined relations themselves.
    for name in inlined {
        for (_, clause) in program.clauses_of(name) {
            walk_clause(clause, &mut |node| {
                if let Node::Argument(Argument::Counter(counter)) = node {
                    report.error(
                        "Cannot inline clause containing a counter argument '$'",
                        counter.span,
                    );
                }
            });
        }
    }
}

fn for_each_counter(arg: &Argument, f: &mut impl FnMut(datalog_ast::Span)) {
    datalog_ast::walk_argument(arg, &mut |node| {
        if let Node::Argument(Argument::Counter(counter)) = node {
            f(counter.span)
        }
    });
}

/// A negated inlined relation must not introduce variables its head does
/// not mention; inlining would leave them ungrounded under the negation
fn check_negated_body_variables(
    program: &Program,
    inlined: &BTreeSet<QualifiedName>,
    report: &mut ErrorReport,
) {
    let mut non_negatable: BTreeSet<QualifiedName> = BTreeSet::new();
    for name in inlined {
        'clauses: for (_, clause) in program.clauses_of(name) {
            let mut head_vars = BTreeSet::new();
            visit_variables_in_atom(&clause.head, &mut |v| {
                head_vars.insert(v.name);
            });
            let mut body_vars = BTreeSet::new();
            visit_variables_in_clause(clause, &mut |v| {
                body_vars.insert(v.name);
            });
            for var in body_vars {
                if !head_vars.contains(&var) {
                    non_negatable.insert(name.clone());
                    break 'clauses;
                }
            }
        }
    }

    for clause in &program.clauses {
        visit_negations_in_clause(clause, &mut |neg| {
            if non_negatable.contains(&neg.atom.relation) {
                report.error(
                    "Cannot inline negated relation which may introduce new variables",
                    neg.span,
                );
            }
        });
    }
}

/// Unnamed variables are named during inlining; under negation the fresh
/// names would be ungrounded. Underscores inside aggregates are exempt
/// (the aggregate grounds its own scope).
fn check_negated_underscores(
    program: &Program,
    inlined: &BTreeSet<QualifiedName>,
    report: &mut ErrorReport,
) {
    for clause in &program.clauses {
        visit_negations_in_clause(clause, &mut |neg| {
            if !inlined.contains(&neg.atom.relation) {
                return;
            }
            if let Some(span) = find_underscore_outside_aggregate(&neg.atom) {
                report.error(
                    "Cannot inline negated atom containing an unnamed variable unless the variable is within an aggregator",
                    span,
                );
            }
        });
    }
}

fn find_underscore_outside_aggregate(atom: &Atom) -> Option<datalog_ast::Span> {
    fn in_argument(arg: &Argument) -> Option<datalog_ast::Span> {
        match arg {
            Argument::Unnamed(u) => Some(u.span),
            Argument::Aggregate(_) => None,
            Argument::Intrinsic(fun) => fun.args.iter().find_map(in_argument),
            Argument::UserDefined(fun) => fun.args.iter().find_map(in_argument),
            Argument::Cast(cast) => in_argument(&cast.value),
            Argument::Record(rec) => rec.args.iter().find_map(in_argument),
            _ => None,
        }
    }
    atom.args.iter().find_map(in_argument)
}

/// Inlining a relation into an aggregate body changes the aggregate's
/// value (one body becomes several), so it is rejected outright
fn check_aggregate_bodies(
    program: &Program,
    inlined: &BTreeSet<QualifiedName>,
    report: &mut ErrorReport,
) {
    for clause in &program.clauses {
        visit_aggregates(clause, &mut |agg| {
            visit_atoms_in_body(&agg.body, &mut |atom| {
                if inlined.contains(&atom.relation) {
                    report.error("Cannot inline relations that appear in aggregator", atom.span);
                }
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datalog_analysis::PrecedenceGraph;
    use datalog_ast::{
        Aggregate, AggregateOp, Attribute, BinaryConstraint, Clause, ConstraintOp, Directive,
        DirectiveKind, Literal, Negation, Relation, Span, Unnamed,
    };
    use internment::Intern;

    fn attr(name: &str) -> Attribute {
        Attribute {
            name: Intern::new(name.to_string()),
            type_name: QualifiedName::number(),
            span: Span::none(),
        }
    }

    fn inline_relation(name: &str, arity: usize) -> Relation {
        let attrs = (0..arity).map(|i| attr(&format!("x{}", i))).collect();
        let mut rel = Relation::new(QualifiedName::from(name), attrs);
        rel.qualifiers.inline = true;
        rel
    }

    fn atom(name: &str, args: Vec<Argument>) -> Atom {
        Atom::new(QualifiedName::from(name), args)
    }

    fn run(program: &Program) -> ErrorReport {
        let precedence = PrecedenceGraph::analyse(program);
        let io = IoTypes::analyse(program);
        let mut report = ErrorReport::new();
        check(program, &precedence, &io, &mut report);
        report
    }

    #[test]
    fn test_io_relation_cannot_be_inlined() {
        let mut program = Program::new();
        program.add_relation(inline_relation("a", 1));
        program.add_directive(Directive::new(DirectiveKind::Output, QualifiedName::from("a")));
        let report = run(&program);
        assert!(report.diagnostics()[0]
            .message
            .contains("IO relation a cannot be inlined"));
    }

    #[test]
    fn test_inline_cycle() {
        let mut program = Program::new();
        program.add_relation(inline_relation("a", 1));
        program.add_relation(inline_relation("b", 1));
        program.add_clause(Clause::new(
            atom("a", vec![Argument::var("x")]),
            vec![Literal::Atom(atom("b", vec![Argument::var("x")]))],
        ));
        program.add_clause(Clause::new(
            atom("b", vec![Argument::var("x")]),
            vec![Literal::Atom(atom("a", vec![Argument::var("x")]))],
        ));
        let report = run(&program);
        assert!(report
            .diagnostics()
            .iter()
            .any(|d| d.message.contains("Cannot inline cyclically dependent relations")));
    }

    #[test]
    fn test_negated_inlined_relation_with_body_variables() {
        let mut program = Program::new();
        program.add_relation(inline_relation("a", 1));
        program.add_relation(Relation::new(QualifiedName::from("b"), vec![attr("x"), attr("y")]));
        program.add_relation(Relation::new(QualifiedName::from("q"), vec![attr("x")]));
        // a(x) :- b(x, y): y is body-only.
        program.add_clause(Clause::new(
            atom("a", vec![Argument::var("x")]),
            vec![Literal::Atom(atom(
                "b",
                vec![Argument::var("x"), Argument::var("y")],
            ))],
        ));
        // q(x) :- b(x, x), !a(x).
        program.add_clause(Clause::new(
            atom("q", vec![Argument::var("x")]),
            vec![
                Literal::Atom(atom("b", vec![Argument::var("x"), Argument::var("x")])),
                Literal::Negation(Negation {
                    atom: atom("a", vec![Argument::var("x")]),
                    span: Span::none(),
                }),
            ],
        ));
        let report = run(&program);
        assert!(report
            .diagnostics()
            .iter()
            .any(|d| d.message.contains("may introduce new variables")));
    }

    #[test]
    fn test_negated_inlined_atom_with_underscore() {
        let mut program = Program::new();
        program.add_relation(inline_relation("a", 2));
        program.add_relation(Relation::new(QualifiedName::from("q"), vec![attr("x")]));
        program.add_clause(Clause::new(
            atom("a", vec![Argument::var("x"), Argument::var("x")]),
            vec![],
        ));
        program.add_clause(Clause::new(
            atom("q", vec![Argument::var("x")]),
            vec![
                Literal::Atom(atom("a", vec![Argument::var("x"), Argument::var("x")])),
                Literal::Negation(Negation {
                    atom: atom(
                        "a",
                        vec![
                            Argument::var("x"),
                            Argument::Unnamed(Unnamed { span: Span::none() }),
                        ],
                    ),
                    span: Span::none(),
                }),
            ],
        ));
        let report = run(&program);
        assert!(report
            .diagnostics()
            .iter()
            .any(|d| d.message.contains("unnamed variable")));
    }

    #[test]
    fn test_inlined_atom_in_aggregate() {
        let mut program = Program::new();
        program.add_relation(inline_relation("a", 1));
        program.add_relation(Relation::new(QualifiedName::from("q"), vec![attr("x")]));
        program.add_clause(Clause::new(
            atom("q", vec![Argument::var("c")]),
            vec![Literal::Constraint(BinaryConstraint::new(
                ConstraintOp::Eq,
                Argument::var("c"),
                Argument::Aggregate(Aggregate {
                    op: AggregateOp::Count,
                    target: None,
                    body: vec![Literal::Atom(atom("a", vec![Argument::var("x")]))],
                    span: Span::none(),
                }),
            ))],
        ));
        let report = run(&program);
        assert!(report
            .diagnostics()
            .iter()
            .any(|d| d.message.contains("appear in aggregator")));
    }

    #[test]
    fn test_acyclic_inlining_is_fine() {
        let mut program = Program::new();
        program.add_relation(inline_relation("a", 1));
        program.add_relation(Relation::new(QualifiedName::from("b"), vec![attr("x")]));
        program.add_clause(Clause::new(
            atom("a", vec![Argument::var("x")]),
            vec![Literal::Atom(atom("b", vec![Argument::var("x")]))],
        ));
        let report = run(&program);
        assert_eq!(report.error_count(), 0);
    }
}
