//! Stratification of negation and aggregation
//!
//! A relation that can reach itself in the precedence graph lives in a
//! recursive clique. If any clause inside the clique negates or aggregates
//! over a member of that same clique, no stratum ordering can evaluate the
//! negation after its target is complete, and the program is rejected.
//! The diagnostic links both the relation and the literal closing the
//! cycle.

use crate::diagnostics::{Diagnostic, ErrorReport};
use datalog_analysis::PrecedenceGraph;
use datalog_ast::{
    visit_aggregates, visit_atoms_in_body, visit_negations_in_clause, Program, QualifiedName, Span,
};

pub fn check(program: &Program, precedence: &PrecedenceGraph, report: &mut ErrorReport) {
    let vertices: Vec<QualifiedName> = precedence.vertices().cloned().collect();
    for current in &vertices {
        if !precedence.reaches(current, current) {
            continue;
        }
        let clique = precedence.clique(current);
        for member in &clique {
            let negation = clause_with_negation_of(program, member, current);
            let aggregation = clause_with_aggregation_of(program, member, current);
            let (what, span) = match (negation, aggregation) {
                (Some(span), _) => ("negation", span),
                (None, Some(span)) => ("aggregation", span),
                (None, None) => continue,
            };

            let listing = clique
                .iter()
                .map(|name| name.to_string())
                .collect::<Vec<_>>()
                .join(",");
            let relation_span = program
                .relation(current)
                .map(|rel| rel.span)
                .unwrap_or_else(Span::none);
            report.add(
                Diagnostic::error(
                    format!("Unable to stratify relation(s) {{{}}}", listing),
                    relation_span,
                )
                .with_note(format!("Relation {}", current), relation_span)
                .with_note(format!("has cyclic {}", what), span),
            );
            break;
        }
    }
}

/// A clause of `owner` negating `target`, if any
fn clause_with_negation_of(
    program: &Program,
    owner: &QualifiedName,
    target: &QualifiedName,
) -> Option<Span> {
    for (_, clause) in program.clauses_of(owner) {
        let mut found = None;
        visit_negations_in_clause(clause, &mut |neg| {
            if &neg.atom.relation == target && found.is_none() {
                found = Some(neg.span);
            }
        });
        if found.is_some() {
            return found;
        }
    }
    None
}

/// A clause of `owner` aggregating over `target`, if any
fn clause_with_aggregation_of(
    program: &Program,
    owner: &QualifiedName,
    target: &QualifiedName,
) -> Option<Span> {
    for (_, clause) in program.clauses_of(owner) {
        let mut found = None;
        visit_aggregates(clause, &mut |agg| {
            visit_atoms_in_body(&agg.body, &mut |atom| {
                if &atom.relation == target && found.is_none() {
                    found = Some(agg.span);
                }
            });
        });
        if found.is_some() {
            return found;
        }
    }
    None
}
