//! Checker entry point and whole-program passes

use crate::diagnostics::ErrorReport;
use crate::{clauses, decls, inlining, stratification, typecheck, witness};
use datalog_analysis::{IoTypes, PrecedenceGraph, RecursiveClauses, SccGraph, TypeEnvironment};
use datalog_ast::{name_matches, Config, Program, Span};
use log::debug;
use std::collections::BTreeMap;

/// Facts about the program the driver acts on after checking
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckSummary {
    /// A record type is used somewhere; the subprogram engine cannot
    /// compile records, so the driver clears the `engine` option
    pub uses_records: bool,
}

/// Run every validation pass, accumulating diagnostics into `report`.
///
/// Takes the program mutably only to set `suppressed` qualifiers from the
/// configuration; no other mutation happens here.
pub fn check_program(
    program: &mut Program,
    config: &Config,
    report: &mut ErrorReport,
) -> CheckSummary {
    apply_suppression(program, config);

    let io = IoTypes::analyse(program);
    let precedence = PrecedenceGraph::analyse(program);
    let sccs = SccGraph::analyse(&precedence);
    let recursive = RecursiveClauses::analyse(program, &sccs);
    let env = TypeEnvironment::analyse(program);

    debug!("checking {} clauses", program.clauses.len());

    decls::check_types(program, report);
    decls::check_relations(program, &env, &io, report);
    clauses::check_clauses(program, &recursive, report);
    check_namespaces(program, report);
    check_directives(program, report);
    witness::check(program, report);
    inlining::check(program, &precedence, &io, report);
    let uses_records = typecheck::check(program, &env, report);
    stratification::check(program, &precedence, report);

    debug!(
        "checking done: {} errors, {} warnings",
        report.error_count(),
        report.warning_count()
    );

    CheckSummary {
        uses_records: uses_records || decls::any_record_attribute(program, &env),
    }
}

/// Mark relations matched by the suppress-warnings globs
fn apply_suppression(program: &mut Program, config: &Config) {
    let patterns = config.suppressed_patterns();
    if patterns.is_empty() {
        return;
    }
    for relation in program.relations.values_mut() {
        let name = relation.name.to_string();
        if patterns.iter().any(|p| name_matches(&name, p)) {
            relation.qualifiers.suppressed = true;
        }
    }
}

/// Types and relations share one namespace
fn check_namespaces(program: &Program, report: &mut ErrorReport) {
    let mut names: BTreeMap<String, Span> = BTreeMap::new();

    for (name, decl) in &program.types {
        names.insert(name.to_string(), decl.span());
    }
    for (name, relation) in &program.relations {
        let key = name.to_string();
        if names.contains_key(&key) {
            report.error(format!("Name clash on relation {}", name), relation.span);
        } else {
            names.insert(key, relation.span);
        }
    }
}

/// Every I/O directive must target a declared relation
fn check_directives(program: &Program, report: &mut ErrorReport) {
    for directive in &program.directives {
        if program.relation(&directive.relation).is_none() {
            report.error(
                format!("Undefined relation {}", directive.relation),
                directive.span,
            );
        }
    }
}
