//! Labelling
//!
//! Demand restriction must not change what a negation or an aggregate
//! observes: those constructs need the full extent of the relations they
//! read. Labelling moves every such read onto copies that the adorn pass
//! leaves unrestricted.
//!
//! **Negative labelling** renames each negated or aggregated occurrence of
//! a non-input relation to `@neglabel.<R>` and copies the defining clauses
//! over, relabelling the atoms that share the relation's component so the
//! copied recursion closes over itself.
//!
//! **Positive labelling** walks the strata bottom-up. A stratum made of
//! labelled copies still reads unlabelled lower strata; those lower strata
//! are duplicated per reading negation boundary under `@poscopy_<k>.<R>`
//! names, and the labelled clauses are redirected to the copies. Copy
//! counts advance in lockstep across strata, so the `<k>` in a body
//! reference always matches a head emitted in the same round.

use crate::names::{is_negatively_labelled, is_positively_labelled, negative_label};
use datalog_analysis::{IoTypes, PrecedenceGraph, SccGraph};
use datalog_ast::{
    rename_atoms_in_clause, Argument, Clause, Literal, Program, QualifiedName,
};
use std::collections::{BTreeMap, BTreeSet};

pub fn label(program: &mut Program) -> bool {
    let negative = negative_labelling(program);
    let positive = positive_labelling(program);
    negative || positive
}

fn negative_labelling(program: &mut Program) -> bool {
    let io = IoTypes::analyse(program);
    let precedence = PrecedenceGraph::analyse(program);
    let sccs = SccGraph::analyse(&precedence);

    // Rename reads under negation and inside aggregate bodies.
    let mut scheduled: BTreeSet<QualifiedName> = BTreeSet::new();
    for clause in &mut program.clauses {
        for lit in &mut clause.body {
            relabel_reads_in_literal(lit, false, &io, &mut scheduled);
        }
    }
    if scheduled.is_empty() {
        return false;
    }

    // Copy the defining clauses of every scheduled relation, closing the
    // copied recursion within each component.
    let mut queue = scheduled;
    let mut processed: BTreeSet<QualifiedName> = BTreeSet::new();
    let mut copies: Vec<Clause> = Vec::new();
    while let Some(rel) = pop_first(&mut queue) {
        if !processed.insert(rel.clone()) {
            continue;
        }
        let members: BTreeSet<QualifiedName> = match sccs.scc_of(&rel) {
            Some(stratum) => sccs.relations_in(stratum).iter().cloned().collect(),
            None => std::iter::once(rel.clone()).collect(),
        };

        let originals: Vec<Clause> = program
            .clauses_of(&rel)
            .map(|(_, clause)| clause.clone())
            .collect();
        for mut copy in originals {
            copy.generated = true;
            rename_atoms_in_clause(&mut copy, &mut |atom| {
                if members.contains(&atom.relation) {
                    if !processed.contains(&atom.relation) {
                        queue.insert(atom.relation.clone());
                    }
                    atom.relation = negative_label(&atom.relation);
                }
            });
            copies.push(copy);
        }
    }

    for name in &processed {
        if let Some(relation) = program.relation(name) {
            let labelled = relation.renamed(negative_label(name));
            program.add_relation(labelled);
        }
    }
    program.clauses.extend(copies);
    true
}

/// Rename the atoms this literal reads under negation (or, with
/// `in_aggregate`, anywhere) to their labelled copies
fn relabel_reads_in_literal(
    lit: &mut Literal,
    in_aggregate: bool,
    io: &IoTypes,
    scheduled: &mut BTreeSet<QualifiedName>,
) {
    let mut relabel = |atom: &mut datalog_ast::Atom| {
        if io.is_input(&atom.relation) || is_negatively_labelled(&atom.relation) {
            return;
        }
        scheduled.insert(atom.relation.clone());
        atom.relation = negative_label(&atom.relation);
    };
    match lit {
        Literal::Atom(atom) => {
            if in_aggregate {
                relabel(atom);
            }
            for arg in &mut atom.args {
                relabel_reads_in_argument(arg, io, scheduled);
            }
        }
        Literal::Negation(neg) => {
            relabel(&mut neg.atom);
            for arg in &mut neg.atom.args {
                relabel_reads_in_argument(arg, io, scheduled);
            }
        }
        Literal::Constraint(c) => {
            relabel_reads_in_argument(&mut c.lhs, io, scheduled);
            relabel_reads_in_argument(&mut c.rhs, io, scheduled);
        }
        Literal::Boolean(_) => {}
    }
}

fn relabel_reads_in_argument(
    arg: &mut Argument,
    io: &IoTypes,
    scheduled: &mut BTreeSet<QualifiedName>,
) {
    match arg {
        Argument::Aggregate(agg) => {
            for lit in &mut agg.body {
                relabel_reads_in_literal(lit, true, io, scheduled);
            }
        }
        Argument::Intrinsic(fun) => {
            for arg in &mut fun.args {
                relabel_reads_in_argument(arg, io, scheduled);
            }
        }
        Argument::UserDefined(fun) => {
            for arg in &mut fun.args {
                relabel_reads_in_argument(arg, io, scheduled);
            }
        }
        Argument::Cast(cast) => relabel_reads_in_argument(&mut cast.value, io, scheduled),
        Argument::Record(rec) => {
            for arg in &mut rec.args {
                relabel_reads_in_argument(arg, io, scheduled);
            }
        }
        _ => {}
    }
}

fn positive_labelling(program: &mut Program) -> bool {
    let io = IoTypes::analyse(program);
    let precedence = PrecedenceGraph::analyse(program);
    let sccs = SccGraph::analyse(&precedence);

    // Strata consisting of labelled copies.
    let mut labelled_strata: BTreeSet<usize> = BTreeSet::new();
    for stratum in 0..sccs.len() {
        let members = sccs.relations_in(stratum);
        let labelled = members.iter().filter(|n| is_negatively_labelled(n)).count();
        debug_assert!(
            labelled == 0 || labelled == members.len(),
            "stratum must not mix labelled and unlabelled relations"
        );
        if labelled > 0 {
            labelled_strata.insert(stratum);
        }
    }
    if labelled_strata.is_empty() {
        return false;
    }

    // depends_on[s] = strata reachable from s's relations.
    let mut depends_on: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    for stratum in 0..sccs.len() {
        let mut reached = BTreeSet::new();
        for rel in sccs.relations_in(stratum) {
            let mut stack: Vec<QualifiedName> = precedence.successors(rel).cloned().collect();
            let mut seen: BTreeSet<QualifiedName> = BTreeSet::new();
            while let Some(current) = stack.pop() {
                if !seen.insert(current.clone()) {
                    continue;
                }
                if let Some(s) = sccs.scc_of(&current) {
                    reached.insert(s);
                }
                stack.extend(precedence.successors(&current).cloned());
            }
        }
        depends_on.insert(stratum, reached);
    }

    let mut copy_count: BTreeMap<usize, usize> = (0..sccs.len())
        .filter(|s| !labelled_strata.contains(s))
        .map(|s| (s, 0))
        .collect();
    let mut new_clauses: Vec<Clause> = Vec::new();
    let mut changed = false;

    for stratum in 0..sccs.len() {
        if !labelled_strata.contains(&stratum) {
            continue;
        }

        // Redirect this stratum's clauses to the upcoming round of copies.
        // Inputs stay shared; labelled and already-copied names are final.
        let members: BTreeSet<QualifiedName> =
            sccs.relations_in(stratum).iter().cloned().collect();
        let mut redirected_strata: BTreeSet<usize> = BTreeSet::new();
        for clause in &mut program.clauses {
            if !members.contains(&clause.head.relation) {
                continue;
            }
            rename_atoms_in_clause(clause, &mut |atom| {
                if io.is_input(&atom.relation)
                    || is_negatively_labelled(&atom.relation)
                    || is_positively_labelled(&atom.relation)
                {
                    return;
                }
                if let Some(s) = sccs.scc_of(&atom.relation) {
                    let copy = copy_count.get(&s).copied().unwrap_or(0) + 1;
                    atom.relation = crate::names::positive_copy(&atom.relation, copy);
                    redirected_strata.insert(s);
                    changed = true;
                }
            });
        }

        // Produce that round of copies: the redirected strata and
        // everything they depend on.
        let mut copy_set = redirected_strata.clone();
        for &s in &redirected_strata {
            copy_set.extend(depends_on[&s].iter().copied());
        }
        for pre in (0..stratum).rev() {
            if labelled_strata.contains(&pre) || !copy_set.contains(&pre) {
                continue;
            }
            for rel in sccs.relations_in(pre) {
                if io.is_input(rel) {
                    continue;
                }
                let originals: Vec<Clause> = program
                    .clauses_of(rel)
                    .map(|(_, clause)| clause.clone())
                    .collect();
                for mut copy in originals {
                    copy.generated = true;
                    rename_atoms_in_clause(&mut copy, &mut |atom| {
                        if io.is_input(&atom.relation)
                            || is_negatively_labelled(&atom.relation)
                            || is_positively_labelled(&atom.relation)
                        {
                            return;
                        }
                        if let Some(s) = sccs.scc_of(&atom.relation) {
                            let k = copy_count.get(&s).copied().unwrap_or(0) + 1;
                            atom.relation = crate::names::positive_copy(&atom.relation, k);
                        }
                    });
                    new_clauses.push(copy);
                }
            }
            *copy_count.get_mut(&pre).expect("unlabelled stratum") += 1;
            changed = true;
        }
    }

    // Declare the copies.
    let mut to_declare: Vec<datalog_ast::Relation> = Vec::new();
    for (&stratum, &count) in &copy_count {
        for copy in 1..=count {
            for rel in sccs.relations_in(stratum) {
                if io.is_input(rel) {
                    continue;
                }
                if let Some(relation) = program.relation(rel) {
                    to_declare.push(relation.renamed(crate::names::positive_copy(rel, copy)));
                }
            }
        }
    }
    for relation in to_declare {
        program.add_relation(relation);
    }
    program.clauses.extend(new_clauses);

    changed
}

fn pop_first(set: &mut BTreeSet<QualifiedName>) -> Option<QualifiedName> {
    let first = set.iter().next().cloned()?;
    set.remove(&first);
    Some(first)
}
