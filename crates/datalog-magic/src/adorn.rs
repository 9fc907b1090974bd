//! Adornment
//!
//! Specialises every reachable predicate occurrence to the binding pattern
//! it is called with: a string over `b`/`f`, one character per argument
//! position. Propagation is queue-driven, starting from the observed
//! (output and printsize) relations with the empty pattern; each clause is
//! adorned by consuming its body atoms in SIPS order, which discovers new
//! `(relation, pattern)` pairs to process.
//!
//! Some relations are never specialised and keep the empty adornment:
//! those the configuration does not select, those known in constant time
//! (inputs and fact-only relations), labelled copies (`@neglabel`),
//! relations whose clauses use float orderings or order-dependent functor
//! operations, equivalence relations, and relations with a user-supplied
//! execution plan. Their clauses still have their bodies adorned.
//!
//! Every processed relation's original clauses are replaced by the adorned
//! copies; negated occurrences were moved to labelled (ignored) relations
//! by the label pass, so dropping the originals is sound.

use crate::names::{adornment_id, adornment_of, is_magic, is_negatively_labelled};
use crate::sips::{BindingStore, SipsStrategy};
use datalog_analysis::IoTypes;
use datalog_ast::{
    name_matches, visit_atoms_in_clause, visit_constraints_in_clause, visit_variables_in_atom,
    Atom, Clause, Config, ConstraintOp, Literal, Node, Program, QualifiedName, Relation,
    Representation,
};
use std::collections::BTreeSet;

pub fn adorn(program: &mut Program, config: &Config, sips: SipsStrategy) -> bool {
    let io = IoTypes::analyse(program);
    let ignored = ignored_relations(program, config, &io);
    let constant_time = constant_time_relations(program, &io);

    // Worklist of (relation, adornment marker); a BTreeSet keeps the
    // processing order independent of discovery order.
    let mut todo: BTreeSet<(QualifiedName, String)> = BTreeSet::new();
    let mut seen: BTreeSet<QualifiedName> = BTreeSet::new();

    for name in program.relations.keys() {
        if io.is_observed(name) || ignored.contains(name) {
            todo.insert((name.clone(), String::new()));
            seen.insert(name.clone());
        }
    }

    let mut adorned_clauses: Vec<Clause> = Vec::new();
    let mut relations_to_add: Vec<Relation> = Vec::new();
    let mut redundant: BTreeSet<usize> = BTreeSet::new();

    while let Some((rel_name, marker)) = pop_first(&mut todo) {
        let relation = program
            .relation(&rel_name)
            .expect("adorned relation must be declared")
            .clone();
        if !marker.is_empty() {
            assert_eq!(marker.len(), relation.arity(), "adornment must match arity");
            relations_to_add.push(relation.renamed(adornment_id(&rel_name, &marker)));
        }

        for (index, clause) in program.clauses_of(&rel_name) {
            redundant.insert(index);
            adorned_clauses.push(adorn_clause(
                clause,
                &marker,
                &ignored,
                &constant_time,
                sips,
                &mut todo,
                &mut seen,
            ));
        }
    }

    let changed = !redundant.is_empty() || !relations_to_add.is_empty();
    let indices: Vec<usize> = redundant.into_iter().collect();
    program.remove_clauses(&indices);
    program.clauses.extend(adorned_clauses);
    for relation in relations_to_add {
        program.add_relation(relation);
    }
    changed
}

fn pop_first(todo: &mut BTreeSet<(QualifiedName, String)>) -> Option<(QualifiedName, String)> {
    let first = todo.iter().next().cloned()?;
    todo.remove(&first);
    Some(first)
}

/// Relations kept at the empty adornment
fn ignored_relations(
    program: &Program,
    config: &Config,
    io: &IoTypes,
) -> BTreeSet<QualifiedName> {
    let mut ignored = BTreeSet::new();
    let patterns = config.magic_patterns();

    // Deselected by configuration (a bare `*` selects everything); the
    // `magic` qualifier opts in regardless, `no_magic` opts out.
    for relation in program.relations.values() {
        let name = relation.name.to_string();
        let selected = relation.qualifiers.magic
            || patterns.iter().any(|p| *p == "*" || name_matches(&name, p));
        if !selected || relation.qualifiers.no_magic {
            ignored.insert(relation.name.clone());
        }
    }

    // Known in constant time.
    ignored.extend(constant_time_relations(program, io));

    // Already-specialised copies and demand predicates from an earlier run
    // are final; re-adorning them would stack markers.
    for name in program.relations.keys() {
        if adornment_of(name).is_some() || is_magic(name) {
            ignored.insert(name.clone());
        }
    }

    // Labelled copies serve negation and must stay unrestricted.
    let mut labelled = BTreeSet::new();
    for clause in &program.clauses {
        visit_atoms_in_clause(clause, &mut |atom| {
            if is_negatively_labelled(&atom.relation) {
                labelled.insert(atom.relation.clone());
            }
        });
    }
    ignored.extend(labelled);

    // Order-dependent arithmetic makes specialised re-evaluation unsound.
    for clause in &program.clauses {
        let mut order_dependent = false;
        datalog_ast::walk_clause(clause, &mut |node| match node {
            Node::Constraint(c) => order_dependent |= c.op.is_float_ordering(),
            Node::Argument(datalog_ast::Argument::Intrinsic(fun)) => {
                order_dependent |= fun.op.is_order_dependent()
            }
            _ => {}
        });
        if order_dependent {
            ignored.insert(clause.head.relation.clone());
        }
    }

    // Equivalence relations have closure semantics of their own.
    for relation in program.relations.values() {
        if relation.representation == Representation::Eqrel {
            ignored.insert(relation.name.clone());
        }
    }

    // User-supplied execution plans refer to body positions as written.
    for clause in &program.clauses {
        if clause.plan.is_some() {
            ignored.insert(clause.head.relation.clone());
        }
    }

    ignored
}

/// Inputs and fact-only relations: no specialisation can speed them up
fn constant_time_relations(program: &Program, io: &IoTypes) -> BTreeSet<QualifiedName> {
    program
        .relations
        .keys()
        .filter(|name| {
            io.is_input(name)
                || !program
                    .clauses_of(name)
                    .any(|(_, clause)| clause.body_atoms().next().is_some())
        })
        .cloned()
        .collect()
}

fn adorn_clause(
    clause: &Clause,
    marker: &str,
    ignored: &BTreeSet<QualifiedName>,
    constant_time: &BTreeSet<QualifiedName>,
    sips: SipsStrategy,
    todo: &mut BTreeSet<(QualifiedName, String)>,
    seen: &mut BTreeSet<QualifiedName>,
) -> Clause {
    let mut bindings = BindingStore::default();

    // Bound head positions bind their variables.
    if !marker.is_empty() {
        assert_eq!(
            marker.len(),
            clause.head.arity(),
            "adornment must match head arity"
        );
        for (arg, flag) in clause.head.args.iter().zip(marker.chars()) {
            if flag == 'b' {
                let var = arg
                    .as_variable()
                    .expect("head arguments must be variables after normalisation");
                bindings.bind(var.name);
            }
        }
    }

    // `var = constant` equalities seed further bindings.
    visit_constraints_in_clause(clause, &mut |c| {
        if c.op == ConstraintOp::Eq {
            if let Some(var) = c.lhs.as_variable() {
                if c.rhs.is_constant() {
                    bindings.bind(var.name);
                }
            }
        }
    });

    // Consume body atoms in SIPS order; everything else follows in source
    // order. Clauses with an execution plan keep their atom order.
    let mut remaining: Vec<Atom> = clause.body_atoms().cloned().collect();
    let others: Vec<Literal> = clause
        .body
        .iter()
        .filter(|lit| !lit.is_positive_atom())
        .cloned()
        .collect();

    let mut new_body: Vec<Literal> = Vec::new();
    let is_constant_time = |name: &QualifiedName| constant_time.contains(name);
    while !remaining.is_empty() {
        let pick = if clause.plan.is_some() {
            0
        } else {
            sips.select(&remaining, &bindings, &is_constant_time)
        };
        let atom = remaining.remove(pick);

        let mut adorned = atom.clone();
        if !ignored.contains(&atom.relation) {
            let atom_marker: String = atom
                .args
                .iter()
                .map(|arg| if bindings.is_argument_bound(arg) { 'b' } else { 'f' })
                .collect();
            let id = adornment_id(&atom.relation, &atom_marker);
            adorned.relation = id.clone();
            if seen.insert(id) {
                todo.insert((atom.relation.clone(), atom_marker));
            }
        }
        visit_variables_in_atom(&atom, &mut |var| bindings.bind(var.name));
        new_body.push(Literal::Atom(adorned));
    }
    new_body.extend(others);

    let head_name = if marker.is_empty() {
        clause.head.relation.clone()
    } else {
        adornment_id(&clause.head.relation, marker)
    };
    Clause {
        head: Atom {
            relation: head_name,
            args: clause.head.args.clone(),
            span: clause.head.span,
        },
        body: new_body,
        plan: clause.plan.clone(),
        generated: clause.generated,
        span: clause.span,
    }
}
