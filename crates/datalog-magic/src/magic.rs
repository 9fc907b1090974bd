//! The core demand transformation
//!
//! For every clause with an adorned head `H^a :- B1, ..., Bn`:
//!
//! - the clause is **refined** to `H^a :- @magic.H^a, B1, ..., Bn`, where
//!   the magic atom carries exactly the bound positions of the head;
//! - for each adorned body atom `Bi^ai`, a **supplementary rule**
//!   `@magic.Bi^ai(bound) :- @magic.H^a(bound), B1, ..., Bi-1, eqs` is
//!   emitted, where `eqs` are the clause's equalities whose variables are
//!   already bound to the left of `Bi` (record equalities close over
//!   their variables first).
//!
//! Clauses with unadorned heads pass through unchanged; an adorned body
//! atom in such a clause still gets its supplementary rule, which for an
//! all-free pattern at the leftmost position degenerates to a seed fact —
//! the query itself is relevant.
//!
//! Each magic relation is declared once, its attributes taken from the
//! bound positions of the adorned relation.

use crate::names::{adornment_of, is_magic, magic_name};
use datalog_ast::{
    visit_variables_in_argument, walk_argument, Argument, Atom, BinaryConstraint, Clause,
    ConstraintOp, Literal, Node, Program, QualifiedName, Relation, Symbol,
};
use std::collections::BTreeSet;

pub fn magic(program: &mut Program) -> bool {
    // Demand relations present before this run already have their rules.
    let preexisting: BTreeSet<QualifiedName> = program
        .relations
        .keys()
        .filter(|name| is_magic(name))
        .cloned()
        .collect();
    let mut declared: BTreeSet<QualifiedName> = BTreeSet::new();
    let mut new_relations: Vec<Relation> = Vec::new();
    let mut new_clauses: Vec<Clause> = Vec::new();
    let mut changed = false;

    for clause in &program.clauses {
        // Demand rules and already-refined clauses from an earlier run are
        // final; re-processing them would stack guards and duplicate rules.
        if is_magic(&clause.head.relation) || is_refined(clause) {
            new_clauses.push(clause.clone());
            continue;
        }
        let head_marker = adornment_of(&clause.head.relation);

        // (1) The refined (or pass-through) clause.
        if let Some(marker) = &head_marker {
            let guard = magic_atom(program, &clause.head, marker, &mut declared, &mut new_relations);
            let mut refined = clause.clone();
            refined.body.insert(0, Literal::Atom(guard));
            new_clauses.push(refined);
            changed = true;
        } else {
            new_clauses.push(clause.clone());
        }

        // (2) Supplementary rules for adorned body atoms.
        let equalities = equality_constraints(clause);
        let mut left: Vec<Atom> = Vec::new();
        if let Some(marker) = &head_marker {
            left.push(magic_atom(
                program,
                &clause.head,
                marker,
                &mut declared,
                &mut new_relations,
            ));
        }
        for lit in &clause.body {
            let Literal::Atom(atom) = lit else { continue };
            if is_magic(&atom.relation) {
                continue;
            }
            if let Some(marker) = adornment_of(&atom.relation) {
                if !preexisting.contains(&magic_name(&atom.relation)) {
                    let guard =
                        magic_atom(program, atom, &marker, &mut declared, &mut new_relations);
                    new_clauses.push(supplementary_rule(guard, &left, &equalities));
                    changed = true;
                }
            }
            left.push(atom.clone());
        }
    }

    program.clauses = new_clauses;
    for relation in new_relations {
        program.add_relation(relation);
    }
    changed
}

/// A clause carrying its own demand guard was already processed by an
/// earlier run (a later adornment round may have reordered the body, so
/// the guard need not be the leading literal)
fn is_refined(clause: &Clause) -> bool {
    if adornment_of(&clause.head.relation).is_none() {
        return false;
    }
    let guard = magic_name(&clause.head.relation);
    clause
        .body
        .iter()
        .any(|lit| matches!(lit, Literal::Atom(atom) if atom.relation == guard))
}

/// The magic atom for an adorned occurrence: the relation name under
/// `@magic`, holding only the bound arguments. Declares the magic
/// relation on first sight.
fn magic_atom(
    program: &Program,
    atom: &Atom,
    marker: &str,
    declared: &mut BTreeSet<QualifiedName>,
    new_relations: &mut Vec<Relation>,
) -> Atom {
    assert_eq!(marker.len(), atom.arity(), "adornment must match atom arity");
    let name = magic_name(&atom.relation);

    let args = atom
        .args
        .iter()
        .zip(marker.chars())
        .filter(|(_, flag)| *flag == 'b')
        .map(|(arg, _)| arg.clone())
        .collect();

    if declared.insert(name.clone()) {
        let base = program
            .relation(&atom.relation)
            .expect("adorned relation must be declared");
        let attributes = base
            .attributes
            .iter()
            .zip(marker.chars())
            .filter(|(_, flag)| *flag == 'b')
            .map(|(attr, _)| attr.clone())
            .collect();
        new_relations.push(Relation::new(name.clone(), attributes));
    }

    Atom {
        relation: name,
        args,
        span: atom.span,
    }
}

/// `guard :- left..., eqs` with `generated` set; the equalities included
/// are those fully over variables visible in the rule so far
fn supplementary_rule(guard: Atom, left: &[Atom], equalities: &[BinaryConstraint]) -> Clause {
    let mut visible: BTreeSet<Symbol> = BTreeSet::new();
    for atom in left {
        for arg in &atom.args {
            visit_variables_in_argument(arg, &mut |var| {
                visible.insert(var.name);
            });
        }
    }
    for arg in &guard.args {
        visit_variables_in_argument(arg, &mut |var| {
            visible.insert(var.name);
        });
    }

    // A record equality over a visible variable makes the record's other
    // variables visible too; iterate to closure.
    loop {
        let mut grew = false;
        for eq in equalities {
            let record_side = match (&eq.lhs, &eq.rhs) {
                (Argument::Variable(var), Argument::Record(_))
                | (Argument::Record(_), Argument::Variable(var)) => visible.contains(&var.name),
                _ => false,
            };
            if record_side {
                for side in [&eq.lhs, &eq.rhs] {
                    visit_variables_in_argument(side, &mut |var| {
                        grew |= visible.insert(var.name);
                    });
                }
            }
        }
        if !grew {
            break;
        }
    }

    let mut body: Vec<Literal> = left.iter().cloned().map(Literal::Atom).collect();
    for eq in equalities {
        let mut all_visible = true;
        for side in [&eq.lhs, &eq.rhs] {
            visit_variables_in_argument(side, &mut |var| {
                all_visible &= visible.contains(&var.name);
            });
        }
        if all_visible {
            body.push(Literal::Constraint(eq.clone()));
        }
    }

    let mut clause = Clause::new(guard, body);
    clause.generated = true;
    clause
}

/// The clause's direct `=` constraints usable as magic guards: a variable
/// on the left or a constant on the right, and no aggregate inside
fn equality_constraints(clause: &Clause) -> Vec<BinaryConstraint> {
    clause
        .body
        .iter()
        .filter_map(|lit| match lit {
            Literal::Constraint(c) if c.op == ConstraintOp::Eq => Some(c),
            _ => None,
        })
        .filter(|c| c.lhs.is_variable() || c.rhs.is_constant())
        .filter(|c| !contains_aggregate(&c.lhs) && !contains_aggregate(&c.rhs))
        .cloned()
        .collect()
}

fn contains_aggregate(arg: &Argument) -> bool {
    let mut found = false;
    walk_argument(arg, &mut |node| {
        if let Node::Argument(Argument::Aggregate(_)) = node {
            found = true;
        }
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use datalog_ast::{Argument, Attribute, Span};
    use internment::Intern;

    fn attr(name: &str) -> Attribute {
        Attribute {
            name: Intern::new(name.to_string()),
            type_name: QualifiedName::number(),
            span: Span::none(),
        }
    }

    fn relation(name: &str, arity: usize) -> Relation {
        Relation::new(
            QualifiedName::from(name),
            (0..arity).map(|i| attr(&format!("x{}", i))).collect(),
        )
    }

    fn atom(name: &str, args: Vec<Argument>) -> Atom {
        Atom::new(QualifiedName::from(name), args)
    }

    /// r.{bf}(x, y) :- s.{bb}(x, c), t.{fb}(y, x), c = 2.
    /// (the shape name_constants and adorn leave behind)
    fn adorned_program() -> Program {
        let mut program = Program::new();
        program.add_relation(relation("r", 2).renamed(QualifiedName::from("r").appended("{bf}")));
        program.add_relation(relation("s", 2).renamed(QualifiedName::from("s").appended("{bb}")));
        program.add_relation(relation("t", 2).renamed(QualifiedName::from("t").appended("{fb}")));
        program.add_clause(Clause::new(
            Atom::new(
                QualifiedName::from("r").appended("{bf}"),
                vec![Argument::var("x"), Argument::var("y")],
            ),
            vec![
                Literal::Atom(Atom::new(
                    QualifiedName::from("s").appended("{bb}"),
                    vec![Argument::var("x"), Argument::var("c")],
                )),
                Literal::Atom(Atom::new(
                    QualifiedName::from("t").appended("{fb}"),
                    vec![Argument::var("y"), Argument::var("x")],
                )),
                Literal::Constraint(BinaryConstraint::new(
                    ConstraintOp::Eq,
                    Argument::var("c"),
                    Argument::number(2),
                )),
            ],
        ));
        program
    }

    #[test]
    fn test_refinement_and_supplementary_rules() {
        let mut program = adorned_program();
        assert!(magic(&mut program));

        let magic_r = QualifiedName::from("r").appended("{bf}").prepended("@magic");
        let magic_s = QualifiedName::from("s").appended("{bb}").prepended("@magic");
        let magic_t = QualifiedName::from("t").appended("{fb}").prepended("@magic");

        // Magic relations carry the bound attributes only.
        assert_eq!(program.relation(&magic_r).unwrap().arity(), 1);
        assert_eq!(program.relation(&magic_s).unwrap().arity(), 2);
        assert_eq!(program.relation(&magic_t).unwrap().arity(), 1);

        // Refined clause: r.{bf}(x, y) :- @magic.r.{bf}(x), s.{bb}(...), ...
        let r_name = QualifiedName::from("r").appended("{bf}");
        let (_, refined) = program.clauses_of(&r_name).next().unwrap();
        assert_eq!(refined.body[0].atom().unwrap().relation, magic_r);
        assert_eq!(refined.body.len(), 4);

        // magic_s: @magic.s.{bb}(x, c) :- @magic.r.{bf}(x), c = 2.
        let (_, s_rule) = program.clauses_of(&magic_s).next().unwrap();
        assert_eq!(s_rule.head.args.len(), 2);
        assert_eq!(s_rule.body.len(), 2);
        assert_eq!(s_rule.body[0].atom().unwrap().relation, magic_r);
        assert!(matches!(&s_rule.body[1], Literal::Constraint(c) if c.op == ConstraintOp::Eq));

        // magic_t: @magic.t.{fb}(x) :- @magic.r.{bf}(x), s.{bb}(x, c), c = 2.
        let (_, t_rule) = program.clauses_of(&magic_t).next().unwrap();
        assert_eq!(t_rule.head.args, vec![Argument::var("x")]);
        assert_eq!(t_rule.body.len(), 3);
        assert_eq!(
            t_rule.body[1].atom().unwrap().relation,
            QualifiedName::from("s").appended("{bb}")
        );
    }

    #[test]
    fn test_unadorned_clause_passes_through_and_seeds() {
        // q(x) :- p.{ff}(x, y). with q unadorned: q's clause is untouched
        // and @magic.p.{ff} is seeded with an empty-bodied rule.
        let mut program = Program::new();
        program.add_relation(relation("q", 1));
        program.add_relation(relation("p", 2).renamed(QualifiedName::from("p").appended("{ff}")));
        program.add_clause(Clause::new(
            atom("q", vec![Argument::var("x")]),
            vec![Literal::Atom(Atom::new(
                QualifiedName::from("p").appended("{ff}"),
                vec![Argument::var("x"), Argument::var("y")],
            ))],
        ));

        assert!(magic(&mut program));

        let magic_p = QualifiedName::from("p").appended("{ff}").prepended("@magic");
        let magic_rel = program.relation(&magic_p).unwrap();
        assert_eq!(magic_rel.arity(), 0);

        let (_, seed) = program.clauses_of(&magic_p).next().unwrap();
        assert!(seed.is_fact());

        let (_, q_clause) = program.clauses_of(&QualifiedName::from("q")).next().unwrap();
        assert_eq!(q_clause.body.len(), 1);
    }

    #[test]
    fn test_record_equality_guard() {
        use datalog_ast::RecordInit;
        // r.{b}(x) :- x = [y, z], s.{bb}(y, z).
        // The magic rule for s may include the record equality because x
        // is bound by the guard, which binds y and z transitively.
        let mut program = Program::new();
        program.add_relation(relation("r", 1).renamed(QualifiedName::from("r").appended("{b}")));
        program.add_relation(relation("s", 2).renamed(QualifiedName::from("s").appended("{bb}")));
        program.add_clause(Clause::new(
            Atom::new(
                QualifiedName::from("r").appended("{b}"),
                vec![Argument::var("x")],
            ),
            vec![
                Literal::Constraint(BinaryConstraint::new(
                    ConstraintOp::Eq,
                    Argument::var("x"),
                    Argument::Record(RecordInit {
                        type_name: QualifiedName::from("pair"),
                        args: vec![Argument::var("y"), Argument::var("z")],
                        span: Span::none(),
                    }),
                )),
                Literal::Atom(Atom::new(
                    QualifiedName::from("s").appended("{bb}"),
                    vec![Argument::var("y"), Argument::var("z")],
                )),
            ],
        ));

        assert!(magic(&mut program));
        let magic_s = QualifiedName::from("s").appended("{bb}").prepended("@magic");
        let (_, s_rule) = program.clauses_of(&magic_s).next().unwrap();
        // @magic.s.{bb}(y, z) :- @magic.r.{b}(x), x = [y, z].
        assert_eq!(s_rule.body.len(), 2);
        assert!(matches!(&s_rule.body[1], Literal::Constraint(_)));
    }
}
