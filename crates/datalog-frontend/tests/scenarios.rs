//! End-to-end scenarios through the checker and the demand pipeline

use datalog_ast::{
    Aggregate, AggregateOp, Argument, Atom, Attribute, BinaryConstraint, Clause, Config,
    ConstraintOp, Directive, DirectiveKind, Literal, Negation, Program, QualifiedName, Relation,
    Span, TypeDecl, UnionType,
};
use datalog_frontend::transform;
use datalog_semantic::{check_program, ErrorReport};
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

fn magic_all() -> Config {
    Config {
        magic_transform: Some("*".to_string()),
        ..Config::default()
    }
}

#[test]
fn ungrounded_variable_under_negation_is_rejected() {
    // a(x) :- b(x), !c(x, y).
    let mut program = Program::new();
    program.add_relation(relation("a", 1));
    program.add_relation(relation("b", 1));
    program.add_relation(relation("c", 2));
    program.add_clause(Clause::new(
        atom("a", vec![Argument::var("x")]),
        vec![
            Literal::Atom(atom("b", vec![Argument::var("x")])),
            Literal::Negation(Negation {
                atom: atom("c", vec![Argument::var("x"), Argument::var("y")]),
                span: Span::none(),
            }),
        ],
    ));

    let outcome = transform(program, &mut magic_all());
    assert!(outcome.report.has_errors());
    assert!(outcome
        .report
        .diagnostics()
        .iter()
        .any(|d| d.message == "Ungrounded variable y"));
}

#[test]
fn mixed_union_is_rejected() {
    let mut program = Program::new();
    program.add_type(TypeDecl::Union(UnionType {
        name: QualifiedName::from("t"),
        members: vec![QualifiedName::number(), QualifiedName::symbol()],
        span: Span::none(),
    }));

    let outcome = transform(program, &mut magic_all());
    assert!(outcome.report.has_errors());
    assert!(outcome
        .report
        .diagnostics()
        .iter()
        .any(|d| d.message.contains("mixture of symbol and number")));
}

#[test]
fn aggregate_witness_escape_is_rejected() {
    // a(x, y) :- x = count : { b(y) }.
    let mut program = Program::new();
    program.add_relation(relation("a", 2));
    program.add_relation(relation("b", 1));
    program.add_clause(Clause::new(
        atom("a", vec![Argument::var("x"), Argument::var("y")]),
        vec![Literal::Constraint(BinaryConstraint::new(
            ConstraintOp::Eq,
            Argument::var("x"),
            Argument::Aggregate(Aggregate {
                op: AggregateOp::Count,
                target: None,
                body: vec![Literal::Atom(atom("b", vec![Argument::var("y")]))],
                span: Span::none(),
            }),
        ))],
    ));

    let outcome = transform(program, &mut magic_all());
    assert!(outcome.report.has_errors());
    assert!(outcome
        .report
        .diagnostics()
        .iter()
        .any(|d| d.message.contains("Witness problem")));
}

#[test]
fn inline_cycle_is_rejected() {
    let mut program = Program::new();
    let mut a = relation("a", 1);
    a.qualifiers.inline = true;
    let mut b = relation("b", 1);
    b.qualifiers.inline = true;
    program.add_relation(a);
    program.add_relation(b);
    program.add_clause(Clause::new(
        atom("a", vec![Argument::var("x")]),
        vec![Literal::Atom(atom("b", vec![Argument::var("x")]))],
    ));
    program.add_clause(Clause::new(
        atom("b", vec![Argument::var("x")]),
        vec![Literal::Atom(atom("a", vec![Argument::var("x")]))],
    ));

    let outcome = transform(program, &mut magic_all());
    assert!(outcome.report.has_errors());
    assert!(outcome
        .report
        .diagnostics()
        .iter()
        .any(|d| d.message.contains("Cannot inline cyclically dependent relations")));
}

/// Input relation with rules: after normalisation the rules live on an
/// `@interm_in` twin fed by the raw input; after the full pipeline the
/// all-free demand pattern degenerates to a seed fact.
#[test]
fn input_relation_with_rules_is_separated() {
    let build = || {
        let mut program = Program::new();
        program.add_relation(relation("e", 1));
        program.add_relation(relation("d", 1));
        program.add_relation(relation("q", 1));
        program.add_directive(Directive::new(DirectiveKind::Input, QualifiedName::from("e")));
        program.add_directive(Directive::new(DirectiveKind::Input, QualifiedName::from("d")));
        program.add_directive(Directive::new(DirectiveKind::Output, QualifiedName::from("q")));
        program.add_clause(Clause::new(
            atom("e", vec![Argument::var("x")]),
            vec![Literal::Atom(atom("d", vec![Argument::var("x")]))],
        ));
        program.add_clause(Clause::new(
            atom("q", vec![Argument::var("y")]),
            vec![Literal::Atom(atom("e", vec![Argument::var("y")]))],
        ));
        program
    };

    // Normalisation alone: rules and references move to the twin.
    let mut normalised = build();
    assert!(datalog_magic::normalise(&mut normalised));
    let twin = QualifiedName::from("e").prepended("@interm_in");
    assert!(normalised.relation(&twin).is_some());
    let (_, q_clause) = normalised.clauses_of(&QualifiedName::from("q")).next().unwrap();
    assert_eq!(q_clause.body[0].atom().unwrap().relation, twin);
    assert!(normalised
        .clauses_of(&twin)
        .any(|(_, c)| c.generated && c.body[0].atom().unwrap().relation == QualifiedName::from("e")));

    // Full pipeline: no diagnostics, and the twin's all-free pattern is
    // seeded as a fact.
    let outcome = transform(build(), &mut magic_all());
    assert_eq!(outcome.report.error_count(), 0);
    let seeded = twin.appended("{f}").prepended("@magic");
    let seed_relation = outcome.program.relation(&seeded).expect("seed declared");
    assert_eq!(seed_relation.arity(), 0);
    assert!(outcome.program.clauses_of(&seeded).any(|(_, c)| c.is_fact()));
}

/// r(x, y) :- s(x, 2), t(y, x). called as r(1, y): the head pattern bf
/// produces a one-column guard, and each body atom gets a demand rule
/// from the atoms to its left.
#[test]
fn bound_call_patterns_produce_guards() {
    let mut program = Program::new();
    program.add_relation(relation("r", 2));
    program.add_relation(relation("s", 2));
    program.add_relation(relation("t", 2));
    program.add_relation(relation("q", 1));
    program.add_relation(relation("sin", 2));
    program.add_relation(relation("tin", 2));
    program.add_directive(Directive::new(DirectiveKind::Input, QualifiedName::from("sin")));
    program.add_directive(Directive::new(DirectiveKind::Input, QualifiedName::from("tin")));
    program.add_directive(Directive::new(DirectiveKind::Output, QualifiedName::from("q")));
    program.add_clause(Clause::new(
        atom("s", vec![Argument::var("a"), Argument::var("b")]),
        vec![Literal::Atom(atom("sin", vec![Argument::var("a"), Argument::var("b")]))],
    ));
    program.add_clause(Clause::new(
        atom("t", vec![Argument::var("a"), Argument::var("b")]),
        vec![Literal::Atom(atom("tin", vec![Argument::var("a"), Argument::var("b")]))],
    ));
    program.add_clause(Clause::new(
        atom("r", vec![Argument::var("x"), Argument::var("y")]),
        vec![
            Literal::Atom(atom("s", vec![Argument::var("x"), Argument::number(2)])),
            Literal::Atom(atom("t", vec![Argument::var("y"), Argument::var("x")])),
        ],
    ));
    program.add_clause(Clause::new(
        atom("q", vec![Argument::var("y")]),
        vec![Literal::Atom(atom("r", vec![Argument::number(1), Argument::var("y")]))],
    ));

    let outcome = transform(program, &mut magic_all());
    assert_eq!(outcome.report.error_count(), 0);
    let program = &outcome.program;

    let r_bf = QualifiedName::from("r").appended("{bf}");
    let magic_r = r_bf.prepended("@magic");
    let magic_s = QualifiedName::from("s").appended("{bb}").prepended("@magic");
    let magic_t = QualifiedName::from("t").appended("{fb}").prepended("@magic");

    // Guard arities equal the bound-position counts.
    assert_eq!(program.relation(&magic_r).unwrap().arity(), 1);
    assert_eq!(program.relation(&magic_s).unwrap().arity(), 2);
    assert_eq!(program.relation(&magic_t).unwrap().arity(), 1);

    // The r clause is refined by its guard.
    let (_, refined) = program.clauses_of(&r_bf).next().expect("refined clause");
    assert_eq!(refined.body[0].atom().unwrap().relation, magic_r);

    // The call site seeds the guard through its lifted constant.
    let (_, call_rule) = program.clauses_of(&magic_r).next().expect("call rule");
    assert_eq!(call_rule.body.len(), 1);
    assert!(matches!(&call_rule.body[0], Literal::Constraint(c) if c.op == ConstraintOp::Eq));

    // t's demand sees everything to its left.
    let (_, t_rule) = program.clauses_of(&magic_t).next().expect("t demand rule");
    let t_body: Vec<String> = t_rule
        .body
        .iter()
        .filter_map(|lit| lit.atom().map(|a| a.relation.to_string()))
        .collect();
    assert_eq!(t_body, vec!["@magic.r.{bf}", "s.{bb}"]);
}

#[test]
fn empty_union_and_zero_arity_relations_round_trip() {
    let mut program = Program::new();
    program.add_type(TypeDecl::Union(UnionType {
        name: QualifiedName::from("empty"),
        members: vec![],
        span: Span::none(),
    }));
    program.add_relation(relation("flag", 0));
    program.add_relation(relation("base", 0));
    program.add_directive(Directive::new(DirectiveKind::Output, QualifiedName::from("flag")));
    program.add_clause(Clause::new(atom("base", vec![]), vec![]));
    program.add_clause(Clause::new(
        atom("flag", vec![]),
        vec![Literal::Atom(atom("base", vec![]))],
    ));

    let outcome = transform(program, &mut magic_all());
    assert_eq!(outcome.report.error_count(), 0);
    // The zero-arity output keeps a defining clause and its semantics.
    assert!(outcome
        .program
        .clauses_of(&QualifiedName::from("flag"))
        .next()
        .is_some());
}

#[test]
fn transformed_output_still_checks() {
    let mut program = Program::new();
    program.add_relation(relation("edge", 2));
    program.add_relation(relation("path", 2));
    program.add_relation(relation("q", 1));
    program.add_directive(Directive::new(DirectiveKind::Input, QualifiedName::from("edge")));
    program.add_directive(Directive::new(DirectiveKind::Output, QualifiedName::from("q")));
    program.add_clause(Clause::new(
        atom("path", vec![Argument::var("a"), Argument::var("b")]),
        vec![Literal::Atom(atom("edge", vec![Argument::var("a"), Argument::var("b")]))],
    ));
    program.add_clause(Clause::new(
        atom("path", vec![Argument::var("a"), Argument::var("c")]),
        vec![
            Literal::Atom(atom("path", vec![Argument::var("a"), Argument::var("b")])),
            Literal::Atom(atom("edge", vec![Argument::var("b"), Argument::var("c")])),
        ],
    ));
    program.add_clause(Clause::new(
        atom("q", vec![Argument::var("y")]),
        vec![Literal::Atom(atom("path", vec![Argument::number(1), Argument::var("y")]))],
    ));

    let mut config = magic_all();
    let outcome = transform(program, &mut config);
    assert_eq!(outcome.report.error_count(), 0);

    // The rewritten program is itself a valid program.
    let mut rewritten = outcome.program;
    let mut report = ErrorReport::new();
    check_program(&mut rewritten, &config, &mut report);
    assert_eq!(report.error_count(), 0, "diagnostics: {:?}", report.diagnostics());
}

#[test]
fn pipeline_reaches_a_fixpoint() {
    let mut program = Program::new();
    program.add_relation(relation("r", 2));
    program.add_relation(relation("s", 2));
    program.add_relation(relation("t", 2));
    program.add_relation(relation("q", 1));
    program.add_relation(relation("sin", 2));
    program.add_directive(Directive::new(DirectiveKind::Input, QualifiedName::from("sin")));
    program.add_directive(Directive::new(DirectiveKind::Output, QualifiedName::from("q")));
    program.add_clause(Clause::new(
        atom("s", vec![Argument::var("a"), Argument::var("b")]),
        vec![Literal::Atom(atom("sin", vec![Argument::var("a"), Argument::var("b")]))],
    ));
    program.add_clause(Clause::new(
        atom("t", vec![Argument::var("a"), Argument::var("b")]),
        vec![Literal::Atom(atom("s", vec![Argument::var("b"), Argument::var("a")]))],
    ));
    program.add_clause(Clause::new(
        atom("r", vec![Argument::var("x"), Argument::var("y")]),
        vec![
            Literal::Atom(atom("s", vec![Argument::var("x"), Argument::var("y")])),
            Literal::Atom(atom("t", vec![Argument::var("y"), Argument::var("x")])),
        ],
    ));
    program.add_clause(Clause::new(
        atom("q", vec![Argument::var("y")]),
        vec![Literal::Atom(atom("r", vec![Argument::number(1), Argument::var("y")]))],
    ));

    let first = transform(program, &mut magic_all());
    assert_eq!(first.report.error_count(), 0);

    // One more round may reorder bodies as bindings are rediscovered, but
    // after that the program is a fixed point: no new relations, no new
    // clauses, no new names.
    let second = transform(first.program, &mut magic_all());
    assert_eq!(second.report.error_count(), 0);
    let third = transform(second.program.clone(), &mut magic_all());
    assert_eq!(third.report.error_count(), 0);
    assert_eq!(second.program, third.program);
}
