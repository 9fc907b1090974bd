//! Declaration checks: type declarations and relation declarations

use crate::diagnostics::ErrorReport;
use datalog_analysis::{IoTypes, TypeEnvironment};
use datalog_ast::{
    Kind, Program, QualifiedName, RecordType, Relation, Representation, TypeDecl, UnionType,
};
use std::collections::BTreeSet;

/// Validate every named type declaration
pub fn check_types(program: &Program, report: &mut ErrorReport) {
    for decl in program.types.values() {
        match decl {
            TypeDecl::Union(union) => check_union(program, union, report),
            TypeDecl::Record(record) => check_record(program, record, report),
            TypeDecl::Primitive(_) => {}
        }
    }
}

fn check_union(program: &Program, union: &UnionType, report: &mut ErrorReport) {
    for member in &union.members {
        if member.is_primitive() {
            continue;
        }
        match program.type_decl(member) {
            None => report.error(
                format!(
                    "Undefined type {} in definition of union type {}",
                    member, union.name
                ),
                union.span,
            ),
            Some(TypeDecl::Record(_)) => report.error(
                format!(
                    "Union type {} contains the non-primitive type {}",
                    union.name, member
                ),
                union.span,
            ),
            Some(_) => {}
        }
    }

    // A union must stay within one primitive kind, transitively.
    if union_contains_kind(program, union, Kind::Number, &mut BTreeSet::new())
        && union_contains_kind(program, union, Kind::Symbol, &mut BTreeSet::new())
    {
        report.error(
            format!(
                "Union type {} contains a mixture of symbol and number types",
                union.name
            ),
            union.span,
        );
    }
}

fn union_contains_kind(
    program: &Program,
    union: &UnionType,
    kind: Kind,
    visiting: &mut BTreeSet<QualifiedName>,
) -> bool {
    for member in &union.members {
        if (kind == Kind::Number && member == &QualifiedName::number())
            || (kind == Kind::Symbol && member == &QualifiedName::symbol())
        {
            return true;
        }
        if !visiting.insert(member.clone()) {
            continue;
        }
        match program.type_decl(member) {
            Some(TypeDecl::Primitive(p)) => {
                if (kind == Kind::Number) == p.numeric {
                    return true;
                }
            }
            Some(TypeDecl::Union(inner)) => {
                if union_contains_kind(program, inner, kind, visiting) {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

fn check_record(program: &Program, record: &RecordType, report: &mut ErrorReport) {
    for field in &record.fields {
        if !field.type_name.is_primitive() && program.type_decl(&field.type_name).is_none() {
            report.error(
                format!(
                    "Undefined type {} in definition of field {}",
                    field.type_name, field.name
                ),
                record.span,
            );
        }
    }

    for (i, field) in record.fields.iter().enumerate() {
        if record.fields[..i].iter().any(|f| f.name == field.name) {
            report.error(
                format!(
                    "Doubly defined field name {} in definition of type {}",
                    field.name, record.name
                ),
                record.span,
            );
        }
    }
}

/// Validate every relation declaration
pub fn check_relations(
    program: &Program,
    env: &TypeEnvironment,
    io: &IoTypes,
    report: &mut ErrorReport,
) {
    for relation in program.relations.values() {
        check_representation(relation, report);
        check_attributes(program, env, io, relation, report);

        // Relations with neither rules nor facts are usually a mistake,
        // unless they are read from disk or explicitly muted.
        let has_clauses = program.clauses_of(&relation.name).next().is_some();
        if !has_clauses && !io.is_input(&relation.name) && !relation.qualifiers.suppressed {
            report.warning(
                format!("No rules/facts defined for relation {}", relation.name),
                relation.span,
            );
        }
    }
}

fn check_representation(relation: &Relation, report: &mut ErrorReport) {
    if relation.representation != Representation::Eqrel {
        return;
    }
    if relation.arity() != 2 {
        report.error(
            format!("Equivalence relation {} is not binary", relation.name),
            relation.span,
        );
    } else if relation.attributes[0].type_name != relation.attributes[1].type_name {
        report.error(
            format!("Domains of equivalence relation {} are different", relation.name),
            relation.span,
        );
    }
}

fn check_attributes(
    program: &Program,
    env: &TypeEnvironment,
    io: &IoTypes,
    relation: &Relation,
    report: &mut ErrorReport,
) {
    for (i, attr) in relation.attributes.iter().enumerate() {
        let type_name = &attr.type_name;
        if !type_name.is_primitive() && program.type_decl(type_name).is_none() {
            report.error(
                format!("Undefined type in attribute {}:{}", attr.name, type_name),
                attr.span,
            );
        }

        if relation.attributes[..i].iter().any(|a| a.name == attr.name) {
            report.error(
                format!("Doubly defined attribute name {}:{}", attr.name, type_name),
                attr.span,
            );
        }

        if env.kind_of(type_name) == Some(Kind::Record) {
            if io.is_input(&relation.name) {
                report.error(
                    format!(
                        "Input relations must not have record types. Attribute {} has record type {}",
                        attr.name, type_name
                    ),
                    attr.span,
                );
            }
            if io.is_output(&relation.name) {
                report.warning(
                    format!(
                        "Record types in output relations are not printed verbatim: attribute {} has record type {}",
                        attr.name, type_name
                    ),
                    attr.span,
                );
            }
        }
    }
}

/// Whether any relation carries a record-typed attribute
pub fn any_record_attribute(program: &Program, env: &TypeEnvironment) -> bool {
    program.relations.values().any(|relation| {
        relation
            .attributes
            .iter()
            .any(|attr| env.kind_of(&attr.type_name) == Some(Kind::Record))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use datalog_ast::{Attribute, PrimitiveType, RecordField, Span};
    use internment::Intern;

    fn attr(name: &str, ty: &str) -> Attribute {
        Attribute {
            name: Intern::new(name.to_string()),
            type_name: QualifiedName::from(ty),
            span: Span::none(),
        }
    }

    #[test]
    fn test_mixed_union_is_an_error() {
        let mut program = Program::new();
        program.add_type(TypeDecl::Union(UnionType {
            name: QualifiedName::from("t"),
            members: vec![QualifiedName::number(), QualifiedName::symbol()],
            span: Span::none(),
        }));
        let mut report = ErrorReport::new();
        check_types(&program, &mut report);
        assert_eq!(report.error_count(), 1);
        assert!(report.diagnostics()[0].message.contains("mixture"));
    }

    #[test]
    fn test_union_member_must_exist_and_be_primitive() {
        let mut program = Program::new();
        program.add_type(TypeDecl::Record(RecordType {
            name: QualifiedName::from("rec"),
            fields: vec![],
            span: Span::none(),
        }));
        program.add_type(TypeDecl::Union(UnionType {
            name: QualifiedName::from("t"),
            members: vec![QualifiedName::from("missing"), QualifiedName::from("rec")],
            span: Span::none(),
        }));
        let mut report = ErrorReport::new();
        check_types(&program, &mut report);
        assert_eq!(report.error_count(), 2);
    }

    #[test]
    fn test_duplicate_record_fields() {
        let mut program = Program::new();
        program.add_type(TypeDecl::Record(RecordType {
            name: QualifiedName::from("pair"),
            fields: vec![
                RecordField {
                    name: Intern::new("a".to_string()),
                    type_name: QualifiedName::number(),
                },
                RecordField {
                    name: Intern::new("a".to_string()),
                    type_name: QualifiedName::number(),
                },
            ],
            span: Span::none(),
        }));
        let mut report = ErrorReport::new();
        check_types(&program, &mut report);
        assert_eq!(report.error_count(), 1);
    }

    #[test]
    fn test_eqrel_shape() {
        let mut program = Program::new();
        let mut rel = Relation::new(
            QualifiedName::from("eq"),
            vec![attr("a", "number"), attr("b", "symbol")],
        );
        rel.representation = Representation::Eqrel;
        rel.qualifiers.suppressed = true;
        program.add_relation(rel);

        let env = TypeEnvironment::analyse(&program);
        let io = IoTypes::analyse(&program);
        let mut report = ErrorReport::new();
        check_relations(&program, &env, &io, &mut report);
        assert_eq!(report.error_count(), 1);
        assert!(report.diagnostics()[0].message.contains("Domains"));
    }

    #[test]
    fn test_record_attribute_in_input_relation() {
        use datalog_ast::{Directive, DirectiveKind};
        let mut program = Program::new();
        program.add_type(TypeDecl::Record(RecordType {
            name: QualifiedName::from("rec"),
            fields: vec![],
            span: Span::none(),
        }));
        let mut rel = Relation::new(QualifiedName::from("r"), vec![attr("x", "rec")]);
        rel.qualifiers.suppressed = true;
        program.add_relation(rel);
        program.add_directive(Directive::new(DirectiveKind::Input, QualifiedName::from("r")));

        let env = TypeEnvironment::analyse(&program);
        let io = IoTypes::analyse(&program);
        let mut report = ErrorReport::new();
        check_relations(&program, &env, &io, &mut report);
        assert_eq!(report.error_count(), 1);
        assert!(any_record_attribute(&program, &env));
    }

    #[test]
    fn test_empty_relation_warning_and_suppression() {
        let mut program = Program::new();
        program.add_relation(Relation::new(QualifiedName::from("empty"), vec![]));
        let mut muted = Relation::new(QualifiedName::from("muted"), vec![]);
        muted.qualifiers.suppressed = true;
        program.add_relation(muted);
        program.add_type(TypeDecl::Primitive(PrimitiveType {
            name: QualifiedName::from("t"),
            numeric: true,
            span: Span::none(),
        }));

        let env = TypeEnvironment::analyse(&program);
        let io = IoTypes::analyse(&program);
        let mut report = ErrorReport::new();
        check_relations(&program, &env, &io, &mut report);
        assert_eq!(report.warning_count(), 1);
        assert!(report.diagnostics()[0].message.contains("empty"));
    }
}
