//! Type- and groundedness-based checks
//!
//! Walks each clause with the groundedness map and the inferred
//! argument types side by side (both keyed by the clause's pre-order
//! argument numbering) and reports: ungrounded head variables and records,
//! out-of-range number constants, irreconcilable argument types, wrong
//! functor input kinds, cast mismatches, record field mismatches,
//! non-numeric aggregation targets, wrongly-kinded constraint operands,
//! and atom arguments that do not fit the declared attribute types.
//!
//! Returns whether the program constructs records anywhere; the driver
//! uses that to switch off the subprogram engine.

use crate::diagnostics::ErrorReport;
use datalog_analysis::{AnalysisType, Grounding, TypeAnalysis, TypeEnvironment, TypeLattice};
use datalog_ast::{
    visit_variables_in_clause, Aggregate, AggregateOp, Argument, Atom, BinaryConstraint, Clause,
    ConstraintOp, Kind, Literal, Program, Span, TypeDecl, MAX_NUMBER, MIN_NUMBER,
};
use std::collections::BTreeSet;

pub fn check(program: &Program, env: &TypeEnvironment, report: &mut ErrorReport) -> bool {
    let lattice = TypeLattice::new(env);
    let mut uses_records = false;

    for clause in &program.clauses {
        let grounding = Grounding::analyse(clause);
        let types = TypeAnalysis::analyse(clause, program, env);

        if !clause.is_fact() {
            // Every variable of a rule must be grounded; report once per name.
            let mut reported = BTreeSet::new();
            visit_variables_in_clause(clause, &mut |var| {
                if !grounding.is_variable_grounded(var.name) && reported.insert(var.name) {
                    report.error(format!("Ungrounded variable {}", var.name), var.span);
                }
            });
        }

        let mut checker = ClauseChecker {
            program,
            env,
            lattice: &lattice,
            grounding: &grounding,
            types: &types,
            report: &mut *report,
            next: 0,
            in_fact: clause.is_fact(),
            uses_records: false,
        };
        checker.check_atom(&clause.head);
        for lit in &clause.body {
            checker.check_literal(lit);
        }
        uses_records |= checker.uses_records;
    }

    uses_records
}

struct ClauseChecker<'a> {
    program: &'a Program,
    env: &'a TypeEnvironment,
    lattice: &'a TypeLattice<'a>,
    grounding: &'a Grounding,
    types: &'a TypeAnalysis,
    report: &'a mut ErrorReport,
    /// Pre-order argument index; must advance exactly as the analyses did
    next: usize,
    in_fact: bool,
    uses_records: bool,
}

impl ClauseChecker<'_> {
    fn check_literal(&mut self, lit: &Literal) {
        match lit {
            Literal::Atom(atom) => self.check_atom(atom),
            Literal::Negation(neg) => self.check_atom(&neg.atom),
            Literal::Constraint(c) => self.check_constraint(c),
            Literal::Boolean(_) => {}
        }
    }

    /// Every atom's argument types are compared against the declared
    /// attribute types. Positive body atoms hold trivially (the inference
    /// met the attribute types in already); head and negated atoms can fail.
    fn check_atom(&mut self, atom: &Atom) {
        let relation = self.program.relation(&atom.relation);
        for (position, arg) in atom.args.iter().enumerate() {
            let index = self.check_argument(arg);
            let Some(relation) = relation else { continue };
            let Some(attr) = relation.attributes.get(position) else {
                continue;
            };
            let arg_type = self.types.type_of(index);
            let expected = self.lattice.from_name(&attr.type_name);
            if arg_type.is_valid() && !self.lattice.is_subtype(arg_type, &expected) {
                self.report.error(
                    format!(
                        "Relation expects value of type {} but got argument of type {}",
                        attr.type_name, arg_type
                    ),
                    arg.span(),
                );
            }
        }
    }

    fn check_constraint(&mut self, c: &BinaryConstraint) {
        let lhs = self.check_argument(&c.lhs);
        let rhs = self.check_argument(&c.rhs);
        let lhs_type = self.types.type_of(lhs);
        let rhs_type = self.types.type_of(rhs);

        if c.op == ConstraintOp::Eq {
            return;
        }

        if c.op == ConstraintOp::Ne {
            if !lhs_type.is_valid() || !rhs_type.is_valid() {
                return;
            }
            let (Some(lk), Some(rk)) =
                (self.lattice.kind_of(lhs_type), self.lattice.kind_of(rhs_type))
            else {
                return;
            };
            if lk != rk {
                self.report.error(
                    format!(
                        "Cannot compare operands of different kinds, left operand is a {} and right operand is a {}",
                        lk, rk
                    ),
                    c.span,
                );
            } else if lk == Kind::Record
                && !(self.lattice.is_subtype(lhs_type, rhs_type)
                    || self.lattice.is_subtype(rhs_type, lhs_type))
            {
                self.report
                    .error("Cannot compare records of different types", c.span);
            }
            return;
        }

        let expected = if c.op.is_numerical() {
            Kind::Number
        } else {
            debug_assert!(c.op.is_symbolic(), "unhandled constraint operator kind");
            Kind::Symbol
        };
        for (ty, side, span) in [
            (lhs_type, "left", c.lhs.span()),
            (rhs_type, "right", c.rhs.span()),
        ] {
            if !ty.is_valid() {
                continue;
            }
            if let Some(kind) = self.lattice.kind_of(ty) {
                if kind != expected {
                    self.report.error(
                        format!(
                            "Non-{} operand for comparison, instead {} operand has type {}",
                            expected, side, ty
                        ),
                        span,
                    );
                }
            }
        }
    }

    /// Pre-order traversal; indices must agree with `for_each_arg_indexed`
    fn check_argument(&mut self, arg: &Argument) -> usize {
        let index = self.next;
        self.next += 1;

        self.check_invalid_type(arg, index);

        match arg {
            Argument::Number(n) => {
                if n.value < MIN_NUMBER || n.value > MAX_NUMBER {
                    self.report.error(
                        format!(
                            "Number constant not in range [{}, {}]",
                            MIN_NUMBER, MAX_NUMBER
                        ),
                        n.span,
                    );
                }
            }
            Argument::Intrinsic(fun) => {
                let children: Vec<usize> =
                    fun.args.iter().map(|a| self.check_argument(a)).collect();
                for (i, &child) in children.iter().enumerate() {
                    self.check_functor_input(fun.op.accepts(i), child, fun.args[i].span());
                }
            }
            Argument::UserDefined(fun) => {
                let decl = self.program.functor(&fun.name).cloned();
                let children: Vec<usize> =
                    fun.args.iter().map(|a| self.check_argument(a)).collect();
                if let Some(decl) = decl {
                    if decl.params.len() == fun.args.len() {
                        for (i, &child) in children.iter().enumerate() {
                            self.check_functor_input(decl.params[i], child, fun.args[i].span());
                        }
                    }
                }
            }
            Argument::Cast(cast) => {
                let value = self.check_argument(&cast.value);
                self.check_cast(arg, index, value);
            }
            Argument::Record(rec) => {
                self.uses_records = true;
                let children: Vec<usize> =
                    rec.args.iter().map(|a| self.check_argument(a)).collect();
                self.check_record(rec, index, &children);
            }
            Argument::Aggregate(agg) => {
                let target = agg.target.as_deref().map(|t| self.check_argument(t));
                self.check_aggregate(agg, target);
                for lit in &agg.body {
                    self.check_literal(lit);
                }
            }
            _ => {}
        }

        index
    }

    /// Grounded arguments whose uses cannot be reconciled get one error
    /// here; ungrounded ones were already reported by the grounding check
    fn check_invalid_type(&mut self, arg: &Argument, index: usize) {
        if !self.grounding.is_grounded(index) {
            return;
        }
        match self.types.type_of(index) {
            AnalysisType::BotPrim => self.report.error(
                "Unable to deduce valid type for expression, as base types are disjoint",
                arg.span(),
            ),
            AnalysisType::Bot => self.report.error(
                "Unable to deduce valid type for expression, as primitive types are disjoint",
                arg.span(),
            ),
            _ => {}
        }
    }

    fn check_functor_input(&mut self, expected: Kind, child: usize, span: Span) {
        let ty = self.types.type_of(child);
        if !ty.is_valid() {
            return;
        }
        if let Some(kind) = self.lattice.kind_of(ty) {
            if kind != expected {
                self.report.error(
                    format!(
                        "Non-{} argument for functor, instead argument has type {}",
                        expected, ty
                    ),
                    span,
                );
            }
        }
    }

    fn check_cast(&mut self, arg: &Argument, index: usize, value: usize) {
        let Argument::Cast(cast) = arg else { return };

        if !self.env.is_declared(&cast.type_name) {
            self.report.error(
                format!("Type cast is to undeclared type {}", cast.type_name),
                cast.span,
            );
            return;
        }

        let target = self.lattice.from_name(&cast.type_name);
        let actual = self.types.type_of(index);
        if actual.is_valid() && *actual != target {
            self.report.error(
                format!(
                    "Typecast is to type {} but is used where the type {} is expected",
                    cast.type_name, actual
                ),
                cast.span,
            );
        }

        let input = self.types.type_of(value);
        if !input.is_valid() {
            return;
        }
        let target_kind = self.env.kind_of(&cast.type_name);
        let input_kind = self.lattice.kind_of(input);
        match (input_kind, target_kind) {
            (Some(i), Some(t)) if i != t => {
                self.report.warning(
                    format!("Casts from {} values to {} types may cause runtime errors", i, t),
                    cast.span,
                );
            }
            (Some(Kind::Record), Some(Kind::Record))
                if !self.lattice.is_subtype(input, &target) =>
            {
                self.report.warning(
                    "Casting a record to the wrong record type may cause runtime errors",
                    cast.span,
                );
            }
            _ => {}
        }
    }

    fn check_record(&mut self, rec: &datalog_ast::RecordInit, index: usize, children: &[usize]) {
        let decl = match self.program.type_decl(&rec.type_name) {
            None => {
                self.report.error(
                    format!("Type {} has not been declared", rec.type_name),
                    rec.span,
                );
                return;
            }
            Some(TypeDecl::Record(decl)) => decl,
            Some(_) => {
                self.report.error(
                    format!("Type {} is not a record type", rec.type_name),
                    rec.span,
                );
                return;
            }
        };

        if rec.args.len() != decl.fields.len() {
            self.report
                .error("Wrong number of arguments given to record", rec.span);
            return;
        }

        if self.in_fact {
            return; // fact constancy is checked structurally elsewhere
        }

        if !self.grounding.is_grounded(index) {
            self.report.error("Ungrounded record", rec.span);
            return;
        }

        for (i, (field, &child)) in decl.fields.iter().zip(children).enumerate() {
            let expected = self.lattice.from_name(&field.type_name);
            let actual = self.types.type_of(child);
            if actual.is_valid() && !self.lattice.is_subtype(actual, &expected) {
                self.report.error(
                    format!(
                        "Record constructor expects element to have type {} but instead it has type {}",
                        field.type_name, actual
                    ),
                    rec.args[i].span(),
                );
            }
        }
    }

    fn check_aggregate(&mut self, agg: &Aggregate, target: Option<usize>) {
        if agg.op == AggregateOp::Count {
            return;
        }
        let Some(target) = target else { return };
        let ty = self.types.type_of(target);
        if !ty.is_valid() {
            return;
        }
        if let Some(kind) = self.lattice.kind_of(ty) {
            if kind != Kind::Number {
                self.report.error(
                    format!("Aggregation variable is not a number, instead has type {}", ty),
                    agg.target.as_ref().unwrap().span(),
                );
            }
        }
    }
}
