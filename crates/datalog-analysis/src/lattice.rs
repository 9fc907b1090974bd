//! Declared-type resolution and the analysis-type lattice
//!
//! [`TypeEnvironment`] resolves every declared type to a primitive kind
//! (number, symbol, record) by chasing union members; a union mixing kinds
//! resolves to no kind and is reported by the checker.
//!
//! [`AnalysisType`] is the little lattice the type analysis infers over:
//!
//! ```text
//!            Top
//!        /    |     \
//!   number  symbol  record        (primitives)
//!      |      |       |
//!    named  named   named         (declared types, unions above members)
//!        \    |     /
//!          BotPrim                (same kind, disjoint base types)
//!            Bot                  (kinds disagree)
//! ```

use datalog_ast::{Kind, Program, QualifiedName, TypeDecl};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Kinds and union membership of all declared types
#[derive(Debug, Clone, Default)]
pub struct TypeEnvironment {
    kinds: BTreeMap<QualifiedName, Option<Kind>>,
    /// For each union, the transitive closure of member type names
    members: BTreeMap<QualifiedName, BTreeSet<QualifiedName>>,
}

impl TypeEnvironment {
    pub fn analyse(program: &Program) -> Self {
        let mut env = TypeEnvironment::default();
        for name in program.types.keys() {
            let mut visiting = BTreeSet::new();
            let kind = resolve_kind(program, name, &mut visiting);
            env.kinds.insert(name.clone(), kind);
        }
        for (name, decl) in &program.types {
            if let TypeDecl::Union(_) = decl {
                let mut closure = BTreeSet::new();
                collect_members(program, name, &mut closure);
                env.members.insert(name.clone(), closure);
            }
        }
        env
    }

    /// Whether the name is a declared type or a reserved primitive
    pub fn is_declared(&self, name: &QualifiedName) -> bool {
        name.is_primitive() || self.kinds.contains_key(name)
    }

    /// The primitive kind a type resolves to; `None` when undeclared or
    /// when a union mixes kinds
    pub fn kind_of(&self, name: &QualifiedName) -> Option<Kind> {
        if name == &QualifiedName::number() {
            return Some(Kind::Number);
        }
        if name == &QualifiedName::symbol() {
            return Some(Kind::Symbol);
        }
        self.kinds.get(name).copied().flatten()
    }

    /// Whether `sub` is `sup` itself or transitively one of its members
    pub fn is_member(&self, sub: &QualifiedName, sup: &QualifiedName) -> bool {
        if sub == sup {
            return true;
        }
        self.members
            .get(sup)
            .map(|closure| closure.contains(sub))
            .unwrap_or(false)
    }
}

fn resolve_kind(
    program: &Program,
    name: &QualifiedName,
    visiting: &mut BTreeSet<QualifiedName>,
) -> Option<Kind> {
    if name == &QualifiedName::number() {
        return Some(Kind::Number);
    }
    if name == &QualifiedName::symbol() {
        return Some(Kind::Symbol);
    }
    if !visiting.insert(name.clone()) {
        return None; // cyclic declaration
    }
    let kind = match program.type_decl(name)? {
        TypeDecl::Primitive(p) => Some(if p.numeric { Kind::Number } else { Kind::Symbol }),
        TypeDecl::Record(_) => Some(Kind::Record),
        TypeDecl::Union(u) => {
            let mut kind = None;
            for member in &u.members {
                match resolve_kind(program, member, visiting) {
                    Some(k) if k != Kind::Record => match kind {
                        None => kind = Some(k),
                        Some(prev) if prev == k => {}
                        Some(_) => return None, // mixed union
                    },
                    _ => return None,
                }
            }
            kind
        }
    };
    visiting.remove(name);
    kind
}

fn collect_members(program: &Program, name: &QualifiedName, closure: &mut BTreeSet<QualifiedName>) {
    if let Some(TypeDecl::Union(u)) = program.type_decl(name) {
        for member in &u.members {
            if closure.insert(member.clone()) {
                collect_members(program, member, closure);
            }
        }
    }
}

/// An element of the inference lattice
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisType {
    Top,
    Primitive(Kind),
    Named(QualifiedName),
    /// Same primitive kind but provably disjoint base types
    BotPrim,
    /// No common primitive kind
    Bot,
}

impl AnalysisType {
    /// Invalid types mark arguments whose uses cannot be reconciled
    pub fn is_valid(&self) -> bool {
        !matches!(self, AnalysisType::Bot | AnalysisType::BotPrim)
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisType::Top => write!(f, "any"),
            AnalysisType::Primitive(k) => write!(f, "{}", k),
            AnalysisType::Named(name) => write!(f, "{}", name),
            AnalysisType::BotPrim => write!(f, "none (disjoint base types)"),
            AnalysisType::Bot => write!(f, "none (disjoint kinds)"),
        }
    }
}

/// Subtype and meet over [`AnalysisType`], parameterised by the environment
pub struct TypeLattice<'a> {
    env: &'a TypeEnvironment,
}

impl<'a> TypeLattice<'a> {
    pub fn new(env: &'a TypeEnvironment) -> Self {
        TypeLattice { env }
    }

    pub fn env(&self) -> &TypeEnvironment {
        self.env
    }

    /// Lift a declared type name into the lattice; undeclared names lift
    /// to `Top` (their declaration error is reported elsewhere)
    pub fn from_name(&self, name: &QualifiedName) -> AnalysisType {
        if name == &QualifiedName::number() {
            AnalysisType::Primitive(Kind::Number)
        } else if name == &QualifiedName::symbol() {
            AnalysisType::Primitive(Kind::Symbol)
        } else if self.env.is_declared(name) {
            AnalysisType::Named(name.clone())
        } else {
            AnalysisType::Top
        }
    }

    pub fn kind_of(&self, ty: &AnalysisType) -> Option<Kind> {
        match ty {
            AnalysisType::Primitive(k) => Some(*k),
            AnalysisType::Named(name) => self.env.kind_of(name),
            _ => None,
        }
    }

    pub fn is_subtype(&self, sub: &AnalysisType, sup: &AnalysisType) -> bool {
        match (sub, sup) {
            (_, AnalysisType::Top) => true,
            (AnalysisType::Bot, _) => true,
            (AnalysisType::BotPrim, _) => false,
            (AnalysisType::Top, _) => false,
            (a, b) if a == b => true,
            (AnalysisType::Primitive(_), _) => false,
            (AnalysisType::Named(n), AnalysisType::Primitive(k)) => self.env.kind_of(n) == Some(*k),
            (AnalysisType::Named(a), AnalysisType::Named(b)) => self.env.is_member(a, b),
            _ => false,
        }
    }

    /// Greatest lower bound
    pub fn meet(&self, a: &AnalysisType, b: &AnalysisType) -> AnalysisType {
        if self.is_subtype(a, b) {
            return a.clone();
        }
        if self.is_subtype(b, a) {
            return b.clone();
        }
        match (self.kind_of(a), self.kind_of(b)) {
            (Some(x), Some(y)) if x == y => AnalysisType::BotPrim,
            _ => AnalysisType::Bot,
        }
    }
}
