//! Type representation for the Aven type system.
//!
//! Every value-bearing expression has a *qualified* type: a pair of a
//! qualifier set (`@cst` / `@mut`) and an unqualified type. Inference
//! variables are `ena` union-find keys; inference-time unions are
//! id-addressed member lists whose membership shrinks monotonically while
//! constraints are solved.

use std::fmt;

use ena::unify::InPlaceUnificationTable;

use crate::decls::DeclId;

/// A unification variable, identified by an index into the `ena` table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TyVar(pub u32);

/// A non-empty subset of `{@cst, @mut}` -- or the empty set, which is only
/// legal while the wrapped type is still a union or an unresolved variable.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualSet(u8);

impl QualSet {
    pub const EMPTY: QualSet = QualSet(0);
    pub const CST: QualSet = QualSet(1);
    pub const MUT: QualSet = QualSet(2);
    pub const BOTH: QualSet = QualSet(3);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: QualSet) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: QualSet) -> QualSet {
        QualSet(self.0 | other.0)
    }
}

impl fmt::Display for QualSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            QualSet::EMPTY => write!(f, ""),
            QualSet::CST => write!(f, "@cst"),
            QualSet::MUT => write!(f, "@mut"),
            _ => write!(f, "@cst @mut"),
        }
    }
}

impl fmt::Debug for QualSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// A qualified type: qualifier set plus unqualified type.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct QualTy {
    pub quals: QualSet,
    pub ty: Ty,
}

impl QualTy {
    pub fn new(quals: QualSet, ty: Ty) -> Self {
        Self { quals, ty }
    }

    /// A `@cst`-qualified type.
    pub fn cst(ty: Ty) -> Self {
        Self::new(QualSet::CST, ty)
    }

    /// A `@mut`-qualified type.
    pub fn mutable(ty: Ty) -> Self {
        Self::new(QualSet::MUT, ty)
    }

    /// A type with no qualifier information yet (variables and unions).
    pub fn bare(ty: Ty) -> Self {
        Self::new(QualSet::EMPTY, ty)
    }
}

impl fmt::Debug for QualTy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for QualTy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.quals.is_empty() {
            write!(f, "{}", self.ty)
        } else {
            write!(f, "{} {}", self.quals, self.ty)
        }
    }
}

/// The built-in scalar types.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BuiltinTy {
    Bool,
    Int,
    Float,
    String,
}

impl BuiltinTy {
    pub fn name(self) -> &'static str {
        match self {
            BuiltinTy::Bool => "Bool",
            BuiltinTy::Int => "Int",
            BuiltinTy::Float => "Float",
            BuiltinTy::String => "String",
        }
    }
}

/// An unqualified Aven type.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    /// The top type.
    Anything,
    /// The bottom type, also the codomain of procedures.
    Nothing,
    /// An unresolved generic parameter, bound at specialization time.
    Placeholder(String),
    /// An inference variable.
    Var(TyVar),
    /// A built-in scalar.
    Builtin(BuiltinTy),
    /// A struct, union, or interface. Identity is the declaration.
    Nominal(NominalTy),
    /// A function type, possibly generic.
    Fun(FunTy),
    /// The type of a type-name expression.
    Meta(Box<Ty>),
    /// A specialization of a generic nominal or function type. Bindings are
    /// kept sorted by placeholder name.
    BoundGeneric {
        base: Box<Ty>,
        bindings: Vec<(String, QualTy)>,
    },
    /// An inference-time choice among several qualified types.
    Union(UnionId),
}

/// A nominal type. Two nominal types are equal iff they reference the same
/// declaration.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NominalTy {
    pub decl: DeclId,
    pub name: String,
    /// Generic placeholder names declared on the nominal, in order.
    pub placeholders: Vec<String>,
}

/// A function type: labeled parameters and a codomain, plus the names of
/// any generic placeholders quantified over it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunTy {
    pub placeholders: Vec<String>,
    pub params: Vec<FunTyParam>,
    pub codomain: Box<QualTy>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunTyParam {
    pub label: Option<String>,
    pub ty: QualTy,
}

impl Ty {
    pub fn bool() -> Ty {
        Ty::Builtin(BuiltinTy::Bool)
    }

    pub fn int() -> Ty {
        Ty::Builtin(BuiltinTy::Int)
    }

    pub fn float() -> Ty {
        Ty::Builtin(BuiltinTy::Float)
    }

    pub fn string() -> Ty {
        Ty::Builtin(BuiltinTy::String)
    }

    pub fn fun(params: Vec<FunTyParam>, codomain: QualTy) -> Ty {
        Ty::Fun(FunTy {
            placeholders: Vec::new(),
            params,
            codomain: Box::new(codomain),
        })
    }

    /// Whether the given variable occurs anywhere in this type's structure.
    /// Union members are consulted through the table.
    pub fn mentions(&self, var: TyVar, ctx: &InferCtx) -> bool {
        match self {
            Ty::Var(v) => *v == var,
            Ty::Anything | Ty::Nothing | Ty::Placeholder(_) | Ty::Builtin(_) | Ty::Nominal(_) => {
                false
            }
            Ty::Fun(fun) => {
                fun.params.iter().any(|p| p.ty.ty.mentions(var, ctx))
                    || fun.codomain.ty.mentions(var, ctx)
            }
            Ty::Meta(inner) => inner.mentions(var, ctx),
            Ty::BoundGeneric { base, bindings } => {
                base.mentions(var, ctx)
                    || bindings.iter().any(|(_, b)| b.ty.mentions(var, ctx))
            }
            Ty::Union(id) => ctx
                .union_members(*id)
                .iter()
                .any(|m| m.ty.mentions(var, ctx)),
        }
    }
}

impl fmt::Debug for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Anything => write!(f, "Anything"),
            Ty::Nothing => write!(f, "Nothing"),
            Ty::Placeholder(name) => write!(f, "{name}"),
            Ty::Var(v) => write!(f, "?{}", v.0),
            Ty::Builtin(b) => write!(f, "{}", b.name()),
            Ty::Nominal(n) => write!(f, "{}", n.name),
            Ty::Fun(fun) => {
                write!(f, "(")?;
                for (i, p) in fun.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if let Some(label) = &p.label {
                        write!(f, "{label}: ")?;
                    }
                    write!(f, "{}", p.ty)?;
                }
                write!(f, ") -> {}", fun.codomain)
            }
            Ty::Meta(inner) => write!(f, "Meta<{inner}>"),
            Ty::BoundGeneric { base, bindings } => {
                write!(f, "{base}<")?;
                for (i, (name, bound)) in bindings.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name} = {bound}")?;
                }
                write!(f, ">")
            }
            Ty::Union(id) => write!(f, "union#{}", id.0),
        }
    }
}

// ── ena trait implementations ──────────────────────────────────────────

impl ena::unify::UnifyKey for TyVar {
    type Value = Option<QualTy>;

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        TyVar(u)
    }

    fn tag() -> &'static str {
        "TyVar"
    }
}

impl ena::unify::EqUnifyValue for QualTy {}

// ── Unions ─────────────────────────────────────────────────────────────

/// Identity of one inference-time union in the [`InferCtx`] union table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct UnionId(pub u32);

/// The inference context: the union-find table for variables plus the
/// arena of inference unions.
///
/// Created before constraint generation and threaded through realization,
/// generation, and solving, so that every pass sees the same variables and
/// the same (shrinking) unions.
pub struct InferCtx {
    pub(crate) table: InPlaceUnificationTable<TyVar>,
    unions: Vec<Vec<QualTy>>,
}

impl InferCtx {
    pub fn new() -> Self {
        Self {
            table: InPlaceUnificationTable::new(),
            unions: Vec::new(),
        }
    }

    /// Create a fresh unification variable.
    pub fn fresh_var(&mut self) -> Ty {
        Ty::Var(self.table.new_key(None))
    }

    /// Allocate a new union over the given members.
    pub fn new_union(&mut self, members: Vec<QualTy>) -> Ty {
        debug_assert!(!members.is_empty(), "unions are never empty");
        let id = UnionId(self.unions.len() as u32);
        self.unions.push(members);
        Ty::Union(id)
    }

    /// A union of the `@cst` and `@mut` variants of an unqualified type,
    /// letting inference pick the aliasing discipline.
    pub fn either_qualified(&mut self, ty: Ty) -> Ty {
        self.new_union(vec![QualTy::cst(ty.clone()), QualTy::mutable(ty)])
    }

    pub fn union_members(&self, id: UnionId) -> &[QualTy] {
        &self.unions[id.0 as usize]
    }

    /// Replace a union's members in place. Membership only ever shrinks.
    pub fn reduce_union(&mut self, id: UnionId, members: Vec<QualTy>) {
        debug_assert!(!members.is_empty(), "reduced unions keep at least one member");
        self.unions[id.0 as usize] = members;
    }

    /// Snapshot the union table for disjunction trials.
    pub fn union_snapshot(&self) -> Vec<Vec<QualTy>> {
        self.unions.clone()
    }

    /// Roll the union table back to a snapshot.
    pub fn union_rollback(&mut self, snapshot: Vec<Vec<QualTy>>) {
        self.unions = snapshot;
    }

    // ── Resolution ─────────────────────────────────────────────────────

    /// Resolve variable chains and collapsed unions at the top level of a
    /// qualified type. Qualifiers recorded on a binding are adopted by the
    /// occurrence when the occurrence itself carries none.
    pub fn walk(&mut self, qt: QualTy) -> QualTy {
        match qt.ty {
            Ty::Var(v) => match self.table.probe_value(v) {
                Some(bound) => {
                    let resolved = self.walk(bound);
                    if qt.quals.is_empty() {
                        resolved
                    } else {
                        QualTy::new(qt.quals, resolved.ty)
                    }
                }
                None => {
                    // normalize to the root key so unified-but-unbound
                    // variables compare equal
                    let root = self.table.find(v);
                    QualTy::new(qt.quals, Ty::Var(root))
                }
            },
            Ty::Union(id) => {
                let members = self.union_members(id);
                if members.len() == 1 {
                    let only = members[0].clone();
                    let resolved = self.walk(only);
                    if qt.quals.is_empty() {
                        resolved
                    } else {
                        QualTy::new(qt.quals, resolved.ty)
                    }
                } else {
                    qt
                }
            }
            _ => qt,
        }
    }

    /// Occurs check: does `var` appear inside `ty` after resolving bound
    /// variables?
    pub fn occurs_in(&mut self, var: TyVar, ty: &Ty) -> bool {
        match ty {
            Ty::Var(v) => {
                if self.table.unioned(*v, var) {
                    return true;
                }
                match self.table.probe_value(*v) {
                    Some(inner) => self.occurs_in(var, &inner.ty),
                    None => false,
                }
            }
            Ty::Anything | Ty::Nothing | Ty::Placeholder(_) | Ty::Builtin(_) | Ty::Nominal(_) => {
                false
            }
            Ty::Fun(fun) => {
                let mut parts: Vec<&Ty> = fun.params.iter().map(|p| &p.ty.ty).collect();
                parts.push(&fun.codomain.ty);
                parts.into_iter().any(|p| self.occurs_in(var, p))
            }
            Ty::Meta(inner) => self.occurs_in(var, inner),
            Ty::BoundGeneric { base, bindings } => {
                self.occurs_in(var, base)
                    || bindings
                        .iter()
                        .map(|(_, b)| &b.ty)
                        .any(|b| self.occurs_in(var, b))
            }
            Ty::Union(id) => {
                let members: Vec<Ty> =
                    self.union_members(*id).iter().map(|m| m.ty.clone()).collect();
                members.iter().any(|m| self.occurs_in(var, m))
            }
        }
    }

    // ── Instantiation ──────────────────────────────────────────────────

    /// Make a use-site copy of a type: every quantified placeholder is
    /// replaced by a fresh variable and every union is re-allocated, so
    /// separate uses infer separate bindings and shrink separate unions.
    pub fn fresh_instance(&mut self, ty: &Ty) -> Ty {
        let mapping: Vec<(String, QualTy)> = match ty {
            Ty::Fun(fun) => fun
                .placeholders
                .iter()
                .map(|name| {
                    let var = self.fresh_var();
                    (name.clone(), QualTy::bare(var))
                })
                .collect(),
            _ => Vec::new(),
        };
        self.copy_ty(ty, &mapping)
    }

    /// Instantiate a member type against the bindings of its owner: the
    /// given placeholder mapping is applied and unions are re-allocated.
    pub fn instance_with(&mut self, ty: &QualTy, mapping: &[(String, QualTy)]) -> QualTy {
        self.copy_qual(ty, mapping)
    }

    fn copy_ty(&mut self, ty: &Ty, mapping: &[(String, QualTy)]) -> Ty {
        match ty {
            Ty::Placeholder(name) => match mapping.iter().find(|(n, _)| n == name) {
                Some((_, replacement)) => replacement.ty.clone(),
                None => ty.clone(),
            },
            Ty::Anything | Ty::Nothing | Ty::Var(_) | Ty::Builtin(_) | Ty::Nominal(_) => {
                ty.clone()
            }
            Ty::Fun(fun) => Ty::Fun(FunTy {
                placeholders: fun
                    .placeholders
                    .iter()
                    .filter(|p| !mapping.iter().any(|(n, _)| n == *p))
                    .cloned()
                    .collect(),
                params: fun
                    .params
                    .iter()
                    .map(|p| FunTyParam {
                        label: p.label.clone(),
                        ty: self.copy_qual(&p.ty, mapping),
                    })
                    .collect(),
                codomain: Box::new(self.copy_qual(&fun.codomain, mapping)),
            }),
            Ty::Meta(inner) => Ty::Meta(Box::new(self.copy_ty(inner, mapping))),
            Ty::BoundGeneric { base, bindings } => Ty::BoundGeneric {
                base: Box::new(self.copy_ty(base, mapping)),
                bindings: bindings
                    .iter()
                    .map(|(n, b)| (n.clone(), self.copy_qual(b, mapping)))
                    .collect(),
            },
            Ty::Union(id) => {
                let members = self.union_members(*id).to_vec();
                let copied = members
                    .iter()
                    .map(|m| self.copy_qual(m, mapping))
                    .collect();
                self.new_union(copied)
            }
        }
    }

    fn copy_qual(&mut self, qt: &QualTy, mapping: &[(String, QualTy)]) -> QualTy {
        if let Ty::Placeholder(name) = &qt.ty {
            if let Some((_, replacement)) = mapping.iter().find(|(n, _)| n == name) {
                let quals = if qt.quals.is_empty() {
                    replacement.quals
                } else {
                    qt.quals
                };
                return QualTy::new(quals, replacement.ty.clone());
            }
        }
        QualTy::new(qt.quals, self.copy_ty(&qt.ty, mapping))
    }
}

impl Default for InferCtx {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace placeholders by name throughout a type. A substituted
/// occurrence keeps its written qualifiers when it has any, otherwise it
/// adopts the replacement's.
pub fn substitute_placeholders(ty: &Ty, mapping: &[(String, QualTy)]) -> Ty {
    match ty {
        Ty::Placeholder(name) => match mapping.iter().find(|(n, _)| n == name) {
            Some((_, replacement)) => replacement.ty.clone(),
            None => ty.clone(),
        },
        Ty::Anything | Ty::Nothing | Ty::Var(_) | Ty::Builtin(_) | Ty::Nominal(_) | Ty::Union(_) => {
            ty.clone()
        }
        Ty::Fun(fun) => Ty::Fun(FunTy {
            // substituted placeholders are no longer quantified here
            placeholders: fun
                .placeholders
                .iter()
                .filter(|p| !mapping.iter().any(|(n, _)| n == *p))
                .cloned()
                .collect(),
            params: fun
                .params
                .iter()
                .map(|p| FunTyParam {
                    label: p.label.clone(),
                    ty: substitute_qual(&p.ty, mapping),
                })
                .collect(),
            codomain: Box::new(substitute_qual(&fun.codomain, mapping)),
        }),
        Ty::Meta(inner) => Ty::Meta(Box::new(substitute_placeholders(inner, mapping))),
        Ty::BoundGeneric { base, bindings } => Ty::BoundGeneric {
            base: Box::new(substitute_placeholders(base, mapping)),
            bindings: bindings
                .iter()
                .map(|(n, b)| (n.clone(), substitute_qual(b, mapping)))
                .collect(),
        },
    }
}

fn substitute_qual(qt: &QualTy, mapping: &[(String, QualTy)]) -> QualTy {
    if let Ty::Placeholder(name) = &qt.ty {
        if let Some((_, replacement)) = mapping.iter().find(|(n, _)| n == name) {
            let quals = if qt.quals.is_empty() {
                replacement.quals
            } else {
                qt.quals
            };
            return QualTy::new(quals, replacement.ty.clone());
        }
    }
    QualTy::new(qt.quals, substitute_placeholders(&qt.ty, mapping))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualset_operations() {
        assert!(QualSet::BOTH.contains(QualSet::MUT));
        assert!(!QualSet::CST.contains(QualSet::MUT));
        assert_eq!(QualSet::CST.union(QualSet::MUT), QualSet::BOTH);
        assert!(QualSet::EMPTY.is_empty());
    }

    #[test]
    fn walk_resolves_variable_chains() {
        let mut ctx = InferCtx::new();
        let a = ctx.fresh_var();
        let Ty::Var(va) = a else { unreachable!() };
        ctx.table
            .unify_var_value(va, Some(QualTy::cst(Ty::int())))
            .unwrap();
        let walked = ctx.walk(QualTy::bare(Ty::Var(va)));
        assert_eq!(walked, QualTy::cst(Ty::int()));
    }

    #[test]
    fn walk_adopts_binding_qualifiers() {
        let mut ctx = InferCtx::new();
        let Ty::Var(v) = ctx.fresh_var() else { unreachable!() };
        ctx.table
            .unify_var_value(v, Some(QualTy::mutable(Ty::bool())))
            .unwrap();
        // an occurrence that wrote no qualifiers adopts @mut
        assert_eq!(
            ctx.walk(QualTy::bare(Ty::Var(v))),
            QualTy::mutable(Ty::bool())
        );
        // an occurrence with its own qualifiers keeps them
        assert_eq!(
            ctx.walk(QualTy::cst(Ty::Var(v))),
            QualTy::cst(Ty::bool())
        );
    }

    #[test]
    fn walk_collapses_singleton_unions() {
        let mut ctx = InferCtx::new();
        let union = ctx.new_union(vec![QualTy::cst(Ty::int())]);
        assert_eq!(ctx.walk(QualTy::bare(union)), QualTy::cst(Ty::int()));
    }

    #[test]
    fn walk_keeps_wide_unions() {
        let mut ctx = InferCtx::new();
        let union = ctx.either_qualified(Ty::int());
        let walked = ctx.walk(QualTy::bare(union.clone()));
        assert_eq!(walked.ty, union);
    }

    #[test]
    fn occurs_in_function_type() {
        let mut ctx = InferCtx::new();
        let Ty::Var(v) = ctx.fresh_var() else { unreachable!() };
        let fun = Ty::fun(
            vec![FunTyParam {
                label: None,
                ty: QualTy::cst(Ty::Var(v)),
            }],
            QualTy::cst(Ty::int()),
        );
        assert!(ctx.occurs_in(v, &fun));
        assert!(!ctx.occurs_in(v, &Ty::int()));
    }

    #[test]
    fn fresh_instance_replaces_placeholders_with_fresh_vars() {
        let mut ctx = InferCtx::new();
        let generic = Ty::Fun(FunTy {
            placeholders: vec!["T".to_string()],
            params: vec![FunTyParam {
                label: None,
                ty: QualTy::bare(Ty::Placeholder("T".to_string())),
            }],
            codomain: Box::new(QualTy::bare(Ty::Placeholder("T".to_string()))),
        });
        let inst = ctx.fresh_instance(&generic);
        let Ty::Fun(fun) = &inst else { panic!("expected a function type") };
        assert!(fun.placeholders.is_empty());
        let Ty::Var(param_var) = &fun.params[0].ty.ty else {
            panic!("expected a variable parameter");
        };
        assert_eq!(fun.codomain.ty, Ty::Var(*param_var));
        // separate instantiations use separate variables
        let inst2 = ctx.fresh_instance(&generic);
        assert_ne!(inst, inst2);
    }

    #[test]
    fn fresh_instance_reallocates_unions() {
        let mut ctx = InferCtx::new();
        let union = ctx.either_qualified(Ty::int());
        let fun = Ty::fun(
            vec![FunTyParam {
                label: None,
                ty: QualTy::bare(union.clone()),
            }],
            QualTy::cst(Ty::Nothing),
        );
        let inst = ctx.fresh_instance(&fun);
        let Ty::Fun(inst_fun) = &inst else { panic!("expected a function type") };
        // the copied union is a different union object
        assert_ne!(inst_fun.params[0].ty.ty, union);
        assert!(matches!(inst_fun.params[0].ty.ty, Ty::Union(_)));
    }

    #[test]
    fn display_forms() {
        assert_eq!(Ty::int().to_string(), "Int");
        assert_eq!(QualTy::cst(Ty::bool()).to_string(), "@cst Bool");
        let fun = Ty::fun(
            vec![FunTyParam {
                label: Some("x".to_string()),
                ty: QualTy::cst(Ty::int()),
            }],
            QualTy::mutable(Ty::bool()),
        );
        assert_eq!(fun.to_string(), "(x: @cst Int) -> @mut Bool");
    }
}
