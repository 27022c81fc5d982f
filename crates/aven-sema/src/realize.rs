//! Type realization: written signatures become internal qualified types.
//!
//! Two jobs happen in one walk. Every nominal declaration gets a
//! [`NominalInfo`] entry in the registry (stored properties in declaration
//! order, methods, constructors, union cases, with extension members merged
//! into their subject). And every declaration that has a type -- props,
//! params, functions, generic placeholders -- gets a [`QualTy`] in the
//! declaration type map.
//!
//! A signature written without qualifiers realizes to a *union* of its
//! `@cst` and `@mut` variants, so inference can pick the aliasing
//! discipline later.

use aven_parser::ast::*;
use rustc_hash::FxHashMap;

use crate::decls::{CtxKind, DeclId, DeclKind, DeclTable};
use crate::error::SemaError;
use crate::resolve::{Resolution, Resolutions};
use crate::ty::{FunTy, FunTyParam, InferCtx, NominalTy, QualSet, QualTy, Ty};

/// A stored property of a nominal type. Position in the owner's `props`
/// list is the member's extraction index.
#[derive(Debug, Clone)]
pub struct PropMember {
    pub decl: DeclId,
    pub name: String,
    pub ty: QualTy,
}

/// Everything the compiler knows about one nominal type.
#[derive(Debug)]
pub struct NominalInfo {
    pub decl: DeclId,
    pub name: String,
    pub kind: DeclKind,
    pub placeholders: Vec<String>,
    /// Stored properties in declaration order.
    pub props: Vec<PropMember>,
    /// Methods by name (overloadable), including extension methods.
    pub methods: Vec<(String, DeclId)>,
    /// Explicit `new` declarations.
    pub constructors: Vec<DeclId>,
    /// `del` declarations.
    pub destructors: Vec<DeclId>,
    /// Union `case` members.
    pub cases: Vec<(DeclId, QualTy)>,
    /// Synthesized when a struct declares no `new`.
    pub default_ctor: Option<FunTy>,
}

impl NominalInfo {
    /// Find a stored property and its extraction index.
    pub fn prop(&self, name: &str) -> Option<(usize, &PropMember)> {
        self.props
            .iter()
            .enumerate()
            .find(|(_, p)| p.name == name)
    }

    /// All methods with the given name.
    pub fn methods_named(&self, name: &str) -> Vec<DeclId> {
        self.methods
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, d)| *d)
            .collect()
    }

    /// The type an instance of this nominal has: plain `Nominal`, or a
    /// `BoundGeneric` over its own placeholders when it is generic.
    pub fn self_ty(&self) -> Ty {
        let base = Ty::Nominal(NominalTy {
            decl: self.decl,
            name: self.name.clone(),
            placeholders: self.placeholders.clone(),
        });
        if self.placeholders.is_empty() {
            base
        } else {
            let mut bindings: Vec<(String, QualTy)> = self
                .placeholders
                .iter()
                .map(|p| (p.clone(), QualTy::bare(Ty::Placeholder(p.clone()))))
                .collect();
            bindings.sort_by(|a, b| a.0.cmp(&b.0));
            Ty::BoundGeneric {
                base: Box::new(base),
                bindings,
            }
        }
    }
}

/// Nominal declaration id -> info.
#[derive(Debug, Default)]
pub struct NominalRegistry {
    map: FxHashMap<DeclId, NominalInfo>,
}

impl NominalRegistry {
    pub fn get(&self, decl: DeclId) -> Option<&NominalInfo> {
        self.map.get(&decl)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NominalInfo> {
        self.map.values()
    }

    fn get_mut(&mut self, decl: DeclId) -> Option<&mut NominalInfo> {
        self.map.get_mut(&decl)
    }
}

/// Output of the realizer.
#[derive(Debug)]
pub struct RealizeResult {
    pub registry: NominalRegistry,
    pub decl_types: FxHashMap<DeclId, QualTy>,
    /// Realized cast signatures, keyed by the cast expression node.
    pub cast_types: FxHashMap<NodeId, QualTy>,
}

/// Run the type realizer over a module.
pub fn realize(
    module: &Module,
    table: &DeclTable,
    resolutions: &Resolutions,
    infer: &mut InferCtx,
) -> (RealizeResult, Vec<SemaError>) {
    let mut realizer = Realizer {
        table,
        resolutions,
        infer,
        registry: NominalRegistry::default(),
        decl_types: FxHashMap::default(),
        cast_types: FxHashMap::default(),
        errors: Vec::new(),
    };

    // phase A: register every nominal so signatures may refer to any of
    // them regardless of declaration order
    for info in table.decls() {
        if matches!(
            info.kind,
            DeclKind::Struct | DeclKind::Union | DeclKind::Interface
        ) {
            let placeholders = info
                .opens
                .map(|ctx| {
                    table
                        .ctx(ctx)
                        .decls
                        .iter()
                        .filter(|&&d| table.decl(d).kind == DeclKind::GenericParam)
                        .map(|&d| table.decl(d).name.clone())
                        .collect()
                })
                .unwrap_or_default();
            realizer.registry.map.insert(
                info.id,
                NominalInfo {
                    decl: info.id,
                    name: info.name.clone(),
                    kind: info.kind,
                    placeholders,
                    props: Vec::new(),
                    methods: Vec::new(),
                    constructors: Vec::new(),
                    destructors: Vec::new(),
                    cases: Vec::new(),
                    default_ctor: None,
                },
            );
        }
    }

    // phase B: realize every declaration's signature
    for stmt in &module.stmts {
        realizer.visit_stmt(stmt);
    }

    // phase C: structs without an explicit constructor get a default one
    // built from their stored properties
    let mut defaults = Vec::new();
    for info in realizer.registry.map.values() {
        if info.kind == DeclKind::Struct && info.constructors.is_empty() {
            let params = info
                .props
                .iter()
                .map(|p| FunTyParam {
                    label: Some(p.name.clone()),
                    ty: p.ty.clone(),
                })
                .collect();
            defaults.push((
                info.decl,
                FunTy {
                    placeholders: info.placeholders.clone(),
                    params,
                    codomain: Box::new(QualTy::mutable(info.self_ty())),
                },
            ));
        }
    }
    for (decl, ctor) in defaults {
        if let Some(info) = realizer.registry.get_mut(decl) {
            info.default_ctor = Some(ctor);
        }
    }

    let errors = std::mem::take(&mut realizer.errors);
    (
        RealizeResult {
            registry: realizer.registry,
            decl_types: realizer.decl_types,
            cast_types: realizer.cast_types,
        },
        errors,
    )
}

struct Realizer<'a> {
    table: &'a DeclTable,
    resolutions: &'a Resolutions,
    infer: &'a mut InferCtx,
    registry: NominalRegistry,
    decl_types: FxHashMap<DeclId, QualTy>,
    cast_types: FxHashMap<NodeId, QualTy>,
    errors: Vec<SemaError>,
}

impl Realizer<'_> {
    // ── Walk ───────────────────────────────────────────────────────────

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Decl(decl) => self.visit_decl(decl),
            Stmt::Brace(block) => self.visit_block(block),
            Stmt::If(s) => {
                self.visit_expr(&s.cond);
                self.visit_block(&s.then_block);
                if let Some(else_branch) = &s.else_branch {
                    self.visit_stmt(else_branch);
                }
            }
            Stmt::While(s) => {
                self.visit_expr(&s.cond);
                self.visit_block(&s.body);
            }
            Stmt::Return(s) => {
                if let Some((_, value)) = &s.binding {
                    self.visit_expr(value);
                }
            }
            Stmt::Binding(s) => {
                self.visit_expr(&s.lvalue);
                self.visit_expr(&s.rvalue);
            }
            Stmt::Expr(e) => self.visit_expr(e),
            Stmt::Invalid { .. } => {}
        }
    }

    fn visit_block(&mut self, block: &Block) {
        for stmt in &block.stmts {
            self.visit_stmt(stmt);
        }
    }

    /// Expressions are walked only to reach lambdas and cast signatures.
    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Lambda(lambda) => self.visit_fun(&lambda.fun),
            Expr::Select(e) => self.visit_expr(&e.owner),
            Expr::Call(e) => {
                self.visit_expr(&e.callee);
                for arg in &e.args {
                    self.visit_expr(&arg.value);
                }
            }
            Expr::Subscript(e) => {
                self.visit_expr(&e.callee);
                for arg in &e.args {
                    self.visit_expr(&arg.value);
                }
            }
            Expr::Infix(e) => {
                self.visit_expr(&e.lhs);
                self.visit_expr(&e.rhs);
            }
            Expr::Prefix(e) => self.visit_expr(&e.operand),
            Expr::Cast(e) => {
                self.visit_expr(&e.operand);
                let ty = self.realize(&e.sign);
                self.cast_types.insert(e.id, ty);
            }
            Expr::Enclosed { inner, .. } => self.visit_expr(inner),
            Expr::ArrayLit { elements, .. } | Expr::SetLit { elements, .. } => {
                for elem in elements {
                    self.visit_expr(elem);
                }
            }
            Expr::MapLit { entries, .. } => {
                for (key, value) in entries {
                    self.visit_expr(key);
                    self.visit_expr(value);
                }
            }
            _ => {}
        }
    }

    fn visit_decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Prop(prop) => self.visit_prop(prop),
            Decl::Fun(fun) => self.visit_fun(fun),
            Decl::Struct(s) => self.visit_nominal(s.id, &s.generic_params, &s.body),
            Decl::Union(s) => self.visit_nominal(s.id, &s.generic_params, &s.body),
            Decl::Interface(s) => self.visit_nominal(s.id, &s.generic_params, &s.body),
            Decl::Extension(ext) => self.visit_block(&ext.body),
            Decl::UnionCase(case) => {
                let Some(decl_id) = self.table.decl_of_node(case.id) else {
                    return;
                };
                let ty = self.realize(&case.sign);
                if let Some(owner) = self.owner_of(decl_id) {
                    if let Some(info) = self.registry.get_mut(owner) {
                        info.cases.push((decl_id, ty));
                    }
                }
            }
        }
    }

    fn visit_prop(&mut self, prop: &PropDecl) {
        let Some(decl_id) = self.table.decl_of_node(prop.id) else {
            return;
        };
        let ty = match &prop.sign {
            Some(sign) => self.realize(sign),
            None => QualTy::bare(self.infer.fresh_var()),
        };
        self.decl_types.insert(decl_id, ty.clone());

        // a property attached inside a nominal body is a stored member
        let nominal_owner = self
            .table
            .decl(decl_id)
            .ctx
            .and_then(|ctx| match self.table.ctx(ctx).kind {
                CtxKind::Nominal(owner) => Some(owner),
                _ => None,
            });
        if let Some(owner) = nominal_owner {
            if let Some(info) = self.registry.get_mut(owner) {
                info.props.push(PropMember {
                    decl: decl_id,
                    name: prop.name.clone(),
                    ty,
                });
            }
        }

        if let Some((_, init)) = &prop.initializer {
            self.visit_expr(init);
        }
    }

    fn visit_fun(&mut self, fun: &FunDecl) {
        let Some(decl_id) = self.table.decl_of_node(fun.id) else {
            return;
        };
        let owner = self.owner_of(decl_id);

        // generic placeholders realize to themselves
        for generic in &fun.generic_params {
            if let Some(generic_id) = self.table.decl_of_node(generic.id) {
                self.decl_types.insert(
                    generic_id,
                    QualTy::bare(Ty::Placeholder(generic.name.clone())),
                );
            }
        }

        let mut placeholders: Vec<String> =
            fun.generic_params.iter().map(|g| g.name.clone()).collect();

        let params: Vec<FunTyParam> = fun
            .params
            .iter()
            .map(|param| {
                let ty = match &param.sign {
                    Some(sign) => self.realize(sign),
                    None => QualTy::bare(self.infer.fresh_var()),
                };
                if let Some(param_id) = self.table.decl_of_node(param.id) {
                    self.decl_types.insert(param_id, ty.clone());
                }
                FunTyParam {
                    label: param.label.clone(),
                    ty,
                }
            })
            .collect();

        let kind = match self.table.decl(decl_id).kind {
            DeclKind::Fun { kind } => kind,
            _ => FunKind::Regular,
        };

        let codomain = if kind == FunKind::Constructor {
            // a constructor yields a fresh, mutable instance of its owner,
            // quantified over the owner's placeholders
            match owner.and_then(|o| self.registry.get(o)) {
                Some(info) => {
                    for p in &info.placeholders {
                        if !placeholders.contains(p) {
                            placeholders.push(p.clone());
                        }
                    }
                    QualTy::mutable(info.self_ty())
                }
                None => QualTy::bare(self.infer.fresh_var()),
            }
        } else {
            match &fun.codomain {
                Some(sign) => self.realize(sign),
                None => QualTy::cst(Ty::Nothing),
            }
        };

        let fun_ty = Ty::Fun(FunTy {
            placeholders,
            params,
            codomain: Box::new(codomain),
        });
        self.decl_types.insert(decl_id, QualTy::cst(fun_ty));

        // register methods/constructors/destructors with their owner
        if let Some(owner) = owner {
            let name = fun.name.clone();
            if let Some(info) = self.registry.get_mut(owner) {
                match kind {
                    FunKind::Constructor => info.constructors.push(decl_id),
                    FunKind::Destructor => info.destructors.push(decl_id),
                    _ => info.methods.push((name, decl_id)),
                }
            }
        }

        if let Some(body) = &fun.body {
            self.visit_block(body);
        }
    }

    fn visit_nominal(&mut self, node: NodeId, generics: &[GenericParamDecl], body: &Block) {
        for generic in generics {
            if let Some(generic_id) = self.table.decl_of_node(generic.id) {
                self.decl_types.insert(
                    generic_id,
                    QualTy::bare(Ty::Placeholder(generic.name.clone())),
                );
            }
        }
        let _ = node;
        self.visit_block(body);
    }

    /// The nominal type a member declaration belongs to, looking through
    /// extension contexts to their subject.
    fn owner_of(&self, decl_id: DeclId) -> Option<DeclId> {
        let ctx = self.table.decl(decl_id).ctx?;
        match self.table.ctx(ctx).kind {
            CtxKind::Nominal(owner) => Some(owner),
            CtxKind::Extension(node) => match self.resolutions.get(node) {
                Some(Resolution::Decl(subject)) => Some(*subject),
                _ => None,
            },
            _ => None,
        }
    }

    // ── Signature realization ──────────────────────────────────────────

    /// Realize a signature to a qualified type. Explicit qualifiers are
    /// attached as written; an unqualified signature becomes a union of
    /// the two qualifier variants.
    fn realize(&mut self, sign: &Sign) -> QualTy {
        if let Sign::Qualified(q) = sign {
            let mut quals = QualSet::EMPTY;
            for (qual, _) in &q.quals {
                quals = quals.union(match qual {
                    Qual::Cst => QualSet::CST,
                    Qual::Mut => QualSet::MUT,
                });
            }
            let inner = self.realize_unqual(&q.inner);
            QualTy::new(quals, inner)
        } else {
            let inner = self.realize_unqual(sign);
            QualTy::bare(self.infer.either_qualified(inner))
        }
    }

    fn realize_unqual(&mut self, sign: &Sign) -> Ty {
        match sign {
            Sign::Ident(ident) => self.realize_ident(ident),
            Sign::Nested(nested) => {
                let owner = self.realize_unqual(&nested.owner);
                self.realize_nested(&owner, &nested.member, nested.member_span)
            }
            Sign::ImplicitNested(implicit) => match self.resolutions.get(implicit.id) {
                Some(Resolution::Decl(decl)) => self.nominal_ty_of(*decl),
                _ => self.infer.fresh_var(),
            },
            Sign::Fun(fun) => {
                let params = fun
                    .params
                    .iter()
                    .map(|p| FunTyParam {
                        label: p.label.clone(),
                        ty: self.realize(&p.sign),
                    })
                    .collect();
                let codomain = self.realize(&fun.codomain);
                Ty::Fun(FunTy {
                    placeholders: Vec::new(),
                    params,
                    codomain: Box::new(codomain),
                })
            }
            Sign::Qualified(inner) => {
                // nested qualifiers fold into the inner type
                let qt = self.realize(sign);
                let _ = inner;
                qt.ty
            }
            Sign::Invalid { .. } => self.infer.fresh_var(),
        }
    }

    fn realize_ident(&mut self, ident: &IdentSign) -> Ty {
        let builtin = match ident.name.as_str() {
            "Bool" => Some(Ty::bool()),
            "Int" => Some(Ty::int()),
            "Float" => Some(Ty::float()),
            "String" => Some(Ty::string()),
            "Anything" => Some(Ty::Anything),
            "Nothing" => Some(Ty::Nothing),
            _ => None,
        };
        if let Some(ty) = builtin {
            if !ident.args.is_empty() {
                self.errors.push(SemaError::GenericArityMismatch {
                    name: ident.name.clone(),
                    expected: 0,
                    found: ident.args.len(),
                    span: ident.span,
                });
            }
            return ty;
        }

        let Some(Resolution::Decl(decl)) = self.resolutions.get(ident.id) else {
            // the binder already reported this name
            return self.infer.fresh_var();
        };
        let decl = *decl;
        if self.table.decl(decl).kind == DeclKind::GenericParam {
            return Ty::Placeholder(self.table.decl(decl).name.clone());
        }

        let base = self.nominal_ty_of(decl);
        if ident.args.is_empty() {
            return base;
        }
        let placeholders = match self.registry.get(decl) {
            Some(info) => info.placeholders.clone(),
            None => Vec::new(),
        };
        if placeholders.len() != ident.args.len() {
            self.errors.push(SemaError::GenericArityMismatch {
                name: ident.name.clone(),
                expected: placeholders.len(),
                found: ident.args.len(),
                span: ident.span,
            });
            return base;
        }
        let mut bindings: Vec<(String, QualTy)> = placeholders
            .into_iter()
            .zip(ident.args.iter().map(|arg| self.realize(arg)))
            .collect();
        bindings.sort_by(|a, b| a.0.cmp(&b.0));
        Ty::BoundGeneric {
            base: Box::new(base),
            bindings,
        }
    }

    fn realize_nested(&mut self, owner: &Ty, member: &str, span: aven_common::Span) -> Ty {
        let owner_decl = match owner {
            Ty::Nominal(n) => Some(n.decl),
            Ty::BoundGeneric { base, .. } => match base.as_ref() {
                Ty::Nominal(n) => Some(n.decl),
                _ => None,
            },
            _ => None,
        };
        let nested = owner_decl
            .and_then(|d| self.table.decl(d).opens)
            .map(|ctx| self.table.named_in(ctx, member))
            .unwrap_or_default()
            .into_iter()
            .find(|&d| self.table.decl(d).kind.is_type());
        match nested {
            Some(decl) => self.nominal_ty_of(decl),
            None => {
                self.errors.push(SemaError::UnknownNestedType {
                    owner: owner.to_string(),
                    member: member.to_string(),
                    span,
                });
                self.infer.fresh_var()
            }
        }
    }

    /// The instance type of a nominal declaration.
    fn nominal_ty_of(&mut self, decl: DeclId) -> Ty {
        match self.registry.get(decl) {
            Some(info) => Ty::Nominal(NominalTy {
                decl,
                name: info.name.clone(),
                placeholders: info.placeholders.clone(),
            }),
            None => {
                // a generic parameter reached through Self or nesting
                let info = self.table.decl(decl);
                if info.kind == DeclKind::GenericParam {
                    Ty::Placeholder(info.name.clone())
                } else {
                    self.infer.fresh_var()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finalize::finalize;
    use crate::resolve::resolve;
    use aven_parser::parse;

    fn run(source: &str) -> (RealizeResult, Vec<SemaError>, DeclTable, InferCtx) {
        let parsed = parse(source, "test");
        assert!(!parsed.issues.has_errors());
        let (table, errors) = finalize(&parsed.module);
        assert!(errors.is_empty(), "finalizer errors: {errors:?}");
        let (resolutions, errors) = resolve(&parsed.module, &table);
        assert!(errors.is_empty(), "binder errors: {errors:?}");
        let mut infer = InferCtx::new();
        let (result, errors) = realize(&parsed.module, &table, &resolutions, &mut infer);
        (result, errors, table, infer)
    }

    fn decl_named(table: &DeclTable, name: &str) -> DeclId {
        table
            .decls()
            .find(|d| d.name == name)
            .unwrap_or_else(|| panic!("no decl named {name}"))
            .id
    }

    #[test]
    fn explicit_qualifier_realizes_directly() {
        let (result, errors, table, _) = run("let x: @mut Int = 0");
        assert!(errors.is_empty());
        let ty = &result.decl_types[&decl_named(&table, "x")];
        assert_eq!(*ty, QualTy::mutable(Ty::int()));
    }

    #[test]
    fn unqualified_sign_realizes_to_union() {
        let (result, errors, table, infer) = run("let x: Int = 0");
        assert!(errors.is_empty());
        let ty = &result.decl_types[&decl_named(&table, "x")];
        assert!(ty.quals.is_empty());
        let Ty::Union(id) = ty.ty else {
            panic!("expected a union, got {ty}");
        };
        let members = infer.union_members(id);
        assert_eq!(members.len(), 2);
        assert!(members.contains(&QualTy::cst(Ty::int())));
        assert!(members.contains(&QualTy::mutable(Ty::int())));
    }

    #[test]
    fn struct_registers_props_in_order() {
        let (result, errors, table, _) =
            run("struct Pair<A, B> { let fst: A\nlet snd: B }");
        assert!(errors.is_empty());
        let info = result
            .registry
            .get(decl_named(&table, "Pair"))
            .expect("Pair registered");
        assert_eq!(info.placeholders, ["A", "B"]);
        assert_eq!(info.prop("fst").map(|(i, _)| i), Some(0));
        assert_eq!(info.prop("snd").map(|(i, _)| i), Some(1));
    }

    #[test]
    fn struct_without_new_gets_default_ctor() {
        let (result, errors, table, _) = run("struct P { let v: Int }");
        assert!(errors.is_empty());
        let info = result.registry.get(decl_named(&table, "P")).unwrap();
        let ctor = info.default_ctor.as_ref().expect("default constructor");
        assert_eq!(ctor.params.len(), 1);
        assert_eq!(ctor.params[0].label.as_deref(), Some("v"));
        assert_eq!(ctor.codomain.quals, QualSet::MUT);
    }

    #[test]
    fn explicit_ctor_suppresses_default() {
        let (result, errors, table, _) = run("struct P { let v: Int\nnew(_ value: Int) { } }");
        assert!(errors.is_empty());
        let info = result.registry.get(decl_named(&table, "P")).unwrap();
        assert!(info.default_ctor.is_none());
        assert_eq!(info.constructors.len(), 1);
    }

    #[test]
    fn generic_fun_type_quantifies_placeholders() {
        let (result, errors, table, _) = run("fun id<T>(_ v: T) -> T { return := v }");
        assert!(errors.is_empty());
        let ty = &result.decl_types[&decl_named(&table, "id")];
        let Ty::Fun(fun) = &ty.ty else {
            panic!("expected a function type");
        };
        assert_eq!(fun.placeholders, ["T"]);
        assert_eq!(fun.params.len(), 1);
        assert_eq!(fun.params[0].label, None);
    }

    #[test]
    fn missing_codomain_is_nothing() {
        let (result, errors, table, _) = run("fun f() { }");
        assert!(errors.is_empty());
        let ty = &result.decl_types[&decl_named(&table, "f")];
        let Ty::Fun(fun) = &ty.ty else {
            panic!("expected a function type");
        };
        assert_eq!(*fun.codomain, QualTy::cst(Ty::Nothing));
    }

    #[test]
    fn generic_sign_args_build_bound_generic() {
        let (result, errors, table, _) = run(
            "struct Pair<A, B> { let fst: A\nlet snd: B }\nlet q = 0\nlet p: @cst Pair<Int, Bool> = q",
        );
        assert!(errors.is_empty());
        let ty = &result.decl_types[&decl_named(&table, "p")];
        let Ty::BoundGeneric { base, bindings } = &ty.ty else {
            panic!("expected a bound generic, got {ty}");
        };
        assert!(matches!(base.as_ref(), Ty::Nominal(n) if n.name == "Pair"));
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].0, "A");
        assert_eq!(bindings[1].0, "B");
    }

    #[test]
    fn generic_arity_mismatch_reported() {
        let (_, errors, _, _) =
            run("struct Box<T> { let v: T }\nlet x = 0\nlet b: @cst Box<Int, Bool> = x");
        assert!(errors
            .iter()
            .any(|e| matches!(e, SemaError::GenericArityMismatch { .. })));
    }

    #[test]
    fn extension_methods_merge_into_subject() {
        let (result, errors, table, _) =
            run("struct S { let v: Int }\nextension S { fun m() -> Int { return := v } }");
        assert!(errors.is_empty(), "{errors:?}");
        let info = result.registry.get(decl_named(&table, "S")).unwrap();
        assert_eq!(info.methods_named("m").len(), 1);
    }
}
