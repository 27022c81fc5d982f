//! Name binding: every identifier use is associated with the declaration
//! context that defines it.
//!
//! Lookup starts at the innermost scope and climbs toward the module.
//! While a `let x = ...` initializer is being visited, `x` is in the
//! *under-declaration* set for its scope, so references to `x` inside the
//! initializer resolve to an enclosing scope's `x` instead of the one
//! being declared.
//!
//! Select members (`a.b`) are deliberately left unresolved here; which
//! declaration `b` names depends on the owner's inferred type, so they are
//! deferred to type inference.

use aven_parser::ast::*;
use rustc_hash::FxHashMap;

use crate::decls::{CtxKind, DeclCtxId, DeclId, DeclTable};
use crate::error::SemaError;

/// What an identifier use resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A single declaration.
    Decl(DeclId),
    /// A set of function overloads, innermost first.
    Overloads(Vec<DeclId>),
}

/// The binder's output: identifier and signature nodes mapped to the
/// declarations they name.
#[derive(Debug, Default)]
pub struct Resolutions {
    map: FxHashMap<NodeId, Resolution>,
}

impl Resolutions {
    pub fn get(&self, node: NodeId) -> Option<&Resolution> {
        self.map.get(&node)
    }

    fn record(&mut self, node: NodeId, resolution: Resolution) {
        self.map.insert(node, resolution);
    }
}

/// Run the name binder over a module.
pub fn resolve(module: &Module, table: &DeclTable) -> (Resolutions, Vec<SemaError>) {
    let mut binder = Binder {
        table,
        resolutions: Resolutions::default(),
        errors: Vec::new(),
        under_decl: Vec::new(),
    };
    let root = table.module_ctx();
    for stmt in &module.stmts {
        binder.visit_stmt(stmt, root);
    }
    (binder.resolutions, binder.errors)
}

struct Binder<'a> {
    table: &'a DeclTable,
    resolutions: Resolutions,
    errors: Vec<SemaError>,
    /// Names currently being declared, with the scope to skip for them.
    under_decl: Vec<(DeclCtxId, String)>,
}

impl Binder<'_> {
    // ── Lookup ─────────────────────────────────────────────────────────

    /// Resolve a name from `ctx` outward. Returns `None` when no scope
    /// defines it.
    fn lookup(&self, ctx: DeclCtxId, name: &str) -> Option<Resolution> {
        if name == "Self" {
            return self
                .enclosing_self(ctx)
                .map(Resolution::Decl);
        }

        let mut overloads: Vec<DeclId> = Vec::new();
        for scope in self.table.ancestors(ctx) {
            if self
                .under_decl
                .iter()
                .any(|(skip, n)| *skip == scope && n == name)
            {
                continue;
            }
            let mut hits = self.table.named_in(scope, name);
            // an extension scope also sees its subject's members
            if hits.is_empty() {
                if let CtxKind::Extension(node) = self.table.ctx(scope).kind {
                    if let Some(Resolution::Decl(subject)) = self.resolutions.get(node) {
                        if let Some(subject_ctx) = self.table.decl(*subject).opens {
                            hits = self.table.named_in(subject_ctx, name);
                        }
                    }
                }
            }
            if hits.is_empty() {
                continue;
            }
            let all_funs = hits
                .iter()
                .all(|&d| self.table.decl(d).kind.overloadable());
            if all_funs {
                overloads.extend(hits);
                // keep climbing: outer overloads stay visible
                continue;
            }
            // a non-function declaration shadows everything further out
            if overloads.is_empty() {
                return Some(Resolution::Decl(hits[0]));
            }
            break;
        }
        match overloads.len() {
            0 => None,
            1 => Some(Resolution::Decl(overloads[0])),
            _ => Some(Resolution::Overloads(overloads)),
        }
    }

    /// The nominal declaration `Self` refers to in `ctx`: the enclosing
    /// nominal type, or an extension's subject.
    fn enclosing_self(&self, ctx: DeclCtxId) -> Option<DeclId> {
        for scope in self.table.ancestors(ctx) {
            match self.table.ctx(scope).kind {
                CtxKind::Nominal(decl) => return Some(decl),
                // an extension's subject was recorded under its AST node
                // when the extension was entered
                CtxKind::Extension(node) => {
                    return match self.resolutions.get(node) {
                        Some(Resolution::Decl(decl)) => Some(*decl),
                        _ => None,
                    };
                }
                _ => {}
            }
        }
        None
    }

    // ── Statements ─────────────────────────────────────────────────────

    fn visit_stmt(&mut self, stmt: &Stmt, ctx: DeclCtxId) {
        match stmt {
            Stmt::Decl(decl) => self.visit_decl(decl, ctx),
            Stmt::Brace(block) => self.visit_block(block, ctx),
            Stmt::If(s) => {
                self.visit_expr(&s.cond, ctx);
                self.visit_block(&s.then_block, ctx);
                if let Some(else_branch) = &s.else_branch {
                    self.visit_stmt(else_branch, ctx);
                }
            }
            Stmt::While(s) => {
                self.visit_expr(&s.cond, ctx);
                self.visit_block(&s.body, ctx);
            }
            Stmt::Return(s) => {
                if let Some((_, value)) = &s.binding {
                    self.visit_expr(value, ctx);
                }
            }
            Stmt::Binding(s) => {
                self.visit_expr(&s.lvalue, ctx);
                self.visit_expr(&s.rvalue, ctx);
            }
            Stmt::Expr(e) => self.visit_expr(e, ctx),
            Stmt::Invalid { .. } => {}
        }
    }

    fn visit_block(&mut self, block: &Block, parent: DeclCtxId) {
        let ctx = self.table.ctx_of_node(block.id).unwrap_or(parent);
        for stmt in &block.stmts {
            self.visit_stmt(stmt, ctx);
        }
    }

    // ── Declarations ───────────────────────────────────────────────────

    fn visit_decl(&mut self, decl: &Decl, ctx: DeclCtxId) {
        match decl {
            Decl::Prop(prop) => {
                if let Some(sign) = &prop.sign {
                    self.visit_sign(sign, ctx);
                }
                if let Some((_, init)) = &prop.initializer {
                    self.under_decl.push((ctx, prop.name.clone()));
                    self.visit_expr(init, ctx);
                    self.under_decl.pop();
                }
            }
            Decl::Fun(fun) => self.visit_fun(fun, ctx),
            Decl::Struct(s) => self.visit_nominal_body(s.id, &s.body, ctx),
            Decl::Union(s) => self.visit_nominal_body(s.id, &s.body, ctx),
            Decl::Interface(s) => self.visit_nominal_body(s.id, &s.body, ctx),
            Decl::Extension(ext) => self.visit_extension(ext, ctx),
            Decl::UnionCase(case) => self.visit_sign(&case.sign, ctx),
        }
    }

    fn visit_fun(&mut self, fun: &FunDecl, outer: DeclCtxId) {
        let fun_ctx = self
            .table
            .decl_of_node(fun.id)
            .and_then(|id| self.table.decl(id).opens)
            .unwrap_or(outer);
        for param in &fun.params {
            if let Some(sign) = &param.sign {
                self.visit_sign(sign, fun_ctx);
            }
        }
        if let Some(codomain) = &fun.codomain {
            self.visit_sign(codomain, fun_ctx);
        }
        if let Some(body) = &fun.body {
            self.visit_block(body, fun_ctx);
        }
    }

    fn visit_nominal_body(&mut self, node: NodeId, body: &Block, outer: DeclCtxId) {
        let ctx = self
            .table
            .decl_of_node(node)
            .and_then(|id| self.table.decl(id).opens)
            .unwrap_or(outer);
        for stmt in &body.stmts {
            self.visit_stmt(stmt, ctx);
        }
    }

    fn visit_extension(&mut self, ext: &ExtensionDecl, ctx: DeclCtxId) {
        // resolve the subject in the enclosing (module) scope
        match self.lookup(ctx, &ext.subject) {
            Some(Resolution::Decl(decl)) if self.table.decl(decl).kind.is_type() => {
                self.resolutions.record(ext.id, Resolution::Decl(decl));
            }
            Some(_) => self.errors.push(SemaError::NotAType {
                name: ext.subject.clone(),
                span: ext.subject_span,
            }),
            None => self.errors.push(SemaError::UndefinedSymbol {
                name: ext.subject.clone(),
                span: ext.subject_span,
            }),
        }
        let ext_ctx = self.table.ctx_of_node(ext.id).unwrap_or(ctx);
        for stmt in &ext.body.stmts {
            self.visit_stmt(stmt, ext_ctx);
        }
    }

    // ── Expressions ────────────────────────────────────────────────────

    fn visit_expr(&mut self, expr: &Expr, ctx: DeclCtxId) {
        match expr {
            Expr::Ident(ident) => match self.lookup(ctx, &ident.name) {
                Some(resolution) => self.resolutions.record(ident.id, resolution),
                None => self.errors.push(SemaError::UndefinedSymbol {
                    name: ident.name.clone(),
                    span: ident.span,
                }),
            },
            // the owner resolves now; the member waits for inference
            Expr::Select(e) => self.visit_expr(&e.owner, ctx),
            Expr::Call(e) => {
                self.visit_expr(&e.callee, ctx);
                for arg in &e.args {
                    self.visit_expr(&arg.value, ctx);
                }
            }
            Expr::Subscript(e) => {
                self.visit_expr(&e.callee, ctx);
                for arg in &e.args {
                    self.visit_expr(&arg.value, ctx);
                }
            }
            Expr::Infix(e) => {
                self.visit_expr(&e.lhs, ctx);
                self.visit_expr(&e.rhs, ctx);
            }
            Expr::Prefix(e) => self.visit_expr(&e.operand, ctx),
            Expr::Cast(e) => {
                self.visit_expr(&e.operand, ctx);
                self.visit_sign(&e.sign, ctx);
            }
            Expr::Lambda(lambda) => self.visit_fun(&lambda.fun, ctx),
            Expr::Enclosed { inner, .. } => self.visit_expr(inner, ctx),
            Expr::ArrayLit { elements, .. } | Expr::SetLit { elements, .. } => {
                for elem in elements {
                    self.visit_expr(elem, ctx);
                }
            }
            Expr::MapLit { entries, .. } => {
                for (key, value) in entries {
                    self.visit_expr(key, ctx);
                    self.visit_expr(value, ctx);
                }
            }
            _ => {}
        }
    }

    // ── Signatures ─────────────────────────────────────────────────────

    /// Builtin type names realize without a declaration.
    fn is_builtin_type_name(name: &str) -> bool {
        matches!(
            name,
            "Bool" | "Int" | "Float" | "String" | "Anything" | "Nothing"
        )
    }

    fn visit_sign(&mut self, sign: &Sign, ctx: DeclCtxId) {
        match sign {
            Sign::Ident(ident) => {
                for arg in &ident.args {
                    self.visit_sign(arg, ctx);
                }
                if Self::is_builtin_type_name(&ident.name) {
                    return;
                }
                match self.lookup(ctx, &ident.name) {
                    Some(Resolution::Decl(decl))
                        if self.table.decl(decl).kind.is_type() =>
                    {
                        self.resolutions.record(ident.id, Resolution::Decl(decl));
                    }
                    Some(_) => self.errors.push(SemaError::NotAType {
                        name: ident.name.clone(),
                        span: ident.span,
                    }),
                    None => self.errors.push(SemaError::UndefinedSymbol {
                        name: ident.name.clone(),
                        span: ident.span,
                    }),
                }
            }
            Sign::Nested(nested) => self.visit_sign(&nested.owner, ctx),
            // `::Member` reads in the enclosing nominal type's scope
            Sign::ImplicitNested(implicit) => {
                let member = self
                    .enclosing_self(ctx)
                    .and_then(|owner| self.table.decl(owner).opens)
                    .map(|owner_ctx| self.table.named_in(owner_ctx, &implicit.member))
                    .unwrap_or_default()
                    .into_iter()
                    .find(|&d| self.table.decl(d).kind.is_type());
                match member {
                    Some(decl) => {
                        self.resolutions.record(implicit.id, Resolution::Decl(decl));
                    }
                    None => self.errors.push(SemaError::UndefinedSymbol {
                        name: format!("::{}", implicit.member),
                        span: implicit.span,
                    }),
                }
            }
            Sign::Fun(fun) => {
                for param in &fun.params {
                    self.visit_sign(&param.sign, ctx);
                }
                self.visit_sign(&fun.codomain, ctx);
            }
            Sign::Qualified(qualified) => self.visit_sign(&qualified.inner, ctx),
            Sign::Invalid { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decls::DeclKind;
    use crate::finalize::finalize;
    use aven_parser::parse;

    fn run(source: &str) -> (Resolutions, Vec<SemaError>, DeclTable, Module) {
        let parsed = parse(source, "test");
        assert!(!parsed.issues.has_errors());
        let (table, errors) = finalize(&parsed.module);
        assert!(errors.is_empty(), "finalizer errors: {errors:?}");
        let (resolutions, errors) = resolve(&parsed.module, &table);
        (resolutions, errors, table, parsed.module)
    }

    /// Find the resolution of the first `Ident` expression named `name`.
    fn resolution_of<'r>(
        module: &Module,
        resolutions: &'r Resolutions,
        name: &str,
    ) -> Option<&'r Resolution> {
        fn find_in_expr(expr: &Expr, name: &str) -> Option<NodeId> {
            match expr {
                Expr::Ident(e) if e.name == name => Some(e.id),
                Expr::Select(e) => find_in_expr(&e.owner, name),
                Expr::Call(e) => find_in_expr(&e.callee, name)
                    .or_else(|| e.args.iter().find_map(|a| find_in_expr(&a.value, name))),
                Expr::Infix(e) => {
                    find_in_expr(&e.lhs, name).or_else(|| find_in_expr(&e.rhs, name))
                }
                Expr::Prefix(e) => find_in_expr(&e.operand, name),
                Expr::Enclosed { inner, .. } => find_in_expr(inner, name),
                _ => None,
            }
        }
        fn find_in_stmt(stmt: &Stmt, name: &str) -> Option<NodeId> {
            match stmt {
                Stmt::Decl(Decl::Prop(p)) => p
                    .initializer
                    .as_ref()
                    .and_then(|(_, init)| find_in_expr(init, name)),
                Stmt::Decl(Decl::Fun(f)) => f
                    .body
                    .as_ref()
                    .and_then(|b| b.stmts.iter().find_map(|s| find_in_stmt(s, name))),
                Stmt::Return(r) => r
                    .binding
                    .as_ref()
                    .and_then(|(_, v)| find_in_expr(v, name)),
                Stmt::Binding(b) => {
                    find_in_expr(&b.lvalue, name).or_else(|| find_in_expr(&b.rvalue, name))
                }
                Stmt::Expr(e) => find_in_expr(e, name),
                Stmt::Brace(b) => b.stmts.iter().find_map(|s| find_in_stmt(s, name)),
                _ => None,
            }
        }
        let node = module.stmts.iter().find_map(|s| find_in_stmt(s, name))?;
        resolutions.get(node)
    }

    #[test]
    fn local_use_resolves_to_local_decl() {
        let (resolutions, errors, table, module) = run("let x = 1\nx <- 2");
        assert!(errors.is_empty());
        let Some(Resolution::Decl(decl)) = resolution_of(&module, &resolutions, "x") else {
            panic!("x should resolve to one declaration");
        };
        assert_eq!(table.decl(*decl).name, "x");
    }

    #[test]
    fn undefined_symbol_is_reported() {
        let (_, errors, _, _) = run("y <- 2");
        assert!(matches!(
            errors.as_slice(),
            [SemaError::UndefinedSymbol { name, .. }] if name == "y"
        ));
    }

    #[test]
    fn initializer_skips_the_name_being_declared() {
        // inner `let x = x` must see the outer x, not itself
        let (resolutions, errors, table, module) = run("let x = 1\nfun f() { let x = x }");
        assert!(errors.is_empty(), "{errors:?}");
        let Some(Resolution::Decl(decl)) = resolution_of(&module, &resolutions, "x") else {
            panic!("inner initializer x should resolve");
        };
        // it resolved to the module-level x (attached to the module ctx)
        assert_eq!(table.decl(*decl).ctx, Some(table.module_ctx()));
    }

    #[test]
    fn self_declared_initializer_without_outer_is_undefined() {
        let (_, errors, _, _) = run("fun f() { let a = a }");
        assert!(matches!(
            errors.as_slice(),
            [SemaError::UndefinedSymbol { name, .. }] if name == "a"
        ));
    }

    #[test]
    fn overloads_collect_across_scopes() {
        let (resolutions, errors, _, module) = run(
            "fun f(_ x: Int) -> Int { }\nfun f(_ x: Bool) -> Bool { }\nf(true)",
        );
        assert!(errors.is_empty());
        let Some(Resolution::Overloads(set)) = resolution_of(&module, &resolutions, "f") else {
            panic!("f should resolve to an overload set");
        };
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn inner_non_function_shadows_outer_function() {
        let (resolutions, errors, table, module) =
            run("fun g() { }\nfun h() { let g = 1\ng <- 2 }");
        assert!(errors.is_empty());
        let Some(Resolution::Decl(decl)) = resolution_of(&module, &resolutions, "g") else {
            panic!("g should resolve to the local property");
        };
        assert_eq!(
            table.decl(*decl).kind,
            DeclKind::Prop { mutable: false }
        );
    }

    #[test]
    fn select_member_is_left_unresolved() {
        let (resolutions, errors, _, module) = run("let p = 1\np.fst");
        assert!(errors.is_empty());
        // the owner resolves
        assert!(resolution_of(&module, &resolutions, "p").is_some());
        // the select node itself has no resolution
        let Stmt::Expr(Expr::Select(select)) = &module.stmts[1] else {
            panic!("expected select statement");
        };
        assert!(resolutions.get(select.id).is_none());
    }

    #[test]
    fn self_resolves_to_enclosing_nominal() {
        let (_, errors, _, _) = run("struct S { fun m() -> Self { } }");
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn members_visible_in_method_bodies() {
        let (_, errors, _, _) = run("struct S { let v: Int\nfun m() -> Int { return = v } }");
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn sign_names_must_be_types() {
        let (_, errors, _, _) = run("let x = 1\nlet y: x = 2");
        assert!(matches!(
            errors.as_slice(),
            [SemaError::NotAType { name, .. }] if name == "x"
        ));
    }

    #[test]
    fn builtin_type_names_need_no_declaration() {
        let (_, errors, _, _) = run("let x: Int = 1\nlet b: Bool = true");
        assert!(errors.is_empty());
    }
}
