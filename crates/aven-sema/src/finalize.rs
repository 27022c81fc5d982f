//! Parse finalization: declaration contexts and well-formedness.
//!
//! Builds the [`DeclTable`] for a module by a depth-first walk. Every
//! named declaration is checked for uniqueness against its siblings in the
//! current context *and* the immediate parent (so a body-level `let`
//! cannot silently shadow a parameter, nor a member its type's scope).
//! Invalid declarations stay in the table but are never attached to a
//! context; later passes treat references to them as undefined.

use aven_parser::ast::*;

use crate::decls::{CtxKind, DeclCtxId, DeclId, DeclKind, DeclTable};
use crate::error::SemaError;

/// Run the finalizer over a module.
pub fn finalize(module: &Module) -> (DeclTable, Vec<SemaError>) {
    let mut finalizer = Finalizer {
        table: DeclTable::new(),
        errors: Vec::new(),
    };
    let root = finalizer.table.module_ctx();
    for stmt in &module.stmts {
        finalizer.visit_stmt(stmt, root);
    }
    (finalizer.table, finalizer.errors)
}

struct Finalizer {
    table: DeclTable,
    errors: Vec<SemaError>,
}

impl Finalizer {
    // ── Statements ─────────────────────────────────────────────────────

    fn visit_stmt(&mut self, stmt: &Stmt, ctx: DeclCtxId) {
        match stmt {
            Stmt::Decl(decl) => self.visit_decl(decl, ctx),
            Stmt::Brace(block) => {
                let block_ctx = self.table.new_ctx(ctx, CtxKind::Block(block.id));
                for stmt in &block.stmts {
                    self.visit_stmt(stmt, block_ctx);
                }
            }
            Stmt::If(s) => {
                self.visit_expr(&s.cond, ctx);
                self.visit_block_scoped(&s.then_block, ctx);
                if let Some(else_branch) = &s.else_branch {
                    self.visit_stmt(else_branch, ctx);
                }
            }
            Stmt::While(s) => {
                self.visit_expr(&s.cond, ctx);
                self.visit_block_scoped(&s.body, ctx);
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

    /// A block in statement position opens its own scope.
    fn visit_block_scoped(&mut self, block: &Block, ctx: DeclCtxId) {
        let block_ctx = self.table.new_ctx(ctx, CtxKind::Block(block.id));
        for stmt in &block.stmts {
            self.visit_stmt(stmt, block_ctx);
        }
    }

    // ── Expressions (looking for lambdas) ──────────────────────────────

    fn visit_expr(&mut self, expr: &Expr, ctx: DeclCtxId) {
        match expr {
            Expr::Lambda(lambda) => self.visit_fun(&lambda.fun, ctx),
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
            Expr::Cast(e) => self.visit_expr(&e.operand, ctx),
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

    // ── Declarations ───────────────────────────────────────────────────

    fn visit_decl(&mut self, decl: &Decl, ctx: DeclCtxId) {
        match decl {
            Decl::Prop(prop) => self.visit_prop(prop, ctx),
            Decl::Fun(fun) => self.visit_fun(fun, ctx),
            Decl::Struct(s) => {
                self.visit_nominal(s.id, &s.name, s.name_span, DeclKind::Struct, &s.generic_params, &s.body, ctx)
            }
            Decl::Union(s) => {
                self.visit_nominal(s.id, &s.name, s.name_span, DeclKind::Union, &s.generic_params, &s.body, ctx)
            }
            Decl::Interface(s) => {
                self.visit_nominal(s.id, &s.name, s.name_span, DeclKind::Interface, &s.generic_params, &s.body, ctx)
            }
            Decl::Extension(ext) => self.visit_extension(ext, ctx),
            Decl::UnionCase(case) => {
                let name = match &case.sign {
                    Sign::Ident(s) => s.name.clone(),
                    _ => String::new(),
                };
                let id = self
                    .table
                    .new_decl(case.id, name, DeclKind::UnionCase, case.span);
                self.table.attach(id, ctx);
            }
        }
    }

    fn visit_prop(&mut self, prop: &PropDecl, ctx: DeclCtxId) {
        // no attribute is recognised on properties at this layer
        for attr in &prop.attrs {
            self.errors.push(SemaError::UnknownAttribute {
                name: attr.name.clone(),
                span: attr.span,
            });
        }
        self.check_modifiers(&prop.modifiers, ctx);

        let id = self.table.new_decl(
            prop.id,
            prop.name.clone(),
            DeclKind::Prop {
                mutable: prop.mutable,
            },
            prop.name_span,
        );
        self.attach_checked(id, ctx);

        if let Some((_, init)) = &prop.initializer {
            self.visit_expr(init, ctx);
        }
    }

    fn visit_fun(&mut self, fun: &FunDecl, ctx: DeclCtxId) {
        for attr in &fun.attrs {
            if attr.name != "air_name" {
                self.errors.push(SemaError::UnknownAttribute {
                    name: attr.name.clone(),
                    span: attr.span,
                });
            }
        }
        self.check_modifiers(&fun.modifiers, ctx);

        // members of a nominal type or extension are methods
        let kind = if fun.kind == FunKind::Regular && self.in_nominal_or_extension(ctx) {
            FunKind::Method
        } else {
            fun.kind
        };
        let id = self.table.new_decl(
            fun.id,
            fun.name.clone(),
            DeclKind::Fun { kind },
            fun.name_span,
        );
        // anonymous functions (lambdas) carry no name and attach nowhere
        if !fun.name.is_empty() {
            self.attach_checked(id, ctx);
        }

        let fun_ctx = self.table.new_ctx(ctx, CtxKind::Function(id));
        self.table.set_opens(id, fun_ctx);

        for generic in &fun.generic_params {
            let generic_id = self.table.new_decl(
                generic.id,
                generic.name.clone(),
                DeclKind::GenericParam,
                generic.span,
            );
            self.attach_checked(generic_id, fun_ctx);
        }
        for param in &fun.params {
            if param.sign.is_none() {
                self.errors.push(SemaError::MissingParamSign {
                    name: param.name.clone(),
                    span: param.span,
                });
            }
            let param_id = self.table.new_decl(
                param.id,
                param.name.clone(),
                DeclKind::Param,
                param.name_span,
            );
            self.attach_checked(param_id, fun_ctx);
        }
        if let Some(body) = &fun.body {
            self.visit_block_scoped(body, fun_ctx);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn visit_nominal(
        &mut self,
        node: NodeId,
        name: &str,
        name_span: aven_common::Span,
        kind: DeclKind,
        generics: &[GenericParamDecl],
        body: &Block,
        ctx: DeclCtxId,
    ) {
        let id = self.table.new_decl(node, name, kind, name_span);
        self.attach_checked(id, ctx);

        let nominal_ctx = self.table.new_ctx(ctx, CtxKind::Nominal(id));
        self.table.set_opens(id, nominal_ctx);

        for generic in generics {
            let generic_id = self.table.new_decl(
                generic.id,
                generic.name.clone(),
                DeclKind::GenericParam,
                generic.span,
            );
            self.attach_checked(generic_id, nominal_ctx);
        }
        // members attach straight to the nominal context
        for stmt in &body.stmts {
            self.visit_stmt(stmt, nominal_ctx);
        }
    }

    fn visit_extension(&mut self, ext: &ExtensionDecl, ctx: DeclCtxId) {
        if ctx != self.table.module_ctx() {
            self.errors.push(SemaError::NestedExtension { span: ext.span });
            return;
        }
        let ext_ctx = self.table.new_ctx(ctx, CtxKind::Extension(ext.id));
        for stmt in &ext.body.stmts {
            self.visit_stmt(stmt, ext_ctx);
        }
    }

    // ── Checks ─────────────────────────────────────────────────────────

    fn in_nominal_or_extension(&self, ctx: DeclCtxId) -> bool {
        matches!(
            self.table.ctx(ctx).kind,
            CtxKind::Nominal(_) | CtxKind::Extension(_)
        )
    }

    fn check_modifiers(&mut self, modifiers: &[ModifierNode], ctx: DeclCtxId) {
        if modifiers.is_empty() || self.in_nominal_or_extension(ctx) {
            return;
        }
        for modifier in modifiers {
            self.errors.push(SemaError::UnexpectedModifier {
                modifier: modifier.kind.to_string(),
                span: modifier.span,
            });
        }
    }

    /// Attach a declaration unless its name is empty or conflicts with a
    /// sibling in this context or its immediate parent.
    fn attach_checked(&mut self, id: DeclId, ctx: DeclCtxId) {
        let (name, kind, span) = {
            let info = self.table.decl(id);
            (info.name.clone(), info.kind, info.span)
        };
        if name.is_empty() {
            self.errors.push(SemaError::InvalidName { span });
            return;
        }

        let mut candidates = self.table.named_in(ctx, &name);
        if let Some(parent) = self.table.ctx(ctx).parent {
            candidates.extend(self.table.named_in(parent, &name));
        }
        let conflict = candidates
            .iter()
            .find(|&&c| !(kind.overloadable() && self.table.decl(c).kind.overloadable()));
        if let Some(&prior) = conflict {
            self.errors.push(SemaError::InvalidRedeclaration {
                name,
                span,
                prior: self.table.decl(prior).span,
            });
            return;
        }
        self.table.attach(id, ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aven_parser::parse;

    fn run(source: &str) -> (DeclTable, Vec<SemaError>) {
        let parsed = parse(source, "test");
        assert!(
            !parsed.issues.has_errors(),
            "parse errors: {:?}",
            parsed.issues.iter().collect::<Vec<_>>()
        );
        finalize(&parsed.module)
    }

    #[test]
    fn top_level_decls_attach_to_module() {
        let (table, errors) = run("let x = 1\nfun f() { }");
        assert!(errors.is_empty());
        let root = table.module_ctx();
        assert_eq!(table.named_in(root, "x").len(), 1);
        assert_eq!(table.named_in(root, "f").len(), 1);
    }

    #[test]
    fn duplicate_prop_is_rejected() {
        let (table, errors) = run("let x = 1\nlet x = 2");
        assert!(matches!(
            errors.as_slice(),
            [SemaError::InvalidRedeclaration { name, .. }] if name == "x"
        ));
        // the duplicate exists but has no context
        let unattached: Vec<_> = table
            .decls()
            .filter(|d| d.name == "x" && d.ctx.is_none())
            .collect();
        assert_eq!(unattached.len(), 1);
    }

    #[test]
    fn function_overloads_share_a_name() {
        let (table, errors) = run("fun f(_ x: Int) -> Int { }\nfun f(_ x: Bool) -> Bool { }");
        assert!(errors.is_empty());
        assert_eq!(table.named_in(table.module_ctx(), "f").len(), 2);
    }

    #[test]
    fn body_let_cannot_shadow_parameter() {
        let (_, errors) = run("fun f(_ x: Int) { let x = 1 }");
        assert!(matches!(
            errors.as_slice(),
            [SemaError::InvalidRedeclaration { name, .. }] if name == "x"
        ));
    }

    #[test]
    fn member_functions_become_methods() {
        let (table, errors) = run("struct S { fun m() { } }");
        assert!(errors.is_empty());
        let method = table
            .decls()
            .find(|d| d.name == "m")
            .expect("method declared");
        assert_eq!(
            method.kind,
            DeclKind::Fun {
                kind: FunKind::Method
            }
        );
    }

    #[test]
    fn modifier_outside_nominal_is_an_error() {
        let (_, errors) = run("static fun f() { }");
        assert!(matches!(
            errors.as_slice(),
            [SemaError::UnexpectedModifier { modifier, .. }] if modifier == "static"
        ));
    }

    #[test]
    fn modifier_inside_nominal_is_fine() {
        let (_, errors) = run("struct S { static fun f() { } }");
        assert!(errors.is_empty());
    }

    #[test]
    fn missing_param_sign_is_reported() {
        let (_, errors) = run("fun f(x) { }");
        assert!(matches!(
            errors.as_slice(),
            [SemaError::MissingParamSign { name, .. }] if name == "x"
        ));
    }

    #[test]
    fn nested_extension_is_rejected() {
        let (_, errors) = run("fun f() { extension Int { } }");
        assert!(errors
            .iter()
            .any(|e| matches!(e, SemaError::NestedExtension { .. })));
    }

    #[test]
    fn unknown_attribute_on_prop_warns() {
        let (_, errors) = run("@inline let x = 1");
        assert!(matches!(
            errors.as_slice(),
            [SemaError::UnknownAttribute { name, .. }] if name == "inline"
        ));
    }

    #[test]
    fn air_name_attribute_is_accepted() {
        let (_, errors) = run("@air_name(start) fun main() { }");
        assert!(errors.is_empty());
    }

    #[test]
    fn lambda_is_anonymous_without_error() {
        let (table, errors) = run("let f = fun (_ x: Int) -> Int { return = x }");
        assert!(errors.is_empty());
        // the lambda has a decl entry but no context
        let anonymous: Vec<_> = table
            .decls()
            .filter(|d| d.name.is_empty() && matches!(d.kind, DeclKind::Fun { .. }))
            .collect();
        assert_eq!(anonymous.len(), 1);
    }
}
