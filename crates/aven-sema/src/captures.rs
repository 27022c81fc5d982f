//! Capture analysis.
//!
//! For every function declaration (named or lambda), computes the set of
//! properties and parameters it references that live in an *enclosing*
//! frame -- an outer function's scope, or the module top level (which is
//! the synthesized `main`'s frame). A reference inside a nested function
//! counts for every enclosing function that does not itself own the
//! symbol, so captures propagate outward through lambda nests.

use aven_parser::ast::*;
use rustc_hash::FxHashMap;

use crate::decls::{CtxKind, DeclCtxId, DeclId, DeclKind, DeclTable};
use crate::resolve::{Resolution, Resolutions};

/// Function decl -> captured symbols, in first-reference order.
pub type CaptureMap = FxHashMap<DeclId, Vec<DeclId>>;

/// Run capture analysis over a module.
pub fn analyze_captures(
    module: &Module,
    table: &DeclTable,
    resolutions: &Resolutions,
) -> CaptureMap {
    let mut analyzer = Analyzer {
        table,
        resolutions,
        captures: CaptureMap::default(),
        stack: Vec::new(),
    };
    for stmt in &module.stmts {
        analyzer.visit_stmt(stmt);
    }
    analyzer.captures
}

struct Analyzer<'a> {
    table: &'a DeclTable,
    resolutions: &'a Resolutions,
    captures: CaptureMap,
    /// Enclosing function declarations, innermost last.
    stack: Vec<DeclId>,
}

impl Analyzer<'_> {
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

    fn visit_decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Prop(prop) => {
                if let Some((_, init)) = &prop.initializer {
                    self.visit_expr(init);
                }
            }
            Decl::Fun(fun) => self.visit_fun(fun),
            Decl::Struct(s) => self.visit_block(&s.body),
            Decl::Union(s) => self.visit_block(&s.body),
            Decl::Interface(s) => self.visit_block(&s.body),
            Decl::Extension(ext) => self.visit_block(&ext.body),
            Decl::UnionCase(_) => {}
        }
    }

    fn visit_fun(&mut self, fun: &FunDecl) {
        let Some(decl_id) = self.table.decl_of_node(fun.id) else {
            return;
        };
        self.captures.entry(decl_id).or_default();
        self.stack.push(decl_id);
        if let Some(body) = &fun.body {
            self.visit_block(body);
        }
        self.stack.pop();
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident(ident) => {
                if let Some(Resolution::Decl(decl)) = self.resolutions.get(ident.id) {
                    self.reference(*decl);
                }
            }
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
            Expr::Cast(e) => self.visit_expr(&e.operand),
            Expr::Lambda(lambda) => self.visit_fun(&lambda.fun),
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

    /// Record a reference to `decl` from the current function nest.
    fn reference(&mut self, decl: DeclId) {
        let info = self.table.decl(decl);
        if !matches!(info.kind, DeclKind::Prop { .. } | DeclKind::Param) {
            return;
        }
        // properties stored in a nominal type are reached through `self`,
        // not captured from a frame
        if let Some(ctx) = info.ctx {
            if matches!(
                self.table.ctx(ctx).kind,
                CtxKind::Nominal(_) | CtxKind::Extension(_)
            ) {
                return;
            }
        }
        let owners = self.owning_functions(info.ctx);
        // innermost-out: every function between the reference and the
        // symbol's frame captures it
        for &fun in self.stack.iter().rev() {
            if owners.contains(&fun) {
                break;
            }
            let list = self.captures.entry(fun).or_default();
            if !list.contains(&decl) {
                list.push(decl);
            }
        }
    }

    /// The chain of function declarations enclosing a context. An empty
    /// chain means the symbol lives in the module frame.
    fn owning_functions(&self, ctx: Option<DeclCtxId>) -> Vec<DeclId> {
        let Some(ctx) = ctx else { return Vec::new() };
        self.table
            .ancestors(ctx)
            .into_iter()
            .filter_map(|c| match self.table.ctx(c).kind {
                CtxKind::Function(decl) => Some(decl),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finalize::finalize;
    use crate::resolve::resolve;
    use aven_parser::parse;

    fn run(source: &str) -> (CaptureMap, DeclTable) {
        let parsed = parse(source, "test");
        assert!(!parsed.issues.has_errors());
        let (table, errors) = finalize(&parsed.module);
        assert!(errors.is_empty(), "{errors:?}");
        let (resolutions, errors) = resolve(&parsed.module, &table);
        assert!(errors.is_empty(), "{errors:?}");
        let captures = analyze_captures(&parsed.module, &table, &resolutions);
        (captures, table)
    }

    fn decl_named(table: &DeclTable, name: &str) -> DeclId {
        table
            .decls()
            .find(|d| d.name == name)
            .unwrap_or_else(|| panic!("no decl named {name}"))
            .id
    }

    #[test]
    fn nested_function_captures_outer_local() {
        let (captures, table) =
            run("fun f() { let c = 0\nfun g() -> Int { return = c } }");
        let g = decl_named(&table, "g");
        let c = decl_named(&table, "c");
        assert_eq!(captures[&g], vec![c]);
        // f itself captures nothing: c lives in f's own frame
        let f = decl_named(&table, "f");
        assert!(captures[&f].is_empty());
    }

    #[test]
    fn function_without_captures() {
        let (captures, table) = run("fun f(_ x: Int) -> Int { return = x }");
        let f = decl_named(&table, "f");
        assert!(captures[&f].is_empty());
    }

    #[test]
    fn module_level_symbols_are_captured() {
        let (captures, table) = run("let g = 1\nfun f() -> Int { return = g }");
        let f = decl_named(&table, "f");
        let g = decl_named(&table, "g");
        assert_eq!(captures[&f], vec![g]);
    }

    #[test]
    fn captures_propagate_through_lambda_nests() {
        let (captures, table) = run(
            "fun f() { let c = 0\nfun g() { let h = fun () -> Int { return = c } } }",
        );
        let g = decl_named(&table, "g");
        let c = decl_named(&table, "c");
        // the lambda captures c, and so does g (c lives in f's frame)
        assert_eq!(captures[&g], vec![c]);
        let lambda = captures
            .iter()
            .find(|(decl, _)| table.decl(**decl).name.is_empty())
            .map(|(_, caps)| caps.clone())
            .expect("lambda analyzed");
        assert_eq!(lambda, vec![c]);
    }

    #[test]
    fn method_member_access_is_not_a_capture() {
        let (captures, table) =
            run("struct S { let v: Int\nfun m() -> Int { return = v } }");
        let m = decl_named(&table, "m");
        assert!(captures[&m].is_empty());
    }
}
