//! AST-to-source rendering.
//!
//! Produces canonical surface syntax for a parsed module. Unparsing then
//! re-parsing yields a structurally identical tree (trivia excepted), which
//! the parser tests check as a fixpoint: `unparse(parse(unparse(parse(s))))`
//! equals `unparse(parse(s))`.

use crate::ast::*;

/// Render a module back to surface syntax.
pub fn unparse(module: &Module) -> String {
    let mut printer = Printer::default();
    for stmt in &module.stmts {
        printer.stmt(stmt);
    }
    printer.out
}

#[derive(Default)]
struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn line_start(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
    }

    fn push(&mut self, s: &str) {
        self.out.push_str(s);
    }

    // ── Statements ─────────────────────────────────────────────────────

    fn stmt(&mut self, stmt: &Stmt) {
        self.line_start();
        match stmt {
            Stmt::Decl(decl) => self.decl(decl),
            Stmt::Brace(block) => self.block(block),
            Stmt::If(s) => self.if_stmt(s),
            Stmt::While(s) => {
                self.push("while ");
                self.expr(&s.cond);
                self.push(" ");
                self.block(&s.body);
            }
            Stmt::Return(s) => {
                self.push("return");
                if let Some((op, value)) = &s.binding {
                    self.push(&format!(" {op} "));
                    self.expr(value);
                }
            }
            Stmt::Binding(s) => {
                self.expr(&s.lvalue);
                self.push(&format!(" {} ", s.op));
                self.expr(&s.rvalue);
            }
            Stmt::Expr(e) => self.expr(e),
            Stmt::Invalid { .. } => self.push("<invalid>"),
        }
        self.out.push('\n');
    }

    fn if_stmt(&mut self, s: &IfStmt) {
        self.push("if ");
        self.expr(&s.cond);
        self.push(" ");
        self.block(&s.then_block);
        if let Some(else_branch) = &s.else_branch {
            self.push(" else ");
            match else_branch.as_ref() {
                Stmt::If(nested) => self.if_stmt(nested),
                Stmt::Brace(block) => self.block(block),
                other => self.stmt(other),
            }
        }
    }

    fn block(&mut self, block: &Block) {
        self.push("{\n");
        self.indent += 1;
        for stmt in &block.stmts {
            self.stmt(stmt);
        }
        self.indent -= 1;
        self.line_start();
        self.push("}");
    }

    // ── Declarations ───────────────────────────────────────────────────

    fn decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Prop(d) => self.prop_decl(d),
            Decl::Fun(d) => self.fun_decl(d),
            Decl::Struct(d) => self.nominal("struct", &d.name, &d.generic_params, &d.body),
            Decl::Union(d) => self.nominal("union", &d.name, &d.generic_params, &d.body),
            Decl::Interface(d) => self.nominal("interface", &d.name, &d.generic_params, &d.body),
            Decl::Extension(d) => {
                self.push("extension ");
                self.push(&d.subject);
                self.push(" ");
                self.block(&d.body);
            }
            Decl::UnionCase(d) => {
                self.push("case ");
                self.sign(&d.sign);
            }
        }
    }

    fn attributes(&mut self, attrs: &[Attribute]) {
        for attr in attrs {
            self.push("@");
            self.push(&attr.name);
            if !attr.args.is_empty() {
                self.push("(");
                self.push(&attr.args.join(", "));
                self.push(")");
            }
            self.push(" ");
        }
    }

    fn modifiers(&mut self, modifiers: &[ModifierNode]) {
        for m in modifiers {
            self.push(&format!("{} ", m.kind));
        }
    }

    fn prop_decl(&mut self, d: &PropDecl) {
        self.attributes(&d.attrs);
        self.modifiers(&d.modifiers);
        self.push(if d.mutable { "var " } else { "let " });
        self.push(&d.name);
        if let Some(sign) = &d.sign {
            self.push(": ");
            self.sign(sign);
        }
        if let Some((op, init)) = &d.initializer {
            self.push(&format!(" {op} "));
            self.expr(init);
        }
    }

    fn fun_decl(&mut self, d: &FunDecl) {
        self.attributes(&d.attrs);
        self.modifiers(&d.modifiers);
        match d.kind {
            FunKind::Constructor => self.push("new"),
            FunKind::Destructor => self.push("del"),
            _ => {
                self.push("fun");
                if !d.name.is_empty() {
                    self.push(" ");
                    self.push(&d.name);
                }
            }
        }
        if !d.generic_params.is_empty() {
            self.push("<");
            let names: Vec<_> = d.generic_params.iter().map(|p| p.name.as_str()).collect();
            self.push(&names.join(", "));
            self.push(">");
        }
        self.push("(");
        for (i, param) in d.params.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            match &param.label {
                None => self.push(&format!("_ {}", param.name)),
                Some(label) if *label == param.name => self.push(&param.name),
                Some(label) => self.push(&format!("{label} {}", param.name)),
            }
            if let Some(sign) = &param.sign {
                self.push(": ");
                self.sign(sign);
            }
        }
        self.push(")");
        if let Some(codomain) = &d.codomain {
            self.push(" -> ");
            self.sign(codomain);
        }
        if let Some(body) = &d.body {
            self.push(" ");
            self.block(body);
        }
    }

    fn nominal(&mut self, kw: &str, name: &str, generics: &[GenericParamDecl], body: &Block) {
        self.push(kw);
        self.push(" ");
        self.push(name);
        if !generics.is_empty() {
            self.push("<");
            let names: Vec<_> = generics.iter().map(|p| p.name.as_str()).collect();
            self.push(&names.join(", "));
            self.push(">");
        }
        self.push(" ");
        self.block(body);
    }

    // ── Expressions ────────────────────────────────────────────────────

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::BoolLit { value, .. } => self.push(if *value { "true" } else { "false" }),
            Expr::IntLit { value, .. } => self.push(&value.to_string()),
            Expr::FloatLit { value, .. } => {
                let text = value.to_string();
                self.push(&text);
                if !text.contains('.') {
                    self.push(".0");
                }
            }
            Expr::StrLit { value, .. } => {
                self.push("\"");
                for c in value.chars() {
                    match c {
                        '\n' => self.push("\\n"),
                        '\t' => self.push("\\t"),
                        '\r' => self.push("\\r"),
                        '\\' => self.push("\\\\"),
                        '"' => self.push("\\\""),
                        _ => self.out.push(c),
                    }
                }
                self.push("\"");
            }
            Expr::NullRef { .. } => self.push("nullref"),
            Expr::Ident(e) => self.push(&e.name),
            Expr::Select(e) => {
                self.expr(&e.owner);
                self.push(".");
                self.push(&e.member);
            }
            Expr::Call(e) => {
                self.expr(&e.callee);
                self.call_args(&e.args, "(", ")");
            }
            Expr::Subscript(e) => {
                self.expr(&e.callee);
                self.call_args(&e.args, "[", "]");
            }
            Expr::Infix(e) => {
                self.expr(&e.lhs);
                self.push(&format!(" {} ", e.op));
                self.expr(&e.rhs);
            }
            Expr::Prefix(e) => {
                match e.op {
                    PrefixOp::Not => self.push("not "),
                    PrefixOp::Plus => self.push("+"),
                    PrefixOp::Minus => self.push("-"),
                }
                self.expr(&e.operand);
            }
            Expr::Cast(e) => {
                self.expr(&e.operand);
                self.push(&format!(" {} ", e.kind));
                self.sign(&e.sign);
            }
            Expr::Lambda(e) => self.fun_decl(&e.fun),
            Expr::ArrayLit { elements, .. } => {
                self.push("[");
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(elem);
                }
                self.push("]");
            }
            Expr::SetLit { elements, .. } => {
                self.push("{");
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(elem);
                }
                self.push("}");
            }
            Expr::MapLit { entries, .. } => {
                self.push("{");
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(key);
                    self.push(": ");
                    self.expr(value);
                }
                self.push("}");
            }
            Expr::Enclosed { inner, .. } => {
                self.push("(");
                self.expr(inner);
                self.push(")");
            }
            Expr::Invalid { .. } => self.push("<invalid>"),
        }
    }

    fn call_args(&mut self, args: &[CallArg], open: &str, close: &str) {
        self.push(open);
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            if let Some(label) = &arg.label {
                self.push(&format!("{label} {} ", arg.op));
            }
            self.expr(&arg.value);
        }
        self.push(close);
    }

    // ── Signatures ─────────────────────────────────────────────────────

    fn sign(&mut self, sign: &Sign) {
        match sign {
            Sign::Ident(s) => {
                self.push(&s.name);
                if !s.args.is_empty() {
                    self.push("<");
                    for (i, arg) in s.args.iter().enumerate() {
                        if i > 0 {
                            self.push(", ");
                        }
                        self.sign(arg);
                    }
                    self.push(">");
                }
            }
            Sign::Nested(s) => {
                self.sign(&s.owner);
                self.push("::");
                self.push(&s.member);
            }
            Sign::ImplicitNested(s) => {
                self.push("::");
                self.push(&s.member);
            }
            Sign::Fun(s) => {
                self.push("(");
                for (i, param) in s.params.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    if let Some(label) = &param.label {
                        self.push(&format!("{label}: "));
                    }
                    self.sign(&param.sign);
                }
                self.push(") -> ");
                self.sign(&s.codomain);
            }
            Sign::Qualified(s) => {
                for (qual, _) in &s.quals {
                    self.push(&format!("{qual} "));
                }
                self.sign(&s.inner);
            }
            Sign::Invalid { .. } => self.push("<invalid>"),
        }
    }
}
