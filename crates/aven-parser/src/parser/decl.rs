//! Declaration parsing: properties, functions, nominal types, extensions.

use aven_common::TokenKind;

use crate::ast::*;

use super::Parser;

impl Parser<'_> {
    /// Parse a declaration in statement position. Attributes and modifiers
    /// that turn out to precede junk degrade into an invalid statement.
    pub(crate) fn parse_decl(&mut self) -> Stmt {
        let start = self.current().span;
        let attrs = self.parse_attributes();
        let modifiers = self.parse_modifiers();
        let decl = match self.kind() {
            TokenKind::Let | TokenKind::Var => Decl::Prop(self.parse_prop_decl(attrs, modifiers)),
            TokenKind::Fun => Decl::Fun(self.parse_fun_decl(attrs, modifiers)),
            TokenKind::New => Decl::Fun(self.parse_special_fun(FunKind::Constructor, modifiers)),
            TokenKind::Del => Decl::Fun(self.parse_special_fun(FunKind::Destructor, modifiers)),
            TokenKind::Struct => {
                let (id, span, name, name_span, generic_params, body) = self.parse_nominal_decl();
                Decl::Struct(StructDecl { id, span, name, name_span, generic_params, body })
            }
            TokenKind::Union => {
                let (id, span, name, name_span, generic_params, body) = self.parse_nominal_decl();
                Decl::Union(UnionDecl { id, span, name, name_span, generic_params, body })
            }
            TokenKind::Interface => {
                let (id, span, name, name_span, generic_params, body) = self.parse_nominal_decl();
                Decl::Interface(InterfaceDecl { id, span, name, name_span, generic_params, body })
            }
            TokenKind::Extension => Decl::Extension(self.parse_extension_decl()),
            TokenKind::Case => Decl::UnionCase(self.parse_union_case_decl()),
            _ => {
                let span = self.current().span;
                self.error_at(
                    format!(
                        "expected a declaration, found `{}`",
                        self.describe_current()
                    ),
                    span,
                );
                return self.recover_decl(start);
            }
        };
        Stmt::Decl(decl)
    }

    fn recover_decl(&mut self, from: aven_common::Span) -> Stmt {
        let mut span = from;
        while !matches!(
            self.kind(),
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
        ) {
            span = span.merge(self.bump().span);
        }
        Stmt::Invalid {
            id: self.make_id(),
            span,
        }
    }

    // ── Attributes and modifiers ───────────────────────────────────────

    /// `@name` or `@name(arg, ...)`, any number of them.
    fn parse_attributes(&mut self) -> Vec<Attribute> {
        let mut attrs = Vec::new();
        while self.at(TokenKind::AtName) {
            let token = self.bump();
            let name = self.text(token)[1..].to_string(); // strip `@`
            let mut span = token.span;
            let mut args = Vec::new();
            if self.at(TokenKind::LParen) {
                self.bump();
                loop {
                    if self.at(TokenKind::Ident) || self.at(TokenKind::StringLiteral) {
                        let arg = self.bump();
                        args.push(self.text(arg).trim_matches('"').to_string());
                    } else {
                        break;
                    }
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                let close = self.current().span;
                self.expect(TokenKind::RParen, "`)`");
                span = span.merge(close);
            }
            attrs.push(Attribute { span, name, args });
            self.skip_newlines();
        }
        attrs
    }

    fn parse_modifiers(&mut self) -> Vec<ModifierNode> {
        let mut modifiers = Vec::new();
        loop {
            let kind = match self.kind() {
                TokenKind::Static => Modifier::Static,
                TokenKind::Mutating => Modifier::Mutating,
                _ => break,
            };
            let token = self.bump();
            modifiers.push(ModifierNode {
                span: token.span,
                kind,
            });
        }
        modifiers
    }

    // ── Properties ─────────────────────────────────────────────────────

    /// `let|var name [: Sign] [op expr]` where `op` is a binding operator
    /// or the `=` copy sugar.
    fn parse_prop_decl(
        &mut self,
        attrs: Vec<Attribute>,
        modifiers: Vec<ModifierNode>,
    ) -> PropDecl {
        let id = self.make_id();
        let intro = self.bump(); // `let` or `var`
        let mutable = intro.kind == TokenKind::Var;
        let (name, name_span) = self.parse_decl_name("property name");
        let sign = if self.eat(TokenKind::Colon) {
            Some(self.parse_sign())
        } else {
            None
        };
        let initializer = self
            .eat_binding_op(true)
            .map(|op| (op, self.parse_expr()));
        let mut span = intro.span.merge(name_span);
        if let Some(sign) = &sign {
            span = span.merge(sign.span());
        }
        if let Some((_, init)) = &initializer {
            span = span.merge(init.span());
        }
        PropDecl {
            id,
            span,
            attrs,
            modifiers,
            mutable,
            name,
            name_span,
            sign,
            initializer,
        }
    }

    fn parse_decl_name(&mut self, what: &str) -> (String, aven_common::Span) {
        if self.at(TokenKind::Ident) {
            let token = self.bump();
            (self.text(token).to_string(), token.span)
        } else {
            let span = self.current().span;
            self.error_at(
                format!("expected {what}, found `{}`", self.describe_current()),
                span,
            );
            (String::new(), span)
        }
    }

    // ── Functions ──────────────────────────────────────────────────────

    /// `fun name [<T, ...>] (params) [-> Sign] [block]`. The body is
    /// optional so interface methods can omit it.
    fn parse_fun_decl(
        &mut self,
        attrs: Vec<Attribute>,
        modifiers: Vec<ModifierNode>,
    ) -> FunDecl {
        let id = self.make_id();
        let intro = self.bump(); // `fun`
        let (name, name_span) = self.parse_decl_name("function name");
        let generic_params = self.parse_generic_params();
        let params = self.parse_param_list();
        let codomain = if self.eat(TokenKind::Arrow) {
            Some(self.parse_sign())
        } else {
            None
        };
        let body = if self.at(TokenKind::LBrace) {
            Some(self.parse_block())
        } else {
            None
        };
        let mut span = intro.span.merge(name_span);
        if let Some(c) = &codomain {
            span = span.merge(c.span());
        }
        if let Some(b) = &body {
            span = span.merge(b.span);
        }
        FunDecl {
            id,
            span,
            attrs,
            modifiers,
            kind: FunKind::Regular,
            name,
            name_span,
            generic_params,
            params,
            codomain,
            body,
        }
    }

    /// `new(params) { ... }` / `del() { ... }`.
    fn parse_special_fun(&mut self, kind: FunKind, modifiers: Vec<ModifierNode>) -> FunDecl {
        let id = self.make_id();
        let intro = self.bump(); // `new` or `del`
        let name = self.text(intro).to_string();
        let params = self.parse_param_list();
        let body = if self.at(TokenKind::LBrace) {
            Some(self.parse_block())
        } else {
            None
        };
        let span = match &body {
            Some(b) => intro.span.merge(b.span),
            None => intro.span,
        };
        FunDecl {
            id,
            span,
            attrs: Vec::new(),
            modifiers,
            kind,
            name,
            name_span: intro.span,
            generic_params: Vec::new(),
            params,
            codomain: None,
            body,
        }
    }

    /// Anonymous `fun (params) [-> Sign] { ... }` in expression position.
    pub(crate) fn parse_fun_decl_anonymous(&mut self) -> FunDecl {
        let id = self.make_id();
        let intro = self.bump(); // `fun`
        let params = self.parse_param_list();
        let codomain = if self.eat(TokenKind::Arrow) {
            Some(self.parse_sign())
        } else {
            None
        };
        let body = Some(self.parse_block());
        let span = intro
            .span
            .merge(body.as_ref().expect("lambda body just parsed").span);
        FunDecl {
            id,
            span,
            attrs: Vec::new(),
            modifiers: Vec::new(),
            kind: FunKind::Regular,
            name: String::new(),
            name_span: intro.span,
            generic_params: Vec::new(),
            params,
            codomain,
            body,
        }
    }

    /// `<T, U, ...>` generic placeholder declarations.
    fn parse_generic_params(&mut self) -> Vec<GenericParamDecl> {
        if !self.at(TokenKind::Lt) {
            return Vec::new();
        }
        self.bump();
        let mut params = Vec::new();
        loop {
            if self.at(TokenKind::Ident) {
                let token = self.bump();
                params.push(GenericParamDecl {
                    id: self.make_id(),
                    span: token.span,
                    name: self.text(token).to_string(),
                });
            } else {
                let span = self.current().span;
                self.error_at(
                    format!(
                        "expected generic parameter name, found `{}`",
                        self.describe_current()
                    ),
                    span,
                );
                break;
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::Gt, "`>`");
        params
    }

    /// `(label name: Sign, ...)`. A single identifier doubles as label and
    /// name; a label of `_` suppresses the label.
    fn parse_param_list(&mut self) -> Vec<ParamDecl> {
        if self.expect(TokenKind::LParen, "`(`").is_none() {
            return Vec::new();
        }
        let mut params = Vec::new();
        loop {
            self.skip_newlines();
            if self.at(TokenKind::RParen) || self.at(TokenKind::Eof) {
                break;
            }
            params.push(self.parse_param());
            self.skip_newlines();
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "`)`");
        params
    }

    fn parse_param(&mut self) -> ParamDecl {
        let id = self.make_id();
        let (first, first_span) = self.parse_decl_name("parameter name");
        let (label, name, name_span) = if self.at(TokenKind::Ident) {
            // two identifiers: explicit label then name
            let token = self.bump();
            let label = (first != "_").then_some(first);
            (label, self.text(token).to_string(), token.span)
        } else {
            (Some(first.clone()), first, first_span)
        };
        let sign = if self.eat(TokenKind::Colon) {
            Some(self.parse_sign())
        } else {
            None
        };
        let mut span = first_span.merge(name_span);
        if let Some(sign) = &sign {
            span = span.merge(sign.span());
        }
        ParamDecl {
            id,
            span,
            label,
            name,
            name_span,
            sign,
        }
    }

    // ── Nominal types ──────────────────────────────────────────────────

    /// Shared shape of `struct` / `union` / `interface` declarations.
    #[allow(clippy::type_complexity)]
    fn parse_nominal_decl(
        &mut self,
    ) -> (
        NodeId,
        aven_common::Span,
        String,
        aven_common::Span,
        Vec<GenericParamDecl>,
        Block,
    ) {
        let id = self.make_id();
        let intro = self.bump(); // `struct` / `union` / `interface`
        let (name, name_span) = self.parse_decl_name("type name");
        let generic_params = self.parse_generic_params();
        let body = self.parse_block();
        (
            id,
            intro.span.merge(body.span),
            name,
            name_span,
            generic_params,
            body,
        )
    }

    /// `extension Name { ... }`.
    fn parse_extension_decl(&mut self) -> ExtensionDecl {
        let id = self.make_id();
        let intro = self.bump(); // `extension`
        let (subject, subject_span) = self.parse_decl_name("extended type name");
        let body = self.parse_block();
        ExtensionDecl {
            id,
            span: intro.span.merge(body.span),
            subject,
            subject_span,
            body,
        }
    }

    /// `case Sign` inside a union body.
    fn parse_union_case_decl(&mut self) -> UnionCaseDecl {
        let id = self.make_id();
        let intro = self.bump(); // `case`
        let sign = self.parse_sign();
        UnionCaseDecl {
            id,
            span: intro.span.merge(sign.span()),
            sign,
        }
    }
}
