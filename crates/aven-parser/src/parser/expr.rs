//! Expression parsing: precedence climbing over the infix operator classes.

use aven_common::{Span, TokenKind};

use crate::ast::*;

use super::Parser;

/// Associativity of an infix precedence class.
#[derive(Clone, Copy, PartialEq)]
enum Assoc {
    Left,
    None,
}

/// Binding power and associativity of an infix token, if it is one.
/// Higher binds tighter. Casts are handled in the postfix chain since
/// `as` outranks every class here.
fn infix_binding(kind: TokenKind) -> Option<(InfixOp, u8, Assoc)> {
    let entry = match kind {
        TokenKind::Or => (InfixOp::Or, 1, Assoc::Left),
        TokenKind::And => (InfixOp::And, 2, Assoc::Left),
        TokenKind::EqEq => (InfixOp::Eq, 3, Assoc::None),
        TokenKind::BangEq => (InfixOp::Ne, 3, Assoc::None),
        TokenKind::EqEqEq => (InfixOp::RefEq, 3, Assoc::None),
        TokenKind::BangEqEq => (InfixOp::RefNe, 3, Assoc::None),
        TokenKind::Is => (InfixOp::Is, 3, Assoc::None),
        TokenKind::Lt => (InfixOp::Lt, 4, Assoc::None),
        TokenKind::LtEq => (InfixOp::Le, 4, Assoc::None),
        TokenKind::Gt => (InfixOp::Gt, 4, Assoc::None),
        TokenKind::GtEq => (InfixOp::Ge, 4, Assoc::None),
        TokenKind::Plus => (InfixOp::Add, 5, Assoc::Left),
        TokenKind::Minus => (InfixOp::Sub, 5, Assoc::Left),
        TokenKind::Star => (InfixOp::Mul, 6, Assoc::Left),
        TokenKind::Slash => (InfixOp::Div, 6, Assoc::Left),
        TokenKind::Percent => (InfixOp::Mod, 6, Assoc::Left),
        _ => return None,
    };
    Some(entry)
}

impl Parser<'_> {
    /// Parse a full expression.
    pub(crate) fn parse_expr(&mut self) -> Expr {
        self.parse_infix(1)
    }

    fn parse_infix(&mut self, min_bp: u8) -> Expr {
        let mut lhs = self.parse_prefix();
        while let Some((op, bp, assoc)) = infix_binding(self.kind()) {
            if bp < min_bp {
                break;
            }
            let op_token = self.bump();
            let rhs = self.parse_infix(bp + 1);
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::Infix(InfixExpr {
                id: self.make_id(),
                span,
                op,
                op_span: op_token.span,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
            // equality and ordering do not chain
            if assoc == Assoc::None {
                if let Some((_, next_bp, _)) = infix_binding(self.kind()) {
                    if next_bp == bp {
                        let span = self.current().span;
                        self.error_at(
                            "comparison operators cannot be chained; use parentheses"
                                .to_string(),
                            span,
                        );
                    }
                }
                break;
            }
        }
        lhs
    }

    fn parse_prefix(&mut self) -> Expr {
        let op = match self.kind() {
            TokenKind::Not => PrefixOp::Not,
            TokenKind::Plus => PrefixOp::Plus,
            TokenKind::Minus => PrefixOp::Minus,
            _ => return self.parse_postfix(),
        };
        let start = self.bump().span;
        let operand = self.parse_prefix();
        Expr::Prefix(PrefixExpr {
            id: self.make_id(),
            span: start.merge(operand.span()),
            op,
            operand: Box::new(operand),
        })
    }

    /// Parse a primary expression followed by any number of call,
    /// subscript, select, nested-type, and cast suffixes.
    fn parse_postfix(&mut self) -> Expr {
        let mut expr = self.parse_primary();
        loop {
            match self.kind() {
                TokenKind::LParen => {
                    let (args, close) = self.parse_call_args(TokenKind::RParen);
                    let span = expr.span().merge(close);
                    expr = Expr::Call(CallExpr {
                        id: self.make_id(),
                        span,
                        callee: Box::new(expr),
                        args,
                    });
                }
                TokenKind::LBracket => {
                    let (args, close) = self.parse_call_args(TokenKind::RBracket);
                    let span = expr.span().merge(close);
                    expr = Expr::Subscript(SubscriptExpr {
                        id: self.make_id(),
                        span,
                        callee: Box::new(expr),
                        args,
                    });
                }
                TokenKind::Dot | TokenKind::ColonColon => {
                    self.bump();
                    let (member, member_span) = self.parse_member_name();
                    let span = expr.span().merge(member_span);
                    expr = Expr::Select(SelectExpr {
                        id: self.make_id(),
                        span,
                        owner: Box::new(expr),
                        member,
                        member_span,
                    });
                }
                TokenKind::As | TokenKind::AsBang | TokenKind::AsQuestion => {
                    let kind = match self.bump().kind {
                        TokenKind::As => CastKind::Static,
                        TokenKind::AsBang => CastKind::Forced,
                        _ => CastKind::Conditional,
                    };
                    let sign = self.parse_sign();
                    let span = expr.span().merge(sign.span());
                    expr = Expr::Cast(CastExpr {
                        id: self.make_id(),
                        span,
                        kind,
                        operand: Box::new(expr),
                        sign,
                    });
                }
                _ => break,
            }
        }
        expr
    }

    fn parse_member_name(&mut self) -> (String, Span) {
        if self.at(TokenKind::Ident) {
            let token = self.bump();
            (self.text(token).to_string(), token.span)
        } else {
            let span = self.current().span;
            self.error_at(
                format!("expected member name, found `{}`", self.describe_current()),
                span,
            );
            (String::new(), span)
        }
    }

    pub(crate) fn describe_current(&self) -> String {
        if self.at(TokenKind::Eof) {
            "end of file".to_string()
        } else {
            self.text(self.current()).to_string()
        }
    }

    // ── Primaries ──────────────────────────────────────────────────────

    fn parse_primary(&mut self) -> Expr {
        match self.kind() {
            TokenKind::True | TokenKind::False => {
                let token = self.bump();
                Expr::BoolLit {
                    id: self.make_id(),
                    span: token.span,
                    value: token.kind == TokenKind::True,
                }
            }
            TokenKind::IntLiteral => {
                let token = self.bump();
                let value = self.text(token).parse::<i64>().unwrap_or_else(|_| {
                    // overflow of an all-digit literal
                    self.issues.push(aven_common::Issue::error(
                        "E0102",
                        format!("integer literal `{}` is out of range", self.text(token)),
                        token.span,
                    ));
                    0
                });
                Expr::IntLit {
                    id: self.make_id(),
                    span: token.span,
                    value,
                }
            }
            TokenKind::FloatLiteral => {
                let token = self.bump();
                let value = self.text(token).parse::<f64>().unwrap_or(0.0);
                Expr::FloatLit {
                    id: self.make_id(),
                    span: token.span,
                    value,
                }
            }
            TokenKind::StringLiteral => {
                let token = self.bump();
                let value = self.decode_string(token);
                Expr::StrLit {
                    id: self.make_id(),
                    span: token.span,
                    value,
                }
            }
            TokenKind::NullRef => {
                let token = self.bump();
                Expr::NullRef {
                    id: self.make_id(),
                    span: token.span,
                }
            }
            TokenKind::Ident | TokenKind::SelfTy => {
                let token = self.bump();
                Expr::Ident(IdentExpr {
                    id: self.make_id(),
                    span: token.span,
                    name: self.text(token).to_string(),
                })
            }
            TokenKind::LParen => {
                let open = self.bump().span;
                self.skip_newlines();
                let inner = self.parse_expr();
                self.skip_newlines();
                let close = self.current().span;
                self.expect(TokenKind::RParen, "`)`");
                Expr::Enclosed {
                    id: self.make_id(),
                    span: open.merge(close),
                    inner: Box::new(inner),
                }
            }
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LBrace => self.parse_brace_literal(),
            TokenKind::Fun => self.parse_lambda(),
            _ => {
                let span = self.current().span;
                self.error_at(
                    format!("expected an expression, found `{}`", self.describe_current()),
                    span,
                );
                Expr::Invalid {
                    id: self.make_id(),
                    span,
                }
            }
        }
    }

    fn parse_array_literal(&mut self) -> Expr {
        let open = self.bump().span; // `[`
        let mut elements = Vec::new();
        loop {
            self.skip_newlines();
            if self.at(TokenKind::RBracket) || self.at(TokenKind::Eof) {
                break;
            }
            elements.push(self.parse_expr());
            self.skip_newlines();
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        let close = self.current().span;
        self.expect(TokenKind::RBracket, "`]`");
        Expr::ArrayLit {
            id: self.make_id(),
            span: open.merge(close),
            elements,
        }
    }

    /// `{a, b}` is a set literal, `{k: v}` a map literal, `{}` the empty
    /// map. Blocks never reach here; statement position claims `{` first.
    fn parse_brace_literal(&mut self) -> Expr {
        let open = self.bump().span; // `{`
        self.skip_newlines();
        if self.at(TokenKind::RBrace) {
            let close = self.bump().span;
            return Expr::MapLit {
                id: self.make_id(),
                span: open.merge(close),
                entries: Vec::new(),
            };
        }
        let first = self.parse_expr();
        if self.eat(TokenKind::Colon) {
            // map literal
            let first_value = self.parse_expr();
            let mut entries = vec![(first, first_value)];
            while self.eat(TokenKind::Comma) {
                self.skip_newlines();
                if self.at(TokenKind::RBrace) {
                    break;
                }
                let key = self.parse_expr();
                self.expect(TokenKind::Colon, "`:`");
                let value = self.parse_expr();
                entries.push((key, value));
            }
            self.check_duplicate_keys(&entries);
            self.skip_newlines();
            let close = self.current().span;
            self.expect(TokenKind::RBrace, "`}`");
            Expr::MapLit {
                id: self.make_id(),
                span: open.merge(close),
                entries,
            }
        } else {
            // set literal
            let mut elements = vec![first];
            while self.eat(TokenKind::Comma) {
                self.skip_newlines();
                if self.at(TokenKind::RBrace) {
                    break;
                }
                elements.push(self.parse_expr());
            }
            self.skip_newlines();
            let close = self.current().span;
            self.expect(TokenKind::RBrace, "`}`");
            Expr::SetLit {
                id: self.make_id(),
                span: open.merge(close),
                elements,
            }
        }
    }

    /// Report literal keys that appear more than once in a map literal.
    fn check_duplicate_keys(&mut self, entries: &[(Expr, Expr)]) {
        for (i, (key, _)) in entries.iter().enumerate() {
            let dup = entries[..i].iter().any(|(prior, _)| match (prior, key) {
                (Expr::IntLit { value: a, .. }, Expr::IntLit { value: b, .. }) => a == b,
                (Expr::StrLit { value: a, .. }, Expr::StrLit { value: b, .. }) => a == b,
                (Expr::BoolLit { value: a, .. }, Expr::BoolLit { value: b, .. }) => a == b,
                _ => false,
            });
            if dup {
                self.issues.push(aven_common::Issue::error(
                    "E0103",
                    "duplicate key in map literal".to_string(),
                    key.span(),
                ));
            }
        }
    }

    fn parse_lambda(&mut self) -> Expr {
        let fun = self.parse_fun_decl_anonymous();
        Expr::Lambda(LambdaExpr {
            id: self.make_id(),
            span: fun.span,
            fun: Box::new(fun),
        })
    }

    /// Parse the argument list of a call or subscript, starting at the
    /// opening delimiter. Returns the args and the closing span.
    pub(crate) fn parse_call_args(&mut self, close: TokenKind) -> (Vec<CallArg>, Span) {
        self.bump(); // opening delimiter
        let mut args = Vec::new();
        loop {
            self.skip_newlines();
            if self.at(close) || self.at(TokenKind::Eof) {
                break;
            }
            args.push(self.parse_call_arg());
            self.skip_newlines();
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        let close_span = self.current().span;
        let close_name = if close == TokenKind::RParen { "`)`" } else { "`]`" };
        self.expect(close, close_name);
        (args, close_span)
    }

    /// One argument: `expr`, `label := expr`, `label &- expr`, or
    /// `label <- expr`. Unlabeled arguments pass by copy.
    fn parse_call_arg(&mut self) -> CallArg {
        if self.at(TokenKind::Ident)
            && matches!(
                self.nth(1),
                TokenKind::ColonEq | TokenKind::AmpMinus | TokenKind::LArrow
            )
        {
            let label_token = self.bump();
            let label = self.text(label_token).to_string();
            let op = self
                .eat_binding_op(false)
                .expect("peeked a binding operator");
            let value = self.parse_expr();
            CallArg {
                id: self.make_id(),
                span: label_token.span.merge(value.span()),
                label: Some(label),
                op,
                value,
            }
        } else {
            let value = self.parse_expr();
            CallArg {
                id: self.make_id(),
                span: value.span(),
                label: None,
                op: BindOp::Copy,
                value,
            }
        }
    }

    /// Decode a string literal token, stripping quotes and resolving
    /// escapes. Invalid escapes are reported and passed through verbatim.
    fn decode_string(&mut self, token: aven_common::Token) -> String {
        let raw = self.text(token);
        let body = raw
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(raw);
        let mut value = String::with_capacity(body.len());
        let mut chars = body.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                value.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => value.push('\n'),
                Some('t') => value.push('\t'),
                Some('r') => value.push('\r'),
                Some('\\') => value.push('\\'),
                Some('"') => value.push('"'),
                Some('0') => value.push('\0'),
                Some(other) => {
                    self.issues.push(aven_common::Issue::error(
                        "E0104",
                        format!("invalid escape sequence `\\{other}`"),
                        token.span,
                    ));
                    value.push(other);
                }
                None => {}
            }
        }
        value
    }
}
