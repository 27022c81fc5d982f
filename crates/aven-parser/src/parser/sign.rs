//! Type signature parsing.

use aven_common::TokenKind;

use crate::ast::*;

use super::Parser;

/// Token kinds that may begin a type signature.
fn starts_sign(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Ident
            | TokenKind::SelfTy
            | TokenKind::LParen
            | TokenKind::ColonColon
            | TokenKind::AtName
    )
}

impl Parser<'_> {
    /// Parse a signature, including any leading `@cst` / `@mut` qualifiers.
    pub(crate) fn parse_sign(&mut self) -> Sign {
        let mut quals = Vec::new();
        let start = self.current().span;
        while self.at(TokenKind::AtName) {
            let token = self.bump();
            let qual = match self.text(token) {
                "@cst" => Qual::Cst,
                "@mut" => Qual::Mut,
                other => {
                    self.error_at(
                        format!("unknown qualifier `{other}`; expected `@cst` or `@mut`"),
                        token.span,
                    );
                    continue;
                }
            };
            quals.push((qual, token.span));
        }
        let inner = self.parse_sign_core();
        if quals.is_empty() {
            inner
        } else {
            Sign::Qualified(QualifiedSign {
                id: self.make_id(),
                span: start.merge(inner.span()),
                quals,
                inner: Box::new(inner),
            })
        }
    }

    fn parse_sign_core(&mut self) -> Sign {
        match self.kind() {
            TokenKind::LParen => self.parse_fun_sign(),
            TokenKind::ColonColon => {
                let start = self.bump().span;
                let (member, member_span) = if self.at(TokenKind::Ident) {
                    let token = self.bump();
                    (self.text(token).to_string(), token.span)
                } else {
                    let span = self.current().span;
                    self.error_at(
                        format!("expected type name after `::`, found `{}`", self.describe_current()),
                        span,
                    );
                    (String::new(), span)
                };
                Sign::ImplicitNested(ImplicitNestedSign {
                    id: self.make_id(),
                    span: start.merge(member_span),
                    member,
                })
            }
            TokenKind::Ident | TokenKind::SelfTy => {
                let token = self.bump();
                let mut sign = Sign::Ident(IdentSign {
                    id: self.make_id(),
                    span: token.span,
                    name: self.text(token).to_string(),
                    args: self.parse_sign_args(),
                });
                // `A::B::C` folds left
                while self.at(TokenKind::ColonColon) {
                    self.bump();
                    let (member, member_span) = if self.at(TokenKind::Ident) {
                        let t = self.bump();
                        (self.text(t).to_string(), t.span)
                    } else {
                        let span = self.current().span;
                        self.error_at(
                            format!(
                                "expected type name after `::`, found `{}`",
                                self.describe_current()
                            ),
                            span,
                        );
                        (String::new(), span)
                    };
                    let span = sign.span().merge(member_span);
                    sign = Sign::Nested(NestedSign {
                        id: self.make_id(),
                        span,
                        owner: Box::new(sign),
                        member,
                        member_span,
                    });
                }
                sign
            }
            _ => {
                let span = self.current().span;
                self.error_at(
                    format!(
                        "expected a type signature, found `{}`",
                        self.describe_current()
                    ),
                    span,
                );
                Sign::Invalid {
                    id: self.make_id(),
                    span,
                }
            }
        }
    }

    /// `<Sign, ...>` generic arguments, only taken when the token after `<`
    /// can start a signature (so `x as T < 3` keeps its comparison).
    fn parse_sign_args(&mut self) -> Vec<Sign> {
        if !self.at(TokenKind::Lt) || !starts_sign(self.nth(1)) {
            return Vec::new();
        }
        self.bump(); // `<`
        let mut args = Vec::new();
        loop {
            args.push(self.parse_sign());
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::Gt, "`>`");
        args
    }

    /// `(label: Sign, ...) -> Sign`
    fn parse_fun_sign(&mut self) -> Sign {
        let open = self.bump().span; // `(`
        let mut params = Vec::new();
        loop {
            self.skip_newlines();
            if self.at(TokenKind::RParen) || self.at(TokenKind::Eof) {
                break;
            }
            params.push(self.parse_sign_param());
            self.skip_newlines();
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "`)`");
        self.expect(TokenKind::Arrow, "`->`");
        let codomain = self.parse_sign();
        Sign::Fun(FunSign {
            id: self.make_id(),
            span: open.merge(codomain.span()),
            params,
            codomain: Box::new(codomain),
        })
    }

    fn parse_sign_param(&mut self) -> SignParam {
        // `label: Sign` when an identifier is followed by a colon that is
        // not introducing a nested signature
        if self.at(TokenKind::Ident) && self.nth(1) == TokenKind::Colon {
            let label_token = self.bump();
            self.bump(); // `:`
            let label = self.text(label_token);
            let label = (label != "_").then(|| label.to_string());
            let sign = self.parse_sign();
            SignParam {
                span: label_token.span.merge(sign.span()),
                label,
                sign,
            }
        } else {
            let sign = self.parse_sign();
            SignParam {
                span: sign.span(),
                label: None,
                sign,
            }
        }
    }
}
