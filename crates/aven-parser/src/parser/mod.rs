//! Recursive-descent parser for Aven.
//!
//! One method per grammar production, over the token stream from
//! `aven-lexer`. Parsing never aborts: unexpected input is reported as an
//! issue, an `Invalid` node is produced, and the parser resynchronises at
//! the next statement boundary.

mod decl;
mod expr;
mod sign;

use aven_common::{Issue, IssueList, Span, Token, TokenKind};
use aven_lexer::Lexer;

use crate::ast::*;

/// Result of parsing one module: the tree plus everything that went wrong.
#[derive(Debug)]
pub struct ParseResult {
    pub module: Module,
    pub issues: IssueList,
}

/// Parse a whole source file into a [`Module`].
pub fn parse(source: &str, module_name: &str) -> ParseResult {
    let tokens = Lexer::tokenize(source);
    let mut parser = Parser::new(source, tokens);
    let stmts = parser.parse_module_body();
    ParseResult {
        module: Module {
            name: module_name.to_string(),
            stmts,
            node_count: parser.next_node,
        },
        issues: parser.issues,
    }
}

pub(crate) struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Token>,
    pos: usize,
    pub(crate) issues: IssueList,
    next_node: u32,
}

impl<'src> Parser<'src> {
    fn new(source: &'src str, tokens: Vec<Token>) -> Self {
        debug_assert!(matches!(
            tokens.last(),
            Some(Token {
                kind: TokenKind::Eof,
                ..
            })
        ));
        Self {
            source,
            tokens,
            pos: 0,
            issues: IssueList::new(),
            next_node: 0,
        }
    }

    // ── Token access ───────────────────────────────────────────────────

    pub(crate) fn current(&self) -> Token {
        self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn kind(&self) -> TokenKind {
        self.current().kind
    }

    /// Kind of the token `n` positions ahead.
    pub(crate) fn nth(&self, n: usize) -> TokenKind {
        self.tokens[(self.pos + n).min(self.tokens.len() - 1)].kind
    }

    pub(crate) fn at(&self, kind: TokenKind) -> bool {
        self.kind() == kind
    }

    pub(crate) fn bump(&mut self) -> Token {
        let token = self.current();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    /// Consume the current token if it has the given kind.
    pub(crate) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Consume a token of the given kind or report what was expected.
    pub(crate) fn expect(&mut self, kind: TokenKind, what: &str) -> Option<Token> {
        if self.at(kind) {
            Some(self.bump())
        } else {
            self.error_at(
                format!("expected {what}, found `{}`", self.current_text_or_eof()),
                self.current().span,
            );
            None
        }
    }

    /// Text of a token, sliced from the source.
    pub(crate) fn text(&self, token: Token) -> &'src str {
        &self.source[token.span.to_range()]
    }

    fn current_text_or_eof(&self) -> &str {
        if self.at(TokenKind::Eof) {
            "end of file"
        } else {
            self.text(self.current())
        }
    }

    pub(crate) fn make_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        id
    }

    // ── Issues ─────────────────────────────────────────────────────────

    pub(crate) fn error_at(&mut self, message: String, span: Span) {
        self.issues.push(Issue::error("E0101", message, span));
    }

    // ── Separators and recovery ────────────────────────────────────────

    /// Skip newlines, semicolons, and directives between statements.
    pub(crate) fn skip_separators(&mut self) {
        while matches!(
            self.kind(),
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::Directive
        ) {
            self.bump();
        }
    }

    /// Skip newlines only (inside bracketed lists).
    pub(crate) fn skip_newlines(&mut self) {
        while self.at(TokenKind::Newline) {
            self.bump();
        }
    }

    fn at_stmt_end(&self) -> bool {
        matches!(
            self.kind(),
            TokenKind::Newline
                | TokenKind::Semicolon
                | TokenKind::RBrace
                | TokenKind::Eof
        )
    }

    /// Skip ahead to the next statement boundary, producing an `Invalid`
    /// statement spanning the skipped tokens.
    fn recover_stmt(&mut self, from: Span) -> Stmt {
        let mut span = from;
        while !self.at_stmt_end() {
            span = span.merge(self.bump().span);
        }
        Stmt::Invalid {
            id: self.make_id(),
            span,
        }
    }

    // ── Module and statements ──────────────────────────────────────────

    fn parse_module_body(&mut self) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        loop {
            self.skip_separators();
            if self.at(TokenKind::Eof) {
                break;
            }
            stmts.push(self.parse_stmt());
            if !self.at_stmt_end() {
                let span = self.current().span;
                self.error_at(
                    format!(
                        "expected end of statement, found `{}`",
                        self.current_text_or_eof()
                    ),
                    span,
                );
                stmts.push(self.recover_stmt(span));
            }
        }
        stmts
    }

    /// Parse the statements between `{` and `}`. Opens no scope itself;
    /// scoping is the semantic passes' concern.
    pub(crate) fn parse_block(&mut self) -> Block {
        let id = self.make_id();
        let open = self.current().span;
        if self.expect(TokenKind::LBrace, "`{`").is_none() {
            return Block {
                id,
                span: open,
                stmts: Vec::new(),
            };
        }
        let mut stmts = Vec::new();
        loop {
            self.skip_separators();
            if self.at(TokenKind::RBrace) || self.at(TokenKind::Eof) {
                break;
            }
            stmts.push(self.parse_stmt());
            if !self.at_stmt_end() {
                let span = self.current().span;
                self.error_at(
                    format!(
                        "expected end of statement, found `{}`",
                        self.current_text_or_eof()
                    ),
                    span,
                );
                stmts.push(self.recover_stmt(span));
            }
        }
        let close = self.current().span;
        self.expect(TokenKind::RBrace, "`}`");
        Block {
            id,
            span: open.merge(close),
            stmts,
        }
    }

    pub(crate) fn parse_stmt(&mut self) -> Stmt {
        match self.kind() {
            TokenKind::AtName
            | TokenKind::Static
            | TokenKind::Mutating
            | TokenKind::Let
            | TokenKind::Var
            | TokenKind::New
            | TokenKind::Del
            | TokenKind::Struct
            | TokenKind::Union
            | TokenKind::Interface
            | TokenKind::Extension
            | TokenKind::Case => self.parse_decl(),
            // `fun name...` declares; `fun (...)` is a lambda expression.
            TokenKind::Fun if self.nth(1) == TokenKind::Ident => self.parse_decl(),
            TokenKind::If => Stmt::If(self.parse_if_stmt()),
            TokenKind::While => Stmt::While(self.parse_while_stmt()),
            TokenKind::Return => Stmt::Return(self.parse_return_stmt()),
            TokenKind::LBrace => Stmt::Brace(self.parse_block()),
            _ => self.parse_expr_or_binding_stmt(),
        }
    }

    fn parse_if_stmt(&mut self) -> IfStmt {
        let id = self.make_id();
        let start = self.bump().span; // `if`
        let cond = self.parse_expr();
        let then_block = self.parse_block();
        let mut span = start.merge(then_block.span);
        let else_branch = if self.eat(TokenKind::Else) {
            let branch = if self.at(TokenKind::If) {
                Stmt::If(self.parse_if_stmt())
            } else {
                Stmt::Brace(self.parse_block())
            };
            span = span.merge(branch.span());
            Some(Box::new(branch))
        } else {
            None
        };
        IfStmt {
            id,
            span,
            cond,
            then_block,
            else_branch,
        }
    }

    fn parse_while_stmt(&mut self) -> WhileStmt {
        let id = self.make_id();
        let start = self.bump().span; // `while`
        let cond = self.parse_expr();
        let body = self.parse_block();
        WhileStmt {
            id,
            span: start.merge(body.span),
            cond,
            body,
        }
    }

    fn parse_return_stmt(&mut self) -> ReturnStmt {
        let id = self.make_id();
        let start = self.bump().span; // `return`
        let binding = if let Some(op) = self.eat_binding_op(true) {
            let value = self.parse_expr();
            Some((op, value))
        } else if !self.at_stmt_end() {
            // `return x` reads as the copy sugar
            let value = self.parse_expr();
            Some((BindOp::Copy, value))
        } else {
            None
        };
        let span = match &binding {
            Some((_, value)) => start.merge(value.span()),
            None => start,
        };
        ReturnStmt { id, span, binding }
    }

    /// Consume a binding operator if one is next. When `allow_eq_sugar`,
    /// a plain `=` also counts and means copy.
    pub(crate) fn eat_binding_op(&mut self, allow_eq_sugar: bool) -> Option<BindOp> {
        let op = match self.kind() {
            TokenKind::ColonEq => BindOp::Copy,
            TokenKind::AmpMinus => BindOp::Alias,
            TokenKind::LArrow => BindOp::Move,
            TokenKind::Eq if allow_eq_sugar => BindOp::Copy,
            _ => return None,
        };
        self.bump();
        Some(op)
    }

    fn parse_expr_or_binding_stmt(&mut self) -> Stmt {
        let start = self.current().span;
        let lvalue = self.parse_expr();
        if matches!(lvalue, Expr::Invalid { .. }) && self.current().span == start {
            // parse_expr made no progress; drop the offending token
            let span = self.bump().span;
            self.error_at(
                format!("expected a statement, found `{}`", {
                    let t = &self.source[span.to_range()];
                    if t.is_empty() { "end of file" } else { t }
                }),
                span,
            );
            return self.recover_stmt(span);
        }
        let op_token = self.current();
        if let Some(op) = self.eat_binding_op(false) {
            let rvalue = self.parse_expr();
            Stmt::Binding(BindingStmt {
                id: self.make_id(),
                span: lvalue.span().merge(rvalue.span()),
                op,
                op_span: op_token.span,
                lvalue,
                rvalue,
            })
        } else {
            Stmt::Expr(lvalue)
        }
    }
}
