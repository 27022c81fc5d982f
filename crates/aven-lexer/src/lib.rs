// Aven lexer -- tokenizer for the Aven programming language.

mod cursor;

use cursor::Cursor;
use aven_common::{keyword_from_str, Token, TokenKind};

/// The Aven lexer. Converts source text into a stream of tokens.
///
/// Wraps a [`Cursor`] for byte-level iteration and implements
/// `Iterator<Item = Token>`, so callers can consume tokens lazily or
/// collect them into a `Vec`.
///
/// Malformed input never aborts lexing: unknown characters and
/// unterminated strings become [`TokenKind::Error`] tokens the parser
/// reports as issues.
pub struct Lexer<'src> {
    cursor: Cursor<'src>,
    /// Whether the final `Eof` token has been emitted.
    emitted_eof: bool,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source text.
    pub fn new(source: &'src str) -> Self {
        Self {
            cursor: Cursor::new(source),
            emitted_eof: false,
        }
    }

    /// Convenience: tokenize the entire source into a `Vec<Token>`.
    ///
    /// The returned vector always ends with an `Eof` token.
    pub fn tokenize(source: &str) -> Vec<Token> {
        Lexer::new(source).collect()
    }

    /// Produce the next token.
    fn produce_token(&mut self) -> Token {
        self.skip_trivia();

        let start = self.cursor.pos();

        let Some(c) = self.cursor.peek() else {
            return Token::new(TokenKind::Eof, start, start);
        };

        match c {
            // ── Newlines (statement separators) ────────────────────────
            '\n' => {
                self.cursor.advance();
                Token::new(TokenKind::Newline, start, self.cursor.pos())
            }
            '\r' => {
                self.cursor.advance();
                // \r\n counts as one newline
                self.cursor.eat('\n');
                Token::new(TokenKind::Newline, start, self.cursor.pos())
            }

            // ── Delimiters ─────────────────────────────────────────────
            '(' => self.single_char_token(TokenKind::LParen, start),
            ')' => self.single_char_token(TokenKind::RParen, start),
            '[' => self.single_char_token(TokenKind::LBracket, start),
            ']' => self.single_char_token(TokenKind::RBracket, start),
            '{' => self.single_char_token(TokenKind::LBrace, start),
            '}' => self.single_char_token(TokenKind::RBrace, start),
            ',' => self.single_char_token(TokenKind::Comma, start),
            ';' => self.single_char_token(TokenKind::Semicolon, start),

            // ── Operators ──────────────────────────────────────────────
            '=' => self.lex_eq(start),
            '!' => self.lex_bang(start),
            '<' => self.lex_lt(start),
            '>' => self.lex_gt(start),
            '&' => self.lex_amp(start),
            ':' => self.lex_colon(start),
            '-' => self.lex_minus(start),
            '.' => self.single_char_token(TokenKind::Dot, start),
            '+' => self.single_char_token(TokenKind::Plus, start),
            '*' => self.single_char_token(TokenKind::Star, start),
            '%' => self.single_char_token(TokenKind::Percent, start),
            '/' => self.single_char_token(TokenKind::Slash, start),
            '@' => self.lex_at(start),
            '#' => self.lex_directive(start),

            // ── Literals ───────────────────────────────────────────────
            '0'..='9' => self.lex_number(start),
            '"' => self.lex_string(start),

            // ── Identifiers and keywords ───────────────────────────────
            c if is_ident_start(c) => self.lex_ident(start),

            // ── Unknown character (error recovery) ─────────────────────
            _ => {
                self.cursor.advance();
                Token::new(TokenKind::Error, start, self.cursor.pos())
            }
        }
    }

    // ── Helpers ────────────────────────────────────────────────────────

    /// Skip spaces, tabs, and `//` line comments. Newlines are tokens.
    fn skip_trivia(&mut self) {
        loop {
            self.cursor.eat_while(|c| c == ' ' || c == '\t');
            if self.cursor.peek() == Some('/') && self.cursor.peek_next() == Some('/') {
                self.cursor.eat_while(|c| c != '\n' && c != '\r');
            } else {
                break;
            }
        }
    }

    /// Consume one character and return a token of the given kind.
    fn single_char_token(&mut self, kind: TokenKind, start: u32) -> Token {
        self.cursor.advance();
        Token::new(kind, start, self.cursor.pos())
    }

    // ── Operator lexing ────────────────────────────────────────────────

    /// `=` -> `Eq`, `==` -> `EqEq`, `===` -> `EqEqEq`
    fn lex_eq(&mut self, start: u32) -> Token {
        self.cursor.advance(); // consume '='
        if self.cursor.eat('=') {
            if self.cursor.eat('=') {
                Token::new(TokenKind::EqEqEq, start, self.cursor.pos())
            } else {
                Token::new(TokenKind::EqEq, start, self.cursor.pos())
            }
        } else {
            Token::new(TokenKind::Eq, start, self.cursor.pos())
        }
    }

    /// `!=` -> `BangEq`, `!==` -> `BangEqEq`, bare `!` -> `Error`
    fn lex_bang(&mut self, start: u32) -> Token {
        self.cursor.advance(); // consume '!'
        if self.cursor.eat('=') {
            if self.cursor.eat('=') {
                Token::new(TokenKind::BangEqEq, start, self.cursor.pos())
            } else {
                Token::new(TokenKind::BangEq, start, self.cursor.pos())
            }
        } else {
            Token::new(TokenKind::Error, start, self.cursor.pos())
        }
    }

    /// `<` -> `Lt`, `<=` -> `LtEq`, `<-` -> `LArrow`
    fn lex_lt(&mut self, start: u32) -> Token {
        self.cursor.advance(); // consume '<'
        match self.cursor.peek() {
            Some('=') => {
                self.cursor.advance();
                Token::new(TokenKind::LtEq, start, self.cursor.pos())
            }
            Some('-') => {
                self.cursor.advance();
                Token::new(TokenKind::LArrow, start, self.cursor.pos())
            }
            _ => Token::new(TokenKind::Lt, start, self.cursor.pos()),
        }
    }

    /// `>` -> `Gt`, `>=` -> `GtEq`
    fn lex_gt(&mut self, start: u32) -> Token {
        self.cursor.advance(); // consume '>'
        if self.cursor.eat('=') {
            Token::new(TokenKind::GtEq, start, self.cursor.pos())
        } else {
            Token::new(TokenKind::Gt, start, self.cursor.pos())
        }
    }

    /// `&-` -> `AmpMinus`, bare `&` -> `Error`
    fn lex_amp(&mut self, start: u32) -> Token {
        self.cursor.advance(); // consume '&'
        if self.cursor.eat('-') {
            Token::new(TokenKind::AmpMinus, start, self.cursor.pos())
        } else {
            Token::new(TokenKind::Error, start, self.cursor.pos())
        }
    }

    /// `:` -> `Colon`, `::` -> `ColonColon`, `:=` -> `ColonEq`
    fn lex_colon(&mut self, start: u32) -> Token {
        self.cursor.advance(); // consume ':'
        match self.cursor.peek() {
            Some(':') => {
                self.cursor.advance();
                Token::new(TokenKind::ColonColon, start, self.cursor.pos())
            }
            Some('=') => {
                self.cursor.advance();
                Token::new(TokenKind::ColonEq, start, self.cursor.pos())
            }
            _ => Token::new(TokenKind::Colon, start, self.cursor.pos()),
        }
    }

    /// `-` -> `Minus`, `->` -> `Arrow`
    fn lex_minus(&mut self, start: u32) -> Token {
        self.cursor.advance(); // consume '-'
        if self.cursor.eat('>') {
            Token::new(TokenKind::Arrow, start, self.cursor.pos())
        } else {
            Token::new(TokenKind::Minus, start, self.cursor.pos())
        }
    }

    /// `@name` (qualifier or attribute head), bare `@` -> `Error`
    fn lex_at(&mut self, start: u32) -> Token {
        self.cursor.advance(); // consume '@'
        if self.cursor.peek().is_some_and(is_ident_start) {
            self.cursor.eat_while(is_ident_continue);
            Token::new(TokenKind::AtName, start, self.cursor.pos())
        } else {
            Token::new(TokenKind::Error, start, self.cursor.pos())
        }
    }

    /// `#...` compiler directive, consumed to end of line.
    fn lex_directive(&mut self, start: u32) -> Token {
        self.cursor.advance(); // consume '#'
        self.cursor.eat_while(|c| c != '\n' && c != '\r');
        Token::new(TokenKind::Directive, start, self.cursor.pos())
    }

    // ── Literal lexing ─────────────────────────────────────────────────

    /// Integer or float literal. A `.` only turns the literal into a float
    /// when followed by a digit, so `1.fst` stays `1` `.` `fst`.
    fn lex_number(&mut self, start: u32) -> Token {
        self.cursor.eat_while(|c| c.is_ascii_digit());
        if self.cursor.peek() == Some('.')
            && self.cursor.peek_next().is_some_and(|c| c.is_ascii_digit())
        {
            self.cursor.advance(); // consume '.'
            self.cursor.eat_while(|c| c.is_ascii_digit());
            Token::new(TokenKind::FloatLiteral, start, self.cursor.pos())
        } else {
            Token::new(TokenKind::IntLiteral, start, self.cursor.pos())
        }
    }

    /// String literal with `\` escapes. Unterminated strings produce an
    /// `Error` token spanning the opening quote to end of line/input.
    fn lex_string(&mut self, start: u32) -> Token {
        self.cursor.advance(); // consume opening '"'
        loop {
            match self.cursor.peek() {
                None | Some('\n') | Some('\r') => {
                    return Token::new(TokenKind::Error, start, self.cursor.pos());
                }
                Some('"') => {
                    self.cursor.advance();
                    return Token::new(TokenKind::StringLiteral, start, self.cursor.pos());
                }
                Some('\\') => {
                    self.cursor.advance();
                    // the escaped character is consumed blindly; the parser
                    // validates escape sequences when decoding the value
                    self.cursor.advance();
                }
                Some(_) => {
                    self.cursor.advance();
                }
            }
        }
    }

    /// Identifier or keyword. `as` fuses with a following `!` or `?` into
    /// the forced/conditional cast operators.
    fn lex_ident(&mut self, start: u32) -> Token {
        self.cursor.eat_while(is_ident_continue);
        let text = self.cursor.slice(start, self.cursor.pos());
        match keyword_from_str(text) {
            Some(TokenKind::As) => {
                if self.cursor.eat('!') {
                    Token::new(TokenKind::AsBang, start, self.cursor.pos())
                } else if self.cursor.eat('?') {
                    Token::new(TokenKind::AsQuestion, start, self.cursor.pos())
                } else {
                    Token::new(TokenKind::As, start, self.cursor.pos())
                }
            }
            Some(kind) => Token::new(kind, start, self.cursor.pos()),
            None => Token::new(TokenKind::Ident, start, self.cursor.pos()),
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.emitted_eof {
            return None;
        }
        let token = self.produce_token();
        if token.kind == TokenKind::Eof {
            self.emitted_eof = true;
        }
        Some(token)
    }
}

/// Whether a character may start an identifier.
fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

/// Whether a character may continue an identifier.
fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::tokenize(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn empty_source_is_just_eof() {
        assert_eq!(kinds(""), [TokenKind::Eof]);
    }

    #[test]
    fn copy_binding() {
        assert_eq!(
            kinds("x := 42"),
            [
                TokenKind::Ident,
                TokenKind::ColonEq,
                TokenKind::IntLiteral,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn alias_and_move_operators() {
        assert_eq!(
            kinds("a &- b <- c"),
            [
                TokenKind::Ident,
                TokenKind::AmpMinus,
                TokenKind::Ident,
                TokenKind::LArrow,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn reference_equality_operators() {
        assert_eq!(
            kinds("a === b !== c == d != e"),
            [
                TokenKind::Ident,
                TokenKind::EqEqEq,
                TokenKind::Ident,
                TokenKind::BangEqEq,
                TokenKind::Ident,
                TokenKind::EqEq,
                TokenKind::Ident,
                TokenKind::BangEq,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn qualifiers_lex_as_at_names() {
        let tokens = Lexer::tokenize("@cst Int");
        assert_eq!(tokens[0].kind, TokenKind::AtName);
        assert_eq!(tokens[0].span.to_range(), 0..4);
        assert_eq!(tokens[1].kind, TokenKind::Ident);
    }

    #[test]
    fn cast_operator_variants() {
        assert_eq!(
            kinds("x as T as! U as? V"),
            [
                TokenKind::Ident,
                TokenKind::As,
                TokenKind::Ident,
                TokenKind::AsBang,
                TokenKind::Ident,
                TokenKind::AsQuestion,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn keywords_and_idents() {
        assert_eq!(
            kinds("fun id struct Self selfish"),
            [
                TokenKind::Fun,
                TokenKind::Ident,
                TokenKind::Struct,
                TokenKind::SelfTy,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn float_vs_member_access() {
        assert_eq!(
            kinds("1.5 p.fst"),
            [
                TokenKind::FloatLiteral,
                TokenKind::Ident,
                TokenKind::Dot,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn newlines_are_tokens_comments_are_not() {
        assert_eq!(
            kinds("let x = 1 // comment\nlet y = 2"),
            [
                TokenKind::Let,
                TokenKind::Ident,
                TokenKind::Eq,
                TokenKind::IntLiteral,
                TokenKind::Newline,
                TokenKind::Let,
                TokenKind::Ident,
                TokenKind::Eq,
                TokenKind::IntLiteral,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn string_literal_with_escapes() {
        let tokens = Lexer::tokenize(r#""he said \"hi\"""#);
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[1].kind, TokenKind::Eof);
    }

    #[test]
    fn unterminated_string_is_error_token() {
        let tokens = Lexer::tokenize("\"oops\nlet");
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert_eq!(tokens[1].kind, TokenKind::Newline);
        assert_eq!(tokens[2].kind, TokenKind::Let);
    }

    #[test]
    fn directive_consumes_line() {
        assert_eq!(
            kinds("#entry main\nlet x = 1"),
            [
                TokenKind::Directive,
                TokenKind::Newline,
                TokenKind::Let,
                TokenKind::Ident,
                TokenKind::Eq,
                TokenKind::IntLiteral,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn unknown_character_recovers() {
        assert_eq!(
            kinds("let $ x"),
            [
                TokenKind::Let,
                TokenKind::Error,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn semicolons_separate_statements() {
        assert_eq!(
            kinds("x <- 3; y <- 4"),
            [
                TokenKind::Ident,
                TokenKind::LArrow,
                TokenKind::IntLiteral,
                TokenKind::Semicolon,
                TokenKind::Ident,
                TokenKind::LArrow,
                TokenKind::IntLiteral,
                TokenKind::Eof
            ]
        );
    }
}
