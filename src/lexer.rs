//! Lexer: source string -> `Vec<Token>`
//!
//! Single-pass, no backtracking. Whitespace is skipped but still advances
//! line/column; comments are skipped entirely and never round-tripped.
//! `lex` is a pure function of its input — no global or thread-local state
//! is touched, so repeated calls on the same string always agree.

use crate::diagnostics::Diagnostics;
use crate::token::{keyword, Token, TokenKind};
use std::path::Path;

pub fn lex(source: &str, file: &Path, diags: &mut Diagnostics) -> Vec<Token> {
    let mut lexer = Lexer::new(source, file);
    lexer.run(diags);
    lexer.tokens
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    file: &'a Path,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(source: &str, file: &'a Path) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            file,
            tokens: Vec::new(),
        }
    }

    fn run(&mut self, diags: &mut Diagnostics) {
        loop {
            self.skip_whitespace_and_comments(diags);
            let (line, column) = (self.line, self.column);
            let Some(ch) = self.peek() else {
                self.tokens.push(Token::new(TokenKind::Eof, "", line, column));
                break;
            };

            if ch == '#' {
                self.lex_directive(line, column);
            } else if ch.is_ascii_digit() {
                self.lex_number(line, column, diags);
            } else if ch == '"' {
                self.lex_string(line, column, diags);
            } else if ch == '\'' {
                self.lex_char(line, column, diags);
            } else if is_ident_start(ch) {
                self.lex_ident_or_keyword(line, column);
            } else if let Some((kind, lexeme)) = self.lex_operator() {
                self.tokens.push(Token::new(kind, lexeme, line, column));
            } else {
                diags.error(
                    self.file,
                    line,
                    column,
                    format!("unknown character '{ch}'"),
                );
                self.advance();
                self.resync();
            }
        }
    }

    // --- low-level cursor helpers -----------------------------------

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    /// Resynchronize after an error: skip to the next whitespace.
    fn resync(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                break;
            }
            self.advance();
        }
    }

    fn skip_whitespace_and_comments(&mut self, diags: &mut Diagnostics) {
        loop {
            match self.peek() {
                Some(ch) if ch.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(ch) = self.peek() {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let (line, column) = (self.line, self.column);
                    self.advance();
                    self.advance();
                    let mut closed = false;
                    while let Some(ch) = self.peek() {
                        if ch == '*' && self.peek_at(1) == Some('/') {
                            self.advance();
                            self.advance();
                            closed = true;
                            break;
                        }
                        self.advance();
                    }
                    if !closed {
                        diags.error(self.file, line, column, "unterminated block comment");
                    }
                }
                _ => break,
            }
        }
    }

    // --- token producers ----------------------------------------------

    fn lex_directive(&mut self, line: usize, column: usize) {
        self.advance(); // '#'
        let mut name = String::new();
        while let Some(ch) = self.peek() {
            if is_ident_continue(ch) {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        // Directive body extends to end-of-line or end-of-statement (`;`).
        let mut args = String::new();
        while let Some(ch) = self.peek() {
            if ch == '\n' || ch == ';' {
                break;
            }
            args.push(ch);
            self.advance();
        }
        let lexeme = format!("#{name}{args}");
        let name_lower = name.to_lowercase();
        self.tokens.push(Token::new(
            TokenKind::Directive {
                name: name_lower,
                args: args.trim().to_string(),
            },
            lexeme,
            line,
            column,
        ));
    }

    fn lex_number(&mut self, line: usize, column: usize, diags: &mut Diagnostics) {
        let mut raw = String::new();

        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X')) {
            raw.push(self.advance().unwrap());
            raw.push(self.advance().unwrap());
            let mut digits = String::new();
            while let Some(ch) = self.peek() {
                if ch.is_ascii_hexdigit() {
                    digits.push(ch);
                    self.advance();
                } else if ch == '_' {
                    self.advance();
                } else {
                    break;
                }
            }
            raw.push_str(&digits);
            match i64::from_str_radix(&digits, 16) {
                Ok(value) => self.push_int(value, raw, line, column),
                Err(_) => {
                    diags.error(self.file, line, column, format!("invalid hex literal '{raw}'"));
                    self.push_int(0, raw, line, column);
                }
            }
            return;
        }

        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('b') | Some('B')) {
            raw.push(self.advance().unwrap());
            raw.push(self.advance().unwrap());
            let mut digits = String::new();
            while let Some(ch) = self.peek() {
                if ch == '0' || ch == '1' {
                    digits.push(ch);
                    self.advance();
                } else if ch == '_' {
                    self.advance();
                } else {
                    break;
                }
            }
            raw.push_str(&digits);
            match i64::from_str_radix(&digits, 2) {
                Ok(value) => self.push_int(value, raw, line, column),
                Err(_) => {
                    diags.error(self.file, line, column, format!("invalid binary literal '{raw}'"));
                    self.push_int(0, raw, line, column);
                }
            }
            return;
        }

        let mut digits = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.advance();
            } else if ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        raw.push_str(&digits);
        match digits.parse::<i64>() {
            Ok(value) => self.push_int(value, raw, line, column),
            Err(_) => {
                diags.error(self.file, line, column, format!("invalid integer literal '{raw}'"));
                self.push_int(0, raw, line, column);
            }
        }
    }

    fn push_int(&mut self, value: i64, raw: String, line: usize, column: usize) {
        self.tokens.push(Token::new(
            TokenKind::IntLiteral { value, raw: raw.clone() },
            raw,
            line,
            column,
        ));
    }

    fn lex_string(&mut self, line: usize, column: usize, diags: &mut Diagnostics) {
        self.advance(); // opening '"'
        let mut value = String::new();
        let mut terminated = false;
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            if ch == '"' {
                self.advance();
                terminated = true;
                break;
            }
            if ch == '\\' {
                self.advance();
                match self.peek() {
                    Some('\\') => { value.push('\\'); self.advance(); }
                    Some('"') => { value.push('"'); self.advance(); }
                    Some('n') => { value.push('\n'); self.advance(); }
                    Some('t') => { value.push('\t'); self.advance(); }
                    Some('r') => { value.push('\r'); self.advance(); }
                    Some('0') => { value.push('\0'); self.advance(); }
                    Some(other) => {
                        diags.error(self.file, self.line, self.column, format!("unknown escape sequence '\\{other}'"));
                        self.advance();
                    }
                    None => break,
                }
            } else {
                value.push(ch);
                self.advance();
            }
        }
        if !terminated {
            diags.error(self.file, line, column, "unterminated string literal");
        }
        self.tokens.push(Token::new(
            TokenKind::StringLiteral(value.clone()),
            format!("\"{value}\""),
            line,
            column,
        ));
    }

    fn lex_char(&mut self, line: usize, column: usize, diags: &mut Diagnostics) {
        self.advance(); // opening '\''
        let value = match self.peek() {
            Some('\\') => {
                self.advance();
                match self.peek() {
                    Some('n') => { self.advance(); '\n' }
                    Some('t') => { self.advance(); '\t' }
                    Some('r') => { self.advance(); '\r' }
                    Some('0') => { self.advance(); '\0' }
                    Some('\\') => { self.advance(); '\\' }
                    Some('\'') => { self.advance(); '\'' }
                    Some(other) => {
                        diags.error(self.file, line, column, format!("unknown escape sequence '\\{other}'"));
                        self.advance();
                        other
                    }
                    None => '\0',
                }
            }
            Some(ch) => {
                self.advance();
                ch
            }
            None => {
                diags.error(self.file, line, column, "unterminated char literal");
                '\0'
            }
        };
        if self.peek() == Some('\'') {
            self.advance();
        } else {
            diags.error(self.file, line, column, "unterminated char literal");
        }
        self.tokens.push(Token::new(
            TokenKind::CharLiteral(value),
            format!("'{value}'"),
            line,
            column,
        ));
    }

    fn lex_ident_or_keyword(&mut self, line: usize, column: usize) {
        let mut word = String::new();
        while let Some(ch) = self.peek() {
            if is_ident_continue(ch) {
                word.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        let kind = keyword(&word).unwrap_or_else(|| TokenKind::Ident(word.clone()));
        self.tokens.push(Token::new(kind, word, line, column));
    }

    /// Maximal-munch operator/punctuation lexer: longer lexemes are tried first.
    fn lex_operator(&mut self) -> Option<(TokenKind, String)> {
        let three: Option<(&str, TokenKind)> = None;
        let _ = three; // no 3-char operators in this language

        let two = [
            ("!!", TokenKind::BangBang),
            ("==", TokenKind::EqEq),
            ("!=", TokenKind::Ne),
            ("<=", TokenKind::Le),
            (">=", TokenKind::Ge),
            ("+=", TokenKind::PlusEq),
            ("-=", TokenKind::MinusEq),
            ("*=", TokenKind::StarEq),
            ("/=", TokenKind::SlashEq),
            ("%=", TokenKind::PercentEq),
            ("<<", TokenKind::Shl),
            (">>", TokenKind::Shr),
            ("&&", TokenKind::AmpAmp),
            ("||", TokenKind::PipePipe),
            ("::", TokenKind::ColonColon),
        ];
        for (lexeme, kind) in two {
            if self.matches_str(lexeme) {
                self.advance();
                self.advance();
                return Some((kind, lexeme.to_string()));
            }
        }

        let one = [
            ('(', TokenKind::LParen),
            (')', TokenKind::RParen),
            ('{', TokenKind::LBrace),
            ('}', TokenKind::RBrace),
            ('[', TokenKind::LBracket),
            (']', TokenKind::RBracket),
            (',', TokenKind::Comma),
            (':', TokenKind::Colon),
            (';', TokenKind::Semicolon),
            ('.', TokenKind::Dot),
            ('+', TokenKind::Plus),
            ('-', TokenKind::Minus),
            ('*', TokenKind::Star),
            ('/', TokenKind::Slash),
            ('%', TokenKind::Percent),
            ('&', TokenKind::Amp),
            ('|', TokenKind::Pipe),
            ('^', TokenKind::Caret),
            ('!', TokenKind::Bang),
            ('~', TokenKind::Tilde),
            ('<', TokenKind::Lt),
            ('>', TokenKind::Gt),
            ('=', TokenKind::Eq),
            ('?', TokenKind::Question),
        ];
        let ch = self.peek()?;
        for (c, kind) in one {
            if ch == c {
                self.advance();
                return Some((kind, c.to_string()));
            }
        }
        None
    }

    fn matches_str(&self, s: &str) -> bool {
        s.chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c))
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn lex_ok(source: &str) -> Vec<Token> {
        let mut diags = Diagnostics::new();
        let tokens = lex(source, &PathBuf::from("test.cz"), &mut diags);
        assert!(!diags.has_errors(), "unexpected errors: {:?}", diags.into_vec());
        tokens
    }

    #[test]
    fn lexes_keywords_and_idents() {
        let tokens = lex_ok("fn main struct foo");
        assert_eq!(tokens[0].kind, TokenKind::Fn);
        assert_eq!(tokens[1].kind, TokenKind::Ident("main".into()));
        assert_eq!(tokens[2].kind, TokenKind::Struct);
        assert_eq!(tokens[3].kind, TokenKind::Ident("foo".into()));
    }

    #[test]
    fn lexes_decimal_hex_and_binary_with_separators() {
        let tokens = lex_ok("1_000 0xFF 0b1010");
        assert_eq!(tokens[0].kind, TokenKind::IntLiteral { value: 1000, raw: "1000".into() });
        assert_eq!(tokens[1].kind, TokenKind::IntLiteral { value: 255, raw: "0xFF".into() });
        assert_eq!(tokens[2].kind, TokenKind::IntLiteral { value: 10, raw: "0b1010".into() });
    }

    #[test]
    fn maximal_munch_orders_longer_operators_first() {
        let tokens = lex_ok("<<= << < == = != !");
        // note: no `<<=` operator in this language, so it lexes as `<<` then `=`
        assert_eq!(tokens[0].kind, TokenKind::Shl);
        assert_eq!(tokens[1].kind, TokenKind::Eq);
        assert_eq!(tokens[2].kind, TokenKind::Shl);
        assert_eq!(tokens[3].kind, TokenKind::Lt);
        assert_eq!(tokens[4].kind, TokenKind::EqEq);
        assert_eq!(tokens[5].kind, TokenKind::Eq);
        assert_eq!(tokens[6].kind, TokenKind::Ne);
        assert_eq!(tokens[7].kind, TokenKind::Bang);
    }

    #[test]
    fn string_literal_supports_escapes() {
        let tokens = lex_ok(r#""hi\n\"there\"""#);
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral("hi\n\"there\"".into()));
    }

    #[test]
    fn unterminated_string_is_diagnosed() {
        let mut diags = Diagnostics::new();
        let _ = lex("\"no closing quote", &PathBuf::from("t.cz"), &mut diags);
        assert!(diags.has_errors());
    }

    #[test]
    fn unknown_character_is_diagnosed_and_resynced() {
        let mut diags = Diagnostics::new();
        let tokens = lex("fn@ main", &PathBuf::from("t.cz"), &mut diags);
        assert!(diags.has_errors());
        // lexing continues past the bad char and still finds `main`
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Ident("main".into())));
    }

    #[test]
    fn directive_body_extends_to_end_of_line() {
        let tokens = lex_ok("#DEBUG true\nfn");
        match &tokens[0].kind {
            TokenKind::Directive { name, args } => {
                assert_eq!(name, "debug");
                assert_eq!(args, "true");
            }
            other => panic!("expected directive, got {other:?}"),
        }
    }

    #[test]
    fn comments_are_skipped_entirely() {
        let tokens = lex_ok("// line comment\nfn /* block\ncomment */ main");
        assert_eq!(tokens[0].kind, TokenKind::Fn);
        assert_eq!(tokens[1].kind, TokenKind::Ident("main".into()));
    }

    #[test]
    fn lex_is_a_pure_function_of_its_input() {
        let a = lex_ok("fn main() i32 { return 1 + 2; }");
        let b = lex_ok("fn main() i32 { return 1 + 2; }");
        assert_eq!(a, b);
    }
}
