//! Recursive-descent parser for Czar
//!
//! Statements terminate on a newline-equivalent `;` or simply end-of-line
//! handling done by the lexer (the grammar treats both as the same
//! terminator, so the parser never distinguishes them — `;` is simply
//! optional punctuation it skips where present). Expressions use a
//! Pratt-style precedence table. On a parse error the parser records a
//! diagnostic and resynchronizes at the next statement boundary rather than
//! aborting, so one invocation can surface more than one mistake.

use std::path::{Path, PathBuf};

use crate::ast::*;
use crate::diagnostics::Diagnostics;
use crate::token::{Token, TokenKind};
use crate::types::{PointerFlags, Type};

pub fn parse(tokens: Vec<Token>, file: &Path, diags: &mut Diagnostics) -> Program {
    let mut parser = Parser::new(tokens, file.to_path_buf());
    parser.parse_program(diags)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    file: PathBuf,
}

impl Parser {
    fn new(tokens: Vec<Token>, file: PathBuf) -> Self {
        Parser { tokens, pos: 0, file }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let i = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[i]
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if !self.is_at_end() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, diags: &mut Diagnostics, what: &str) -> Option<Token> {
        if self.check(&kind) {
            Some(self.advance())
        } else {
            let tok = self.peek().clone();
            diags.error(&self.file, tok.line, tok.column, format!("expected {what}, found {tok}"));
            None
        }
    }

    fn skip_terminators(&mut self) {
        while self.matches(&TokenKind::Semicolon) {}
    }

    /// Recover from a parse error by advancing to the next `;`, `}`, or EOF.
    fn sync(&mut self) {
        while !self.is_at_end() {
            if matches!(self.peek().kind, TokenKind::Semicolon) {
                self.advance();
                return;
            }
            if matches!(self.peek().kind, TokenKind::RBrace) {
                return;
            }
            self.advance();
        }
    }

    fn parse_program(&mut self, diags: &mut Diagnostics) -> Program {
        let mut program = Program::new();
        self.skip_terminators();
        while !self.is_at_end() {
            if let TokenKind::Directive { name, args } = self.peek().kind.clone() {
                let tok = self.advance();
                program.directives.push(Directive { kind: name, args, line: tok.line, column: tok.column });
                self.skip_terminators();
                continue;
            }
            let before = self.pos;
            if self.check(&TokenKind::Struct) {
                if let Some(s) = self.parse_struct(diags) {
                    program.structs.push(s);
                }
            } else if self.check(&TokenKind::Pub) || self.check(&TokenKind::Fn) {
                if let Some(f) = self.parse_fn(diags) {
                    program.functions.push(f);
                }
            } else {
                let tok = self.peek().clone();
                diags.error(&self.file, tok.line, tok.column, format!("expected 'struct' or 'fn', found {tok}"));
                self.sync();
            }
            if self.pos == before {
                // guaranteed forward progress even on unexpected input
                self.advance();
            }
            self.skip_terminators();
        }
        program
    }

    fn parse_struct(&mut self, diags: &mut Diagnostics) -> Option<StructDecl> {
        let kw = self.advance();
        let name_tok = self.expect(TokenKind::Ident(String::new()), diags, "a struct name")?;
        let name = ident_text(&name_tok);
        self.expect(TokenKind::LBrace, diags, "'{' after struct name")?;
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let ty = self.parse_type(diags)?;
            let field_name_tok = self.expect(TokenKind::Ident(String::new()), diags, "a field name")?;
            let field_name = ident_text(&field_name_tok);
            fields.push((field_name, ty));
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, diags, "'}' to close struct body")?;
        Some(StructDecl { name, fields, line: kw.line, column: kw.column })
    }

    fn parse_type(&mut self, diags: &mut Diagnostics) -> Option<Type> {
        if self.matches(&TokenKind::Star) {
            let mut_ = self.matches(&TokenKind::Mut);
            let inner = self.parse_type(diags)?;
            let flags = if mut_ { PointerFlags::mut_only() } else { PointerFlags::NONE };
            return Some(Type::pointer(inner, flags));
        }
        if self.matches(&TokenKind::LBracket) {
            let element = self.parse_type(diags)?;
            self.expect(TokenKind::Semicolon, diags, "';' in array type")?;
            let size_tok = self.expect(TokenKind::IntLiteral { value: 0, raw: String::new() }, diags, "an array size")?;
            let size = int_value(&size_tok) as usize;
            self.expect(TokenKind::RBracket, diags, "']' to close array type")?;
            return Some(Type::array(element, size));
        }
        let tok = self.expect(TokenKind::Ident(String::new()), diags, "a type name")?;
        Some(Type::named(ident_text(&tok)))
    }

    fn parse_fn(&mut self, diags: &mut Diagnostics) -> Option<FnDecl> {
        let pub_ = self.matches(&TokenKind::Pub);
        let kw = self.expect(TokenKind::Fn, diags, "'fn'")?;
        let first_tok = self.expect(TokenKind::Ident(String::new()), diags, "a function or receiver name")?;
        let mut name = ident_text(&first_tok);
        let mut receiver_type = None;
        if self.matches(&TokenKind::Colon) {
            receiver_type = Some(name);
            let method_tok = self.expect(TokenKind::Ident(String::new()), diags, "a method name")?;
            name = ident_text(&method_tok);
        }
        self.expect(TokenKind::LParen, diags, "'(' after function name")?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.is_at_end() {
            let param = self.parse_param(receiver_type.as_deref(), diags)?;
            params.push(param);
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, diags, "')' to close parameter list")?;
        let return_type = if self.check(&TokenKind::LBrace) { Type::named("void") } else { self.parse_type(diags)? };
        let body = self.parse_block(diags)?;
        Some(FnDecl { name, receiver_type, params, return_type, body, pub_, line: kw.line, column: kw.column })
    }

    /// Parses one parameter: ordinary parameters are type-first (`Type name
    /// (= default)?`). Inside an explicit-receiver method (`Type:method`),
    /// `self`/`mut self` carries no type of its own — its type is the
    /// receiver type named before the colon.
    fn parse_param(&mut self, receiver_type: Option<&str>, diags: &mut Diagnostics) -> Option<Param> {
        let mut_ = self.matches(&TokenKind::Mut);
        if let Some(receiver) = receiver_type {
            if matches!(&self.peek().kind, TokenKind::Ident(n) if n == "self") {
                self.advance();
                return Some(Param { name: "self".to_string(), ty: Type::named(receiver.to_string()), default: None, mut_ });
            }
        }
        let ty = self.parse_type(diags)?;
        let pname_tok = self.expect(TokenKind::Ident(String::new()), diags, "a parameter name")?;
        let pname = ident_text(&pname_tok);
        let default = if self.matches(&TokenKind::Eq) { Some(self.parse_expr(diags)?) } else { None };
        Some(Param { name: pname, ty, default, mut_ })
    }

    fn parse_block(&mut self, diags: &mut Diagnostics) -> Option<Block> {
        self.expect(TokenKind::LBrace, diags, "'{' to start a block")?;
        let mut statements = Vec::new();
        self.skip_terminators();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            match self.parse_stmt(diags) {
                Some(stmt) => statements.push(stmt),
                None => self.sync(),
            }
            self.skip_terminators();
        }
        self.expect(TokenKind::RBrace, diags, "'}' to close a block")?;
        Some(Block { statements })
    }

    fn parse_stmt(&mut self, diags: &mut Diagnostics) -> Option<Stmt> {
        if let TokenKind::Directive { name, args } = self.peek().kind.clone() {
            if name == "defer" {
                let tok = self.advance();
                let inner = self.parse_stmt(diags)?;
                return Some(Stmt::Defer { stmt: Box::new(inner), line: tok.line, column: tok.column });
            }
            let _ = args;
        }
        match &self.peek().kind {
            TokenKind::Return => {
                let tok = self.advance();
                let value = if self.check(&TokenKind::Semicolon) || self.check(&TokenKind::RBrace) {
                    None
                } else {
                    Some(self.parse_expr(diags)?)
                };
                Some(Stmt::Return { value, line: tok.line, column: tok.column })
            }
            TokenKind::Let | TokenKind::Val | TokenKind::Var => self.parse_var_decl(diags),
            TokenKind::If => self.parse_if(diags),
            TokenKind::While => {
                let tok = self.advance();
                let cond = self.parse_expr(diags)?;
                let body = self.parse_block(diags)?;
                Some(Stmt::While { cond, body, line: tok.line, column: tok.column })
            }
            TokenKind::Free => {
                let tok = self.advance();
                let name_tok = self.expect(TokenKind::Ident(String::new()), diags, "a variable name after 'free'")?;
                Some(Stmt::Free { name: ident_text(&name_tok), line: tok.line, column: tok.column })
            }
            TokenKind::LBrace => {
                let tok = self.peek().clone();
                let block = self.parse_block(diags)?;
                Some(Stmt::Block { block, line: tok.line, column: tok.column })
            }
            _ if self.looks_like_type_first_var_decl() => self.parse_type_first_var_decl(diags),
            _ => {
                let tok = self.peek().clone();
                let expr = self.parse_expr(diags)?;
                Some(Stmt::ExprStmt { expr, line: tok.line, column: tok.column })
            }
        }
    }

    fn parse_var_decl(&mut self, diags: &mut Diagnostics) -> Option<Stmt> {
        let kw = self.advance();
        let mutable = matches!(kw.kind, TokenKind::Var) || self.matches(&TokenKind::Mut);
        let name_tok = self.expect(TokenKind::Ident(String::new()), diags, "a variable name")?;
        let name = ident_text(&name_tok);
        let ty = if self.matches(&TokenKind::Colon) { Some(self.parse_type(diags)?) } else { None };
        let init = if self.matches(&TokenKind::Eq) { Some(self.parse_expr(diags)?) } else { None };
        Some(Stmt::VarDecl { name, ty, init, mutable, scope_id: 0, line: kw.line, column: kw.column })
    }

    /// Keyword-less declaration: `[mut]? Type name (= expr)?;`. Its type
    /// prefix followed by a bare identifier never occurs at the head of any
    /// valid expression statement (a call is `name(`, a field access is
    /// `name.field`, an assignment is `name =`), so that two-identifier
    /// lookahead is enough to tell the two apart without backtracking.
    fn token_at(&self, i: usize) -> &Token {
        &self.tokens[i.min(self.tokens.len() - 1)]
    }

    fn scan_type_at(&self, i: usize) -> Option<usize> {
        match &self.token_at(i).kind {
            TokenKind::Star => {
                let mut j = i + 1;
                if matches!(self.token_at(j).kind, TokenKind::Mut) {
                    j += 1;
                }
                self.scan_type_at(j)
            }
            TokenKind::LBracket => {
                let j = self.scan_type_at(i + 1)?;
                if !matches!(self.token_at(j).kind, TokenKind::Semicolon) {
                    return None;
                }
                if !matches!(self.token_at(j + 1).kind, TokenKind::IntLiteral { .. }) {
                    return None;
                }
                if !matches!(self.token_at(j + 2).kind, TokenKind::RBracket) {
                    return None;
                }
                Some(j + 3)
            }
            TokenKind::Ident(_) => Some(i + 1),
            _ => None,
        }
    }

    fn looks_like_type_first_var_decl(&self) -> bool {
        let mut i = self.pos;
        if matches!(self.token_at(i).kind, TokenKind::Mut) {
            i += 1;
        }
        match self.scan_type_at(i) {
            Some(j) => matches!(self.token_at(j).kind, TokenKind::Ident(_)),
            None => false,
        }
    }

    fn parse_type_first_var_decl(&mut self, diags: &mut Diagnostics) -> Option<Stmt> {
        let start = self.peek().clone();
        let mutable = self.matches(&TokenKind::Mut);
        let ty = self.parse_type(diags)?;
        let name_tok = self.expect(TokenKind::Ident(String::new()), diags, "a variable name")?;
        let name = ident_text(&name_tok);
        let init = if self.matches(&TokenKind::Eq) { Some(self.parse_expr(diags)?) } else { None };
        Some(Stmt::VarDecl { name, ty: Some(ty), init, mutable, scope_id: 0, line: start.line, column: start.column })
    }

    fn parse_if(&mut self, diags: &mut Diagnostics) -> Option<Stmt> {
        let kw = self.advance();
        let cond = self.parse_expr(diags)?;
        let then_branch = self.parse_block(diags)?;
        let else_branch = if self.matches(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                Some(Box::new(self.parse_if(diags)?))
            } else {
                let tok = self.peek().clone();
                let block = self.parse_block(diags)?;
                Some(Box::new(Stmt::Block { block, line: tok.line, column: tok.column }))
            }
        } else {
            None
        };
        Some(Stmt::If { cond, then_branch, else_branch, line: kw.line, column: kw.column })
    }

    // --- Expressions: Pratt-style precedence climbing ---

    fn parse_expr(&mut self, diags: &mut Diagnostics) -> Option<Expr> {
        self.parse_assignment(diags)
    }

    fn parse_assignment(&mut self, diags: &mut Diagnostics) -> Option<Expr> {
        let target = self.parse_logic_or(diags)?;
        let compound = match self.peek().kind {
            TokenKind::Eq => None,
            TokenKind::PlusEq => Some(CompoundOp::Add),
            TokenKind::MinusEq => Some(CompoundOp::Sub),
            TokenKind::StarEq => Some(CompoundOp::Mul),
            TokenKind::SlashEq => Some(CompoundOp::Div),
            TokenKind::PercentEq => Some(CompoundOp::Rem),
            _ => return Some(target),
        };
        let tok = self.advance();
        let value = self.parse_assignment(diags)?;
        Some(match compound {
            None => Expr::Assign { target: Box::new(target), value: Box::new(value), line: tok.line, column: tok.column },
            Some(op) => Expr::CompoundAssign { op, target: Box::new(target), value: Box::new(value), line: tok.line, column: tok.column },
        })
    }

    fn parse_logic_or(&mut self, diags: &mut Diagnostics) -> Option<Expr> {
        let mut left = self.parse_logic_and(diags)?;
        loop {
            if self.matches(&TokenKind::Or) || self.matches(&TokenKind::PipePipe) {
                let right = self.parse_logic_and(diags)?;
                left = bin(BinOp::LogOr, left, right);
            } else {
                break;
            }
        }
        Some(left)
    }

    fn parse_logic_and(&mut self, diags: &mut Diagnostics) -> Option<Expr> {
        let mut left = self.parse_equality(diags)?;
        loop {
            if self.matches(&TokenKind::And) || self.matches(&TokenKind::AmpAmp) {
                let right = self.parse_equality(diags)?;
                left = bin(BinOp::LogAnd, left, right);
            } else {
                break;
            }
        }
        Some(left)
    }

    fn parse_equality(&mut self, diags: &mut Diagnostics) -> Option<Expr> {
        let mut left = self.parse_relational(diags)?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => BinOp::EqEq,
                TokenKind::Ne => BinOp::Ne,
                _ => break,
            };
            self.advance();
            let right = self.parse_relational(diags)?;
            left = bin(op, left, right);
        }
        Some(left)
    }

    fn parse_relational(&mut self, diags: &mut Diagnostics) -> Option<Expr> {
        let mut left = self.parse_bitor(diags)?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Ge => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_bitor(diags)?;
            left = bin(op, left, right);
        }
        Some(left)
    }

    fn parse_bitor(&mut self, diags: &mut Diagnostics) -> Option<Expr> {
        let mut left = self.parse_bitxor(diags)?;
        while self.matches(&TokenKind::Pipe) {
            let right = self.parse_bitxor(diags)?;
            left = bin(BinOp::BitOr, left, right);
        }
        Some(left)
    }

    fn parse_bitxor(&mut self, diags: &mut Diagnostics) -> Option<Expr> {
        let mut left = self.parse_bitand(diags)?;
        while self.matches(&TokenKind::Caret) {
            let right = self.parse_bitand(diags)?;
            left = bin(BinOp::BitXor, left, right);
        }
        Some(left)
    }

    fn parse_bitand(&mut self, diags: &mut Diagnostics) -> Option<Expr> {
        let mut left = self.parse_shift(diags)?;
        while self.matches(&TokenKind::Amp) {
            let right = self.parse_shift(diags)?;
            left = bin(BinOp::BitAnd, left, right);
        }
        Some(left)
    }

    fn parse_shift(&mut self, diags: &mut Diagnostics) -> Option<Expr> {
        let mut left = self.parse_additive(diags)?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Shl => BinOp::Shl,
                TokenKind::Shr => BinOp::Shr,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive(diags)?;
            left = bin(op, left, right);
        }
        Some(left)
    }

    fn parse_additive(&mut self, diags: &mut Diagnostics) -> Option<Expr> {
        let mut left = self.parse_multiplicative(diags)?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative(diags)?;
            left = bin(op, left, right);
        }
        Some(left)
    }

    fn parse_multiplicative(&mut self, diags: &mut Diagnostics) -> Option<Expr> {
        let mut left = self.parse_unary(diags)?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Rem,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary(diags)?;
            left = bin(op, left, right);
        }
        Some(left)
    }

    fn parse_unary(&mut self, diags: &mut Diagnostics) -> Option<Expr> {
        let op = match self.peek().kind {
            TokenKind::Minus => Some(UnOp::Neg),
            TokenKind::Bang => Some(UnOp::Not),
            TokenKind::Amp => Some(UnOp::Addr),
            TokenKind::Star => Some(UnOp::Deref),
            TokenKind::Tilde => Some(UnOp::BitNot),
            _ => None,
        };
        if let Some(op) = op {
            let tok = self.advance();
            let operand = self.parse_unary(diags)?;
            return Some(Expr::Unary { op, operand: Box::new(operand), line: tok.line, column: tok.column });
        }
        if matches!(self.peek().kind, TokenKind::Mut) {
            let tok = self.advance();
            let inner = self.parse_unary(diags)?;
            return Some(Expr::MutArg { expr: Box::new(inner), line: tok.line, column: tok.column });
        }
        self.parse_postfix(diags)
    }

    fn parse_postfix(&mut self, diags: &mut Diagnostics) -> Option<Expr> {
        let mut expr = self.parse_primary(diags)?;
        loop {
            match &self.peek().kind {
                TokenKind::BangBang => {
                    let tok = self.advance();
                    expr = Expr::NullCheck { operand: Box::new(expr), line: tok.line, column: tok.column };
                }
                TokenKind::Dot => {
                    let tok = self.advance();
                    let field_tok = self.expect(TokenKind::Ident(String::new()), diags, "a field or method name")?;
                    let field = ident_text(&field_tok);
                    if self.check(&TokenKind::LParen) {
                        let method_ref = Expr::MethodRef { object: Box::new(expr), method: field, line: tok.line, column: tok.column };
                        expr = self.parse_call(method_ref, diags)?;
                    } else {
                        expr = Expr::Field { object: Box::new(expr), field, line: tok.line, column: tok.column };
                    }
                }
                TokenKind::Colon => {
                    let tok = self.advance();
                    let method_tok = self.expect(TokenKind::Ident(String::new()), diags, "a method name after ':'")?;
                    let method = ident_text(&method_tok);
                    let method_ref = Expr::MethodRef { object: Box::new(expr), method, line: tok.line, column: tok.column };
                    expr = self.parse_call(method_ref, diags)?;
                }
                TokenKind::ColonColon => {
                    let tok = self.advance();
                    let method_tok = self.expect(TokenKind::Ident(String::new()), diags, "a method name after '::'")?;
                    let method = ident_text(&method_tok);
                    let type_name = static_receiver_name(&expr)?;
                    self.expect(TokenKind::LParen, diags, "'(' after static method name")?;
                    let args = self.parse_args(diags)?;
                    self.expect(TokenKind::RParen, diags, "')' to close argument list")?;
                    expr = Expr::StaticMethodCall { type_name, method, args, line: tok.line, column: tok.column };
                }
                TokenKind::LBracket => {
                    let tok = self.advance();
                    let index = self.parse_expr(diags)?;
                    self.expect(TokenKind::RBracket, diags, "']' to close index expression")?;
                    expr = Expr::Index { object: Box::new(expr), index: Box::new(index), line: tok.line, column: tok.column };
                }
                TokenKind::LParen => {
                    expr = self.parse_call(expr, diags)?;
                }
                _ => break,
            }
        }
        Some(expr)
    }

    fn parse_call(&mut self, callee: Expr, diags: &mut Diagnostics) -> Option<Expr> {
        let tok = self.peek().clone();
        self.expect(TokenKind::LParen, diags, "'(' to start argument list")?;
        let args = self.parse_args(diags)?;
        self.expect(TokenKind::RParen, diags, "')' to close argument list")?;
        Some(Expr::Call { callee: Box::new(callee), args, line: tok.line, column: tok.column })
    }

    fn parse_args(&mut self, diags: &mut Diagnostics) -> Option<Vec<Expr>> {
        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.is_at_end() {
            let tok = self.peek().clone();
            if let TokenKind::Ident(name) = &self.peek().kind.clone() {
                if matches!(self.peek_at(1).kind, TokenKind::Colon) {
                    self.advance();
                    self.advance();
                    let value = self.parse_expr(diags)?;
                    args.push(Expr::NamedArg { name: name.clone(), value: Box::new(value), line: tok.line, column: tok.column });
                    if !self.matches(&TokenKind::Comma) {
                        break;
                    }
                    continue;
                }
            }
            args.push(self.parse_expr(diags)?);
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        Some(args)
    }

    fn parse_primary(&mut self, diags: &mut Diagnostics) -> Option<Expr> {
        let tok = self.peek().clone();
        match tok.kind.clone() {
            TokenKind::IntLiteral { value, .. } => {
                self.advance();
                Some(Expr::Int { value, line: tok.line, column: tok.column })
            }
            TokenKind::True => {
                self.advance();
                Some(Expr::Bool { value: true, line: tok.line, column: tok.column })
            }
            TokenKind::False => {
                self.advance();
                Some(Expr::Bool { value: false, line: tok.line, column: tok.column })
            }
            TokenKind::Null => {
                self.advance();
                Some(Expr::Null { line: tok.line, column: tok.column })
            }
            TokenKind::StringLiteral(s) => {
                self.advance();
                Some(Expr::String { value: s, line: tok.line, column: tok.column })
            }
            TokenKind::CharLiteral(c) => {
                self.advance();
                Some(Expr::Char { value: c, line: tok.line, column: tok.column })
            }
            TokenKind::New => {
                self.advance();
                let (type_name, fields) = self.parse_struct_literal_body(diags)?;
                Some(Expr::NewHeap { type_name, fields, line: tok.line, column: tok.column })
            }
            TokenKind::Ident(name) if name == "clone" && matches!(self.peek_at(1).kind, TokenKind::LParen) => {
                self.advance();
                self.advance();
                let inner = self.parse_expr(diags)?;
                self.expect(TokenKind::RParen, diags, "')' to close clone(...)")?;
                Some(Expr::Clone { expr: Box::new(inner), target_type: None, line: tok.line, column: tok.column })
            }
            TokenKind::Cast => {
                self.advance();
                self.expect(TokenKind::Lt, diags, "'<' after cast")?;
                let target_type = self.parse_type(diags)?;
                self.expect(TokenKind::Gt, diags, "'>' to close cast<T>")?;
                self.expect(TokenKind::LParen, diags, "'(' after cast<T>")?;
                let inner = self.parse_expr(diags)?;
                self.expect(TokenKind::RParen, diags, "')' to close cast<T>(...)")?;
                Some(Expr::Cast { target_type, expr: Box::new(inner), line: tok.line, column: tok.column })
            }
            TokenKind::Is => {
                self.advance();
                let inner = self.parse_unary(diags)?;
                let ty = self.parse_type(diags)?;
                Some(Expr::IsCheck { expr: Box::new(inner), ty, line: tok.line, column: tok.column })
            }
            TokenKind::Ident(name) if name == "typeof" && matches!(self.peek_at(1).kind, TokenKind::LParen) => {
                self.advance();
                self.advance();
                let inner = self.parse_expr(diags)?;
                self.expect(TokenKind::RParen, diags, "')' to close typeof(...)")?;
                Some(Expr::TypeOf { expr: Box::new(inner), line: tok.line, column: tok.column })
            }
            TokenKind::Ident(name) => {
                self.advance();
                if is_capitalized(&name) && matches!(self.peek().kind, TokenKind::LBrace) {
                    let (type_name, fields) = self.parse_struct_literal_fields(name, diags)?;
                    return Some(Expr::StructLiteral { type_name, fields, line: tok.line, column: tok.column });
                }
                Some(Expr::Ident { name, line: tok.line, column: tok.column })
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr(diags)?;
                self.expect(TokenKind::RParen, diags, "')' to close parenthesized expression")?;
                Some(inner)
            }
            _ => {
                diags.error(&self.file, tok.line, tok.column, format!("unexpected token {tok} in expression"));
                None
            }
        }
    }

    fn parse_struct_literal_body(&mut self, diags: &mut Diagnostics) -> Option<(String, Vec<FieldInit>)> {
        let name_tok = self.expect(TokenKind::Ident(String::new()), diags, "a type name")?;
        let name = ident_text(&name_tok);
        self.parse_struct_literal_fields(name, diags)
    }

    fn parse_struct_literal_fields(&mut self, name: String, diags: &mut Diagnostics) -> Option<(String, Vec<FieldInit>)> {
        self.expect(TokenKind::LBrace, diags, "'{' to start struct literal")?;
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let field_name_tok = self.expect(TokenKind::Ident(String::new()), diags, "a field name")?;
            let field_name = ident_text(&field_name_tok);
            self.expect(TokenKind::Colon, diags, "':' after field name")?;
            let value = self.parse_expr(diags)?;
            fields.push(FieldInit { name: field_name, value });
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, diags, "'}' to close struct literal")?;
        Some((name, fields))
    }
}

fn bin(op: BinOp, left: Expr, right: Expr) -> Expr {
    let line = left.line();
    let column = left.column();
    Expr::Binary { op, left: Box::new(left), right: Box::new(right), line, column }
}

fn ident_text(tok: &Token) -> String {
    match &tok.kind {
        TokenKind::Ident(name) => name.clone(),
        _ => tok.lexeme.clone(),
    }
}

fn int_value(tok: &Token) -> i64 {
    match &tok.kind {
        TokenKind::IntLiteral { value, .. } => *value,
        _ => 0,
    }
}

fn is_capitalized(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

fn static_receiver_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Ident { name, .. } => Some(name.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use std::path::Path;

    fn parse_source(src: &str) -> (Program, Diagnostics) {
        let mut diags = Diagnostics::new();
        let tokens = lex(src, Path::new("t.cz"), &mut diags);
        let program = parse(tokens, Path::new("t.cz"), &mut diags);
        (program, diags)
    }

    #[test]
    fn parses_struct_and_fn() {
        let (program, diags) = parse_source("struct Point { i32 x, i32 y }\nfn main() i32 { return 0 }");
        assert!(!diags.has_errors());
        assert_eq!(program.structs.len(), 1);
        assert_eq!(program.functions.len(), 1);
        assert_eq!(program.structs[0].fields.len(), 2);
    }

    #[test]
    fn parses_method_fn_with_receiver() {
        let (program, diags) = parse_source("fn Point:area(self) i32 { return 0 }");
        assert!(!diags.has_errors());
        assert_eq!(program.functions[0].receiver_type.as_deref(), Some("Point"));
        assert_eq!(program.functions[0].name, "area");
        assert_eq!(program.functions[0].params[0].name, "self");
        assert_eq!(program.functions[0].params[0].ty.struct_name(), Some("Point"));
    }

    #[test]
    fn method_with_bare_mut_self_has_no_type_annotation() {
        let (program, diags) = parse_source("struct V{i32 x} fn V:get(mut self) i32 { return self.x }");
        assert!(!diags.has_errors());
        let get = &program.functions[0];
        assert!(get.params[0].mut_);
        assert_eq!(get.params[0].name, "self");
    }

    #[test]
    fn precedence_multiplication_over_addition() {
        let (program, diags) = parse_source("fn f() i32 { return 1 + 2 * 3 }");
        assert!(!diags.has_errors());
        let Stmt::Return { value: Some(Expr::Binary { op: BinOp::Add, right, .. }), .. } = &program.functions[0].body.statements[0] else {
            panic!("expected top-level add");
        };
        assert!(matches!(**right, Expr::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn struct_literal_disambiguated_by_capitalization() {
        let (program, diags) = parse_source("fn f() Point { return Point { x: 1, y: 2 } }");
        assert!(!diags.has_errors());
        let Stmt::Return { value: Some(Expr::StructLiteral { type_name, fields, .. }), .. } = &program.functions[0].body.statements[0] else {
            panic!("expected struct literal");
        };
        assert_eq!(type_name, "Point");
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn new_heap_allocation_parses() {
        let (program, diags) = parse_source("fn f() Point { return new Point { x: 1, y: 2 } }");
        assert!(!diags.has_errors());
        assert!(matches!(program.functions[0].body.statements[0], Stmt::Return { value: Some(Expr::NewHeap { .. }), .. }));
    }

    #[test]
    fn method_call_both_syntaxes_produce_method_ref_call() {
        let (program, diags) = parse_source("fn f() { p:area() p.area() }");
        assert!(!diags.has_errors());
        for stmt in &program.functions[0].body.statements {
            let Stmt::ExprStmt { expr: Expr::Call { callee, .. }, .. } = stmt else {
                panic!("expected call expr statement");
            };
            assert!(matches!(**callee, Expr::MethodRef { .. }));
        }
    }

    #[test]
    fn static_method_call_has_no_receiver_synthesis() {
        let (program, diags) = parse_source("fn f() { Point::origin() }");
        assert!(!diags.has_errors());
        assert!(matches!(
            program.functions[0].body.statements[0],
            Stmt::ExprStmt { expr: Expr::StaticMethodCall { .. }, .. }
        ));
    }

    #[test]
    fn named_and_default_style_arguments_parse() {
        let (program, diags) = parse_source("fn f() { g(1, y: 2) }");
        assert!(!diags.has_errors());
        let Stmt::ExprStmt { expr: Expr::Call { args, .. }, .. } = &program.functions[0].body.statements[0] else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 2);
        assert!(matches!(args[1], Expr::NamedArg { .. }));
    }

    #[test]
    fn cast_parses_target_type_and_inner_expr() {
        let (program, diags) = parse_source("fn f() i64 { return cast<i64>(1) }");
        assert!(!diags.has_errors());
        assert!(matches!(program.functions[0].body.statements[0], Stmt::Return { value: Some(Expr::Cast { .. }), .. }));
    }

    #[test]
    fn defer_wraps_inner_statement() {
        let (program, diags) = parse_source("fn f() { #defer free x }");
        assert!(!diags.has_errors());
        assert!(matches!(program.functions[0].body.statements[0], Stmt::Defer { .. }));
    }

    #[test]
    fn free_statement_parses_name() {
        let (program, diags) = parse_source("fn f() { free x }");
        assert!(!diags.has_errors());
        assert!(matches!(program.functions[0].body.statements[0], Stmt::Free { ref name, .. } if name == "x"));
    }

    #[test]
    fn error_recovery_continues_after_bad_statement() {
        let (program, diags) = parse_source("fn f() { @@@ return 1 }");
        assert!(diags.has_errors());
        assert!(!program.functions.is_empty());
    }

    #[test]
    fn elseif_chain_parses_as_nested_if() {
        let (program, diags) = parse_source("fn f() { if true { } else if false { } else { } }");
        assert!(!diags.has_errors());
        let Stmt::If { else_branch: Some(branch), .. } = &program.functions[0].body.statements[0] else {
            panic!("expected if");
        };
        assert!(matches!(**branch, Stmt::If { .. }));
    }

    #[test]
    fn keywordless_var_decl_parses_type_first() {
        let (program, diags) = parse_source("fn main() i32 { i32 a = 10; i32 b = 20; return a + b; }");
        assert!(!diags.has_errors());
        let Stmt::VarDecl { name, ty, init, .. } = &program.functions[0].body.statements[0] else {
            panic!("expected a var decl");
        };
        assert_eq!(name, "a");
        assert_eq!(ty.as_ref().map(Type::display), Some("i32".to_string()));
        assert!(init.is_some());
    }

    #[test]
    fn let_with_colon_annotation_and_pointer_type_still_parses() {
        let (program, diags) = parse_source("struct P{ i32 x } fn main() i32 { let p: *P = new P{x: 7}; return p.x; }");
        assert!(!diags.has_errors());
        let Stmt::VarDecl { ty: Some(ty), .. } = &program.functions[0].body.statements[0] else {
            panic!("expected a typed let decl");
        };
        assert!(ty.is_pointer());
    }

    #[test]
    fn defaulted_params_are_type_first_with_no_colon() {
        let (program, diags) = parse_source("fn f(i32 a, i32 b = 5, i32 c = 10) i32 { return a+b*c }");
        assert!(!diags.has_errors());
        let params = &program.functions[0].params;
        assert_eq!(params.len(), 3);
        assert_eq!(params[0].name, "a");
        assert!(params[0].default.is_none());
        assert_eq!(params[1].name, "b");
        assert!(params[1].default.is_some());
    }

    #[test]
    fn named_call_argument_after_positional_parses() {
        let (program, diags) = parse_source("fn f(i32 a, i32 b = 5, i32 c = 10) i32 { return a+b*c } fn main() i32 { return f(2, c: 20); }");
        assert!(!diags.has_errors());
        let Stmt::Return { value: Some(Expr::Call { args, .. }), .. } = &program.functions[1].body.statements[0] else {
            panic!("expected a call");
        };
        assert_eq!(args.len(), 2);
        assert!(matches!(args[1], Expr::NamedArg { .. }));
    }
}
