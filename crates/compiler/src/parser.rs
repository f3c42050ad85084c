//! Recursive-descent parser: token stream in, `Program` out.
//!
//! One token of lookahead throughout. Precedence climbing handles
//! binary operators; everything below `unary` bottoms out in
//! `parse_factor`. Static rules that are really syntactic (an untyped
//! `var`, a typed `const`, a function header whose parameter list isn't
//! followed by a return type) are rejected here rather than deferred to
//! the checker, matching the grammar's own split between syntax and
//! semantics.

use crate::ast::{BinOp, Expr, Location, Param, Program, Stmt, Usage, UnOp, VarKind};
use crate::token::{Token, TokenKind};
use crate::types::Type;
use std::cell::RefCell;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

type PResult<T> = Result<T, ParseError>;

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    pub fn parse(mut self) -> PResult<Program> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::Eof) {
            statements.push(self.parse_statement()?);
        }
        Ok(Program::new(statements))
    }

    // -- token plumbing --------------------------------------------------

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind, context: &str) -> PResult<Token> {
        if self.check(kind.clone()) {
            Ok(self.advance())
        } else {
            Err(self.err(format!(
                "expected {kind} {context}, found {}",
                self.current()
            )))
        }
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            line: self.current().line,
            message: message.into(),
        }
    }

    fn err_at(&self, line: usize, message: impl Into<String>) -> ParseError {
        ParseError {
            line,
            message: message.into(),
        }
    }

    /// Type keywords double as literal-kind tokens; `type_keyword` only
    /// accepts them when the lexeme is the keyword itself (a literal like
    /// `42` also carries kind `Int` but its lexeme isn't `"int"`).
    fn type_keyword(&self) -> Option<Type> {
        let tok = self.current();
        match (&tok.kind, tok.lexeme.as_str()) {
            (TokenKind::Int, "int") => Some(Type::Int),
            (TokenKind::Float, "float") => Some(Type::Float),
            (TokenKind::Char, "char") => Some(Type::Char),
            (TokenKind::Bool, "bool") => Some(Type::Bool),
            _ => None,
        }
    }

    // -- statements --------------------------------------------------------

    fn parse_statement(&mut self) -> PResult<Stmt> {
        match self.current().kind.clone() {
            TokenKind::Var | TokenKind::Const => self.parse_vardecl(),
            TokenKind::Func | TokenKind::Import => self.parse_funcdecl(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Break => {
                let line = self.advance().line;
                self.expect(TokenKind::Semi, "after 'break'")?;
                Ok(Stmt::Break { line })
            }
            TokenKind::Continue => {
                let line = self.advance().line;
                self.expect(TokenKind::Semi, "after 'continue'")?;
                Ok(Stmt::Continue { line })
            }
            TokenKind::Return => {
                let line = self.advance().line;
                let expr = self.parse_expression()?;
                self.expect(TokenKind::Semi, "after return expression")?;
                Ok(Stmt::Return { expr, line })
            }
            TokenKind::Print => {
                let line = self.advance().line;
                let expr = self.parse_expression()?;
                self.expect(TokenKind::Semi, "after print expression")?;
                Ok(Stmt::Print { expr, line })
            }
            _ => self.parse_assignment_or_expr_stmt(),
        }
    }

    fn parse_block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect(TokenKind::LBrace, "to open block")?;
        let mut statements = Vec::new();
        while !self.check(TokenKind::RBrace) {
            statements.push(self.parse_statement()?);
        }
        self.expect(TokenKind::RBrace, "to close block")?;
        Ok(statements)
    }

    fn parse_vardecl(&mut self) -> PResult<Stmt> {
        let line = self.current().line;
        let kind = if self.check(TokenKind::Var) {
            self.advance();
            VarKind::Var
        } else {
            self.advance();
            VarKind::Const
        };

        let name = self.expect(TokenKind::Id, "as declared name")?.lexeme;

        let declared_ty = match kind {
            VarKind::Var => {
                let ty = self
                    .type_keyword()
                    .ok_or_else(|| self.err("'var' declaration requires a type"))?;
                self.advance();
                Some(ty)
            }
            VarKind::Const => {
                if self.type_keyword().is_some() {
                    return Err(self.err("'const' declaration must not carry a type"));
                }
                None
            }
        };

        let value = if self.check(TokenKind::Assign) {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };

        if matches!(kind, VarKind::Const) && value.is_none() {
            return Err(self.err_at(line, "'const' declaration requires an initializer"));
        }

        self.expect(TokenKind::Semi, "after variable declaration")?;

        Ok(Stmt::VarDecl {
            kind,
            declared_ty,
            name,
            value,
            resolved_ty: RefCell::new(None),
            line,
        })
    }

    fn parse_funcdecl(&mut self) -> PResult<Stmt> {
        let line = self.current().line;
        let is_import = if self.check(TokenKind::Import) {
            self.advance();
            true
        } else {
            false
        };
        self.expect(TokenKind::Func, "to start a function declaration")?;
        let name = self.expect(TokenKind::Id, "as function name")?.lexeme;
        self.expect(TokenKind::LParen, "to open parameter list")?;

        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let param_line = self.current().line;
                let pname = self.expect(TokenKind::Id, "as parameter name")?.lexeme;
                let ty = self
                    .type_keyword()
                    .ok_or_else(|| self.err("parameter requires a type"))?;
                self.advance();
                params.push(Param {
                    name: pname,
                    ty,
                    line: param_line,
                });
                if self.check(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "to close parameter list")?;

        let return_type = self
            .type_keyword()
            .ok_or_else(|| self.err("function header must end with a return type"))?;
        self.advance();

        if is_import {
            self.expect(TokenKind::Semi, "after imported function header")?;
            return Ok(Stmt::FuncDecl {
                is_import: true,
                name,
                params,
                return_type,
                body: Vec::new(),
                line,
            });
        }

        let body = self.parse_block()?;
        Ok(Stmt::FuncDecl {
            is_import: false,
            name,
            params,
            return_type,
            body,
            line,
        })
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        let line = self.advance().line;
        let cond = self.parse_expression()?;
        let then_body = self.parse_block()?;
        let else_body = if self.check(TokenKind::Else) {
            self.advance();
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_body,
            else_body,
            line,
        })
    }

    fn parse_while(&mut self) -> PResult<Stmt> {
        let line = self.advance().line;
        let cond = self.parse_expression()?;
        let body = self.parse_block()?;
        Ok(Stmt::While { cond, body, line })
    }

    fn parse_assignment_or_expr_stmt(&mut self) -> PResult<Stmt> {
        let line = self.current().line;
        let loc = self.try_parse_location();
        match loc {
            Some(location) if self.check(TokenKind::Assign) => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::Semi, "after assignment")?;
                Ok(Stmt::Assignment {
                    location,
                    expr,
                    line,
                })
            }
            _ => Err(self.err(format!("unexpected token {}", self.current()))),
        }
    }

    /// Tries to read a `location` (`ID` or `` ` `` factor) without
    /// committing; used to decide between an assignment and a bare
    /// statement that starts with an identifier or backtick. GoxLang has
    /// no standalone expression statements, so anything that isn't
    /// followed by `=` is a syntax error at the call site.
    fn try_parse_location(&mut self) -> Option<Location> {
        let line = self.current().line;
        match self.current().kind {
            TokenKind::Id => {
                let name = self.advance().lexeme;
                Some(Location::Primi {
                    name,
                    line,
                    usage: RefCell::new(Usage::Load),
                    ty: RefCell::new(None),
                })
            }
            TokenKind::Deref => {
                self.advance();
                let addr = self.parse_factor().ok()?;
                Some(Location::Mem {
                    addr: Box::new(addr),
                    line,
                    usage: RefCell::new(Usage::Load),
                    ty: RefCell::new(None),
                })
            }
            _ => None,
        }
    }

    // -- expressions ---------------------------------------------------

    fn parse_expression(&mut self) -> PResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut left = self.parse_and()?;
        while self.check(TokenKind::Or) {
            let line = self.advance().line;
            let right = self.parse_and()?;
            left = Expr::Binary {
                op: BinOp::Or,
                left: Box::new(left),
                right: Box::new(right),
                line,
                ty: RefCell::new(None),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut left = self.parse_comparison()?;
        while self.check(TokenKind::And) {
            let line = self.advance().line;
            let right = self.parse_comparison()?;
            left = Expr::Binary {
                op: BinOp::And,
                left: Box::new(left),
                right: Box::new(right),
                line,
                ty: RefCell::new(None),
            };
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Eq => BinOp::Eq,
                TokenKind::Ne => BinOp::Ne,
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Ge => BinOp::Ge,
                _ => break,
            };
            let line = self.advance().line;
            let right = self.parse_additive()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                line,
                ty: RefCell::new(None),
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            let line = self.advance().line;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                line,
                ty: RefCell::new(None),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Times => BinOp::Mul,
                TokenKind::Divide => BinOp::Div,
                _ => break,
            };
            let line = self.advance().line;
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                line,
                ty: RefCell::new(None),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let op = match self.current().kind {
            TokenKind::Plus => Some(UnOp::Plus),
            TokenKind::Minus => Some(UnOp::Minus),
            TokenKind::Not => Some(UnOp::Not),
            TokenKind::Grow => Some(UnOp::Grow),
            _ => None,
        };
        if let Some(op) = op {
            let line = self.advance().line;
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                expr: Box::new(expr),
                line,
                ty: RefCell::new(None),
            });
        }
        self.parse_factor()
    }

    fn parse_factor(&mut self) -> PResult<Expr> {
        let line = self.current().line;

        // A type keyword (exact lexeme match, not just kind) starts a
        // type-conversion call, e.g. `int(x)`. Checked before the literal
        // arms below because numeric/char-kind tokens share a `TokenKind`
        // with their keyword (`int` lexes to the same kind as `42`).
        if let Some(target) = self.type_keyword() {
            self.advance();
            self.expect(TokenKind::LParen, "to open type-conversion argument")?;
            let expr = self.parse_expression()?;
            self.expect(TokenKind::RParen, "to close type-conversion argument")?;
            return Ok(Expr::TypeConversion {
                target,
                expr: Box::new(expr),
                line,
            });
        }

        match self.current().kind.clone() {
            TokenKind::Int => {
                let lexeme = self.advance().lexeme;
                Ok(Expr::Literal {
                    value: lexeme,
                    ty: Type::Int,
                    line,
                })
            }
            TokenKind::Float => {
                let lexeme = self.advance().lexeme;
                Ok(Expr::Literal {
                    value: lexeme,
                    ty: Type::Float,
                    line,
                })
            }
            TokenKind::Char => {
                let lexeme = self.advance().lexeme;
                Ok(Expr::Literal {
                    value: lexeme,
                    ty: Type::Char,
                    line,
                })
            }
            TokenKind::Bool => {
                let lexeme = self.advance().lexeme;
                Ok(Expr::Literal {
                    value: lexeme,
                    ty: Type::Bool,
                    line,
                })
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RParen, "to close parenthesized expression")?;
                Ok(inner)
            }
            TokenKind::Deref => {
                self.advance();
                let addr = self.parse_factor()?;
                Ok(Expr::Location(Location::Mem {
                    addr: Box::new(addr),
                    line,
                    usage: RefCell::new(Usage::Load),
                    ty: RefCell::new(None),
                }))
            }
            TokenKind::Id => {
                let name = self.advance().lexeme;
                if self.check(TokenKind::LParen) {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(TokenKind::RParen) {
                        loop {
                            args.push(self.parse_expression()?);
                            if self.check(TokenKind::Comma) {
                                self.advance();
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::RParen, "to close call arguments")?;
                    Ok(Expr::FuncCall {
                        name,
                        args,
                        line,
                        ty: RefCell::new(None),
                    })
                } else {
                    Ok(Expr::Location(Location::Primi {
                        name,
                        line,
                        usage: RefCell::new(Usage::Load),
                        ty: RefCell::new(None),
                    }))
                }
            }
            _ => Err(self.err(format!("unexpected token {} in expression", self.current()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(src: &str) -> PResult<Program> {
        let tokens = Lexer::new(src).tokenize().expect("lex ok");
        Parser::new(tokens).parse()
    }

    #[test]
    fn vardecl_requires_type() {
        let err = parse("var x = 1;").unwrap_err();
        assert!(err.message.contains("requires a type"));
    }

    #[test]
    fn const_rejects_explicit_type() {
        let err = parse("const x int = 1;").unwrap_err();
        assert!(err.message.contains("must not carry a type"));
    }

    #[test]
    fn const_requires_initializer() {
        let err = parse("const x;").unwrap_err();
        assert!(err.message.contains("requires an initializer"));
    }

    #[test]
    fn imported_func_has_no_body() {
        let prog = parse("import func puts(s int) int;").unwrap();
        match &prog.statements[0] {
            Stmt::FuncDecl { is_import, body, .. } => {
                assert!(*is_import);
                assert!(body.is_empty());
            }
            _ => panic!("expected a FuncDecl"),
        }
    }

    #[test]
    fn funcdecl_requires_return_type() {
        let err = parse("func f() { print 1; }").unwrap_err();
        assert!(err.message.contains("return type"));
    }

    #[test]
    fn precedence_and_associativity() {
        let prog = parse("var x int = 2 + 3 * 4 - 5;").unwrap();
        match &prog.statements[0] {
            Stmt::VarDecl { value: Some(expr), .. } => match expr {
                Expr::Binary { op: BinOp::Sub, .. } => {}
                other => panic!("expected top-level Sub, got {other:?}"),
            },
            _ => panic!("expected VarDecl"),
        }
    }

    #[test]
    fn memory_location_parses_as_deref_of_factor() {
        let prog = parse("var p int = ^16; `p = 42; print `p;").unwrap();
        assert_eq!(prog.statements.len(), 3);
        match &prog.statements[1] {
            Stmt::Assignment { location: Location::Mem { .. }, .. } => {}
            _ => panic!("expected Mem assignment"),
        }
    }

    #[test]
    fn if_else_parses_both_branches() {
        let prog = parse("func f() int { if true { return 1; } else { return 0; } }").unwrap();
        match &prog.statements[0] {
            Stmt::FuncDecl { body, .. } => match &body[0] {
                Stmt::If { else_body: Some(_), .. } => {}
                _ => panic!("expected if/else"),
            },
            _ => panic!("expected FuncDecl"),
        }
    }

    #[test]
    fn type_conversion_call_syntax() {
        let prog = parse("var x float = float(1);").unwrap();
        match &prog.statements[0] {
            Stmt::VarDecl { value: Some(Expr::TypeConversion { target, .. }), .. } => {
                assert_eq!(*target, Type::Float);
            }
            _ => panic!("expected TypeConversion"),
        }
    }
}
