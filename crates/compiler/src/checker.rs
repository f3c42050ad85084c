//! Semantic checker: a post-order walk over the AST that fills in every
//! `RefCell<Option<Type>>` slot and rejects anything the type/scope
//! rules disallow.
//!
//! Top-level statements are checked against the global scope directly —
//! they play the same role a synthetic entry-point function's body
//! plays later in the IR generator, so `break`/`continue`/`return` at
//! the top level are rejected for the ordinary reason (no enclosing
//! loop or function), not as a special case. A single sequential pass
//! over `program.statements`: a `FuncDecl` registers its own name in the
//! global scope before its body is checked (so a function can call
//! itself) but a call to a function declared later in the file is an
//! undefined name, exactly as in the source checker this was ported
//! from.

use crate::ast::{BinOp, Expr, Location, Program, Stmt, UnOp, VarKind};
use crate::symtab::{ScopeKind, Symbol, SymbolTable};
use crate::types::{Type, binop_signature, unop_signature};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    AssignmentError,
    VarDeclError,
    FuncDeclError,
    IfError,
    WhileError,
    ReturnError,
    BinaryError,
    UnaryError,
    TypeConvertionError,
    FunCallError,
    NameError,
    FunctionError,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckerError {
    pub line: usize,
    pub category: ErrorCategory,
    pub message: String,
}

impl fmt::Display for CheckerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line {}: {}: {}", self.line, self.category, self.message)
    }
}

impl std::error::Error for CheckerError {}

fn err(line: usize, category: ErrorCategory, message: impl Into<String>) -> CheckerError {
    CheckerError {
        line,
        category,
        message: message.into(),
    }
}

pub fn check_program<'a>(program: &'a Program) -> Result<(), CheckerError> {
    let mut symtab = SymbolTable::new();

    for stmt in &program.statements {
        check_stmt(&mut symtab, stmt)?;
    }

    Ok(())
}

fn check_stmt<'a>(symtab: &mut SymbolTable<'a>, stmt: &'a Stmt) -> Result<(), CheckerError> {
    match stmt {
        Stmt::Assignment {
            location,
            expr,
            line,
        } => {
            let rhs_ty = check_expr(symtab, expr, None)?;
            match location {
                Location::Primi { name, .. } => {
                    let sym = symtab.lookup(name).ok_or_else(|| {
                        err(*line, ErrorCategory::NameError, format!("undefined name '{name}'"))
                    })?;
                    if let Symbol::Var {
                        kind: VarKind::Const,
                        ..
                    } = sym
                    {
                        return Err(err(
                            *line,
                            ErrorCategory::AssignmentError,
                            format!("cannot assign to const '{name}'"),
                        ));
                    }
                    let declared = sym.ty();
                    if declared != rhs_ty {
                        return Err(err(
                            *line,
                            ErrorCategory::AssignmentError,
                            format!("cannot assign {rhs_ty} to '{name}' of type {declared}"),
                        ));
                    }
                    location.set_ty(declared);
                }
                Location::Mem { addr, .. } => {
                    let addr_ty = check_expr(symtab, addr, None)?;
                    if addr_ty != Type::Int {
                        return Err(err(
                            *line,
                            ErrorCategory::AssignmentError,
                            "memory address must be of type int",
                        ));
                    }
                    location.set_ty(rhs_ty);
                }
            }
            Ok(())
        }

        Stmt::Print { expr, .. } => {
            check_expr(symtab, expr, None)?;
            Ok(())
        }

        Stmt::If {
            cond,
            then_body,
            else_body,
            line,
        } => {
            let cond_ty = check_expr(symtab, cond, None)?;
            if cond_ty != Type::Bool {
                return Err(err(
                    *line,
                    ErrorCategory::IfError,
                    format!("condition must be bool, got {cond_ty}"),
                ));
            }
            symtab.push(ScopeKind::If);
            for s in then_body {
                check_stmt(symtab, s)?;
            }
            symtab.pop();
            if let Some(else_body) = else_body {
                symtab.push(ScopeKind::Else);
                for s in else_body {
                    check_stmt(symtab, s)?;
                }
                symtab.pop();
            }
            Ok(())
        }

        Stmt::While { cond, body, line } => {
            let cond_ty = check_expr(symtab, cond, None)?;
            if cond_ty != Type::Bool {
                return Err(err(
                    *line,
                    ErrorCategory::WhileError,
                    format!("condition must be bool, got {cond_ty}"),
                ));
            }
            symtab.push(ScopeKind::Loop);
            for s in body {
                check_stmt(symtab, s)?;
            }
            symtab.pop();
            Ok(())
        }

        Stmt::Break { line } => {
            if !symtab.enclosing(ScopeKind::Loop) {
                return Err(err(
                    *line,
                    ErrorCategory::WhileError,
                    "'break' used outside of a loop",
                ));
            }
            Ok(())
        }

        Stmt::Continue { line } => {
            if !symtab.enclosing(ScopeKind::Loop) {
                return Err(err(
                    *line,
                    ErrorCategory::WhileError,
                    "'continue' used outside of a loop",
                ));
            }
            Ok(())
        }

        Stmt::Return { expr, line } => {
            let func = symtab.enclosing_function().ok_or_else(|| {
                err(*line, ErrorCategory::ReturnError, "'return' used outside of a function")
            })?;
            let expected = func.ty();
            let actual = check_expr(symtab, expr, Some(expected))?;
            if actual != expected {
                return Err(err(
                    *line,
                    ErrorCategory::ReturnError,
                    format!("function expects return type {expected}, got {actual}"),
                ));
            }
            Ok(())
        }

        Stmt::VarDecl {
            kind,
            declared_ty,
            name,
            value,
            resolved_ty,
            line,
        } => {
            let resolved = match kind {
                VarKind::Var => {
                    let declared = declared_ty.expect("parser guarantees 'var' carries a type");
                    if let Some(v) = value {
                        let vt = check_expr(symtab, v, Some(declared))?;
                        if vt != declared {
                            return Err(err(
                                *line,
                                ErrorCategory::VarDeclError,
                                format!(
                                    "cannot initialize '{name}' of type {declared} with value of type {vt}"
                                ),
                            ));
                        }
                    }
                    declared
                }
                VarKind::Const => {
                    let v = value
                        .as_ref()
                        .expect("parser guarantees 'const' carries an initializer");
                    check_expr(symtab, v, None)?
                }
            };
            *resolved_ty.borrow_mut() = Some(resolved);
            symtab
                .insert(
                    name.clone(),
                    Symbol::Var {
                        kind: kind.clone(),
                        ty: resolved,
                    },
                )
                .map_err(|dup| {
                    err(
                        *line,
                        ErrorCategory::VarDeclError,
                        format!("'{dup}' already declared in this scope"),
                    )
                })?;
            Ok(())
        }

        Stmt::FuncDecl {
            is_import,
            name,
            params,
            body,
            line,
            ..
        } => {
            if symtab.current_kind() != ScopeKind::Global {
                return Err(err(
                    *line,
                    ErrorCategory::FuncDeclError,
                    "functions can only be declared at global scope",
                ));
            }
            // Registered before the body is checked, so a function can
            // call itself; a call to a function declared later in the
            // file still resolves to nothing, since that later
            // `FuncDecl` hasn't been visited yet.
            symtab
                .insert(name.clone(), Symbol::Func { decl: stmt })
                .map_err(|dup| {
                    err(
                        *line,
                        ErrorCategory::FuncDeclError,
                        format!("function '{dup}' already declared"),
                    )
                })?;
            if *is_import {
                return Ok(());
            }

            symtab.push(ScopeKind::Func);
            symtab
                .insert("$func", Symbol::Func { decl: stmt })
                .expect("fresh function scope cannot already hold '$func'");
            for p in params {
                symtab
                    .insert(p.name.clone(), Symbol::Param { ty: p.ty })
                    .map_err(|dup| {
                        err(
                            p.line,
                            ErrorCategory::FuncDeclError,
                            format!("duplicate parameter '{dup}'"),
                        )
                    })?;
            }
            for s in body {
                check_stmt(symtab, s)?;
            }
            if !guarantees_return(body) {
                return Err(err(
                    *line,
                    ErrorCategory::FunctionError,
                    "function does not guarantee a return on every path",
                ));
            }
            symtab.pop();
            Ok(())
        }
    }
}

/// A body guarantees a return if some direct statement is a `return`,
/// or some direct `if` has both branches and both guarantee a return.
/// Deliberately shallow: returns nested inside a `while` don't count,
/// since the loop might not execute.
fn guarantees_return(body: &[Stmt]) -> bool {
    body.iter().any(|s| match s {
        Stmt::Return { .. } => true,
        Stmt::If {
            then_body,
            else_body: Some(else_body),
            ..
        } => guarantees_return(then_body) && guarantees_return(else_body),
        _ => false,
    })
}

fn check_expr<'a>(
    symtab: &SymbolTable<'a>,
    expr: &Expr,
    ctx_ty: Option<Type>,
) -> Result<Type, CheckerError> {
    match expr {
        Expr::Literal { ty, .. } => Ok(*ty),

        Expr::Binary {
            op,
            left,
            right,
            line,
            ty,
        } => {
            let lt = check_expr(symtab, left, None)?;
            let rt = check_expr(symtab, right, None)?;
            let result = binop_signature(*op, lt, rt).ok_or_else(|| {
                err(
                    *line,
                    ErrorCategory::BinaryError,
                    format!("no '{}' operator for {lt} and {rt}", op_symbol(*op)),
                )
            })?;
            *ty.borrow_mut() = Some(result);
            Ok(result)
        }

        Expr::Unary {
            op,
            expr: inner,
            line,
            ty,
        } => {
            let t = check_expr(symtab, inner, None)?;
            let result = unop_signature(*op, t).ok_or_else(|| {
                err(
                    *line,
                    ErrorCategory::UnaryError,
                    format!("no '{}' operator for {t}", unop_symbol(*op)),
                )
            })?;
            *ty.borrow_mut() = Some(result);
            Ok(result)
        }

        Expr::TypeConversion {
            target,
            expr: inner,
            line,
        } => {
            let inner_ty = check_expr(symtab, inner, Some(*target))?;
            if *target == Type::Char {
                Ok(Type::Char)
            } else if inner_ty == Type::Char {
                Err(err(
                    *line,
                    ErrorCategory::TypeConvertionError,
                    format!("cannot convert char to {target}"),
                ))
            } else {
                Ok(*target)
            }
        }

        Expr::FuncCall {
            name,
            args,
            line,
            ty,
        } => {
            let sym = symtab.lookup(name).ok_or_else(|| {
                err(*line, ErrorCategory::NameError, format!("undefined function '{name}'"))
            })?;
            let Symbol::Func { .. } = sym else {
                return Err(err(
                    *line,
                    ErrorCategory::NameError,
                    format!("'{name}' is not a function"),
                ));
            };
            let params = sym.params();
            if params.len() != args.len() {
                return Err(err(
                    *line,
                    ErrorCategory::FunCallError,
                    format!(
                        "function '{name}' expects {} argument(s), got {}",
                        params.len(),
                        args.len()
                    ),
                ));
            }
            for (param, arg) in params.iter().zip(args.iter()) {
                let at = check_expr(symtab, arg, None)?;
                if at != param.ty {
                    return Err(err(
                        arg.line(),
                        ErrorCategory::FunCallError,
                        format!(
                            "argument '{}' of '{name}' expects {}, got {at}",
                            param.name, param.ty
                        ),
                    ));
                }
            }
            let result = sym.ty();
            *ty.borrow_mut() = Some(result);
            Ok(result)
        }

        Expr::Location(loc) => check_location(symtab, loc, ctx_ty),
    }
}

/// Resolves a location used in load position. `ctx_ty` is the type the
/// surrounding expression expects back — threaded down from an
/// enclosing `TypeConversion` — and is the only input that can
/// disambiguate a bare memory read's width; with no such context, a
/// memory cell is assumed to hold `int`.
fn check_location<'a>(
    symtab: &SymbolTable<'a>,
    loc: &Location,
    ctx_ty: Option<Type>,
) -> Result<Type, CheckerError> {
    match loc {
        Location::Primi { name, line, .. } => {
            let sym = symtab
                .lookup(name)
                .ok_or_else(|| err(*line, ErrorCategory::NameError, format!("undefined name '{name}'")))?;
            let t = sym.ty();
            loc.set_ty(t);
            Ok(t)
        }
        Location::Mem { addr, line, .. } => {
            let addr_ty = check_expr(symtab, addr, None)?;
            if addr_ty != Type::Int {
                return Err(err(
                    *line,
                    ErrorCategory::NameError,
                    "memory address must be of type int",
                ));
            }
            let reported = ctx_ty.unwrap_or(Type::Int);
            loc.set_ty(reported);
            Ok(reported)
        }
    }
}

fn op_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::And => "&&",
        BinOp::Or => "||",
    }
}

fn unop_symbol(op: UnOp) -> &'static str {
    match op {
        UnOp::Plus => "+",
        UnOp::Minus => "-",
        UnOp::Not => "!",
        UnOp::Grow => "^",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn check(src: &str) -> Result<(), CheckerError> {
        let tokens = Lexer::new(src).tokenize().expect("lex ok");
        let program = Parser::new(tokens).parse().expect("parse ok");
        check_program(&program)
    }

    #[test]
    fn simple_arithmetic_passes() {
        check("var x int = 2 + 3 * 4 - 5; print x;").unwrap();
    }

    #[test]
    fn const_reassignment_is_rejected() {
        let err = check("const pi = 3; func f() int { pi = 4; return pi; }").unwrap_err();
        assert_eq!(err.category, ErrorCategory::AssignmentError);
    }

    #[test]
    fn binary_type_mismatch_is_rejected() {
        let err = check("var x int = 1 + 1.0;").unwrap_err();
        assert_eq!(err.category, ErrorCategory::BinaryError);
    }

    #[test]
    fn if_condition_must_be_bool() {
        let err = check("if 1 { print 1; }").unwrap_err();
        assert_eq!(err.category, ErrorCategory::IfError);
    }

    #[test]
    fn break_outside_loop_is_rejected() {
        let err = check("break;").unwrap_err();
        assert_eq!(err.category, ErrorCategory::WhileError);
    }

    #[test]
    fn forward_referenced_function_call_is_undefined() {
        let err = check("func g() int { return f(); } func f() int { return 1; } print g();")
            .unwrap_err();
        assert_eq!(err.category, ErrorCategory::NameError);
    }

    #[test]
    fn backward_referenced_function_call_resolves() {
        check("func f() int { return 1; } func g() int { return f(); } print g();").unwrap();
    }

    #[test]
    fn function_can_call_itself() {
        check("func f(n int) int { return f(n); }").unwrap();
    }

    #[test]
    fn function_without_guaranteed_return_is_rejected() {
        let err = check("func f() int { if true { return 1; } }").unwrap_err();
        assert_eq!(err.category, ErrorCategory::FunctionError);
    }

    #[test]
    fn if_with_both_branches_returning_satisfies_function() {
        check("func f() int { if true { return 1; } else { return 0; } }").unwrap();
    }

    #[test]
    fn memory_round_trip_infers_int_by_default() {
        check("var p int = ^16; `p = 42; print `p;").unwrap();
    }

    #[test]
    fn char_conversion_is_always_accepted() {
        check("var c char = char(65);").unwrap();
    }

    #[test]
    fn converting_a_char_to_non_char_is_rejected() {
        let err = check("var c char = 'a'; var i int = int(c);").unwrap_err();
        assert_eq!(err.category, ErrorCategory::TypeConvertionError);
    }

    #[test]
    fn call_argument_count_mismatch_is_rejected() {
        let err = check("func f(n int) int { return n; } print f(1, 2);").unwrap_err();
        assert_eq!(err.category, ErrorCategory::FunCallError);
    }
}
