//! Abstract syntax tree for GoxLang.
//!
//! A closed family of variants, one per statement/expression/location
//! shape the grammar can produce. Every node carries a `line` for
//! diagnostics; expression and location nodes additionally carry a
//! `RefCell<Option<Type>>` slot the checker fills in during its pass so
//! the IR generator can read it back without re-deriving types.

use crate::types::Type;
use std::cell::RefCell;

/// How a `Location` is being used at a given point in the tree. The
/// parser can't know this (an assignment target and a read both parse
/// the same way); the IR generator sets it once it knows which side of
/// an `=` the location sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    Load,
    Store,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    /// A named variable: `x`.
    Primi {
        name: String,
        line: usize,
        usage: RefCell<Usage>,
        ty: RefCell<Option<Type>>,
    },
    /// A raw memory cell, addressed by an integer expression: `` `addr ``.
    Mem {
        addr: Box<Expr>,
        line: usize,
        usage: RefCell<Usage>,
        ty: RefCell<Option<Type>>,
    },
}

impl Location {
    pub fn line(&self) -> usize {
        match self {
            Location::Primi { line, .. } => *line,
            Location::Mem { line, .. } => *line,
        }
    }

    pub fn usage(&self) -> Usage {
        match self {
            Location::Primi { usage, .. } => *usage.borrow(),
            Location::Mem { usage, .. } => *usage.borrow(),
        }
    }

    pub fn set_usage(&self, u: Usage) {
        match self {
            Location::Primi { usage, .. } => *usage.borrow_mut() = u,
            Location::Mem { usage, .. } => *usage.borrow_mut() = u,
        }
    }

    pub fn ty(&self) -> Option<Type> {
        match self {
            Location::Primi { ty, .. } => ty.borrow().clone(),
            Location::Mem { ty, .. } => ty.borrow().clone(),
        }
    }

    pub fn set_ty(&self, t: Type) {
        match self {
            Location::Primi { ty, .. } => *ty.borrow_mut() = Some(t),
            Location::Mem { ty, .. } => *ty.borrow_mut() = Some(t),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Plus,
    Minus,
    Not,
    Grow,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal {
        value: String,
        ty: Type,
        line: usize,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
        line: usize,
        ty: RefCell<Option<Type>>,
    },
    Unary {
        op: UnOp,
        expr: Box<Expr>,
        line: usize,
        ty: RefCell<Option<Type>>,
    },
    TypeConversion {
        target: Type,
        expr: Box<Expr>,
        line: usize,
    },
    FuncCall {
        name: String,
        args: Vec<Expr>,
        line: usize,
        ty: RefCell<Option<Type>>,
    },
    Location(Location),
}

impl Expr {
    pub fn line(&self) -> usize {
        match self {
            Expr::Literal { line, .. }
            | Expr::Binary { line, .. }
            | Expr::Unary { line, .. }
            | Expr::TypeConversion { line, .. }
            | Expr::FuncCall { line, .. } => *line,
            Expr::Location(loc) => loc.line(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Var,
    Const,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assignment {
        location: Location,
        expr: Expr,
        line: usize,
    },
    Print {
        expr: Expr,
        line: usize,
    },
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Option<Vec<Stmt>>,
        line: usize,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
        line: usize,
    },
    Break {
        line: usize,
    },
    Continue {
        line: usize,
    },
    Return {
        expr: Expr,
        line: usize,
    },
    VarDecl {
        kind: VarKind,
        /// The declared type for `var`; always `None` as written for
        /// `const` (parser-enforced — see `parser::parse_vardecl`).
        declared_ty: Option<Type>,
        name: String,
        value: Option<Expr>,
        /// The type the checker settles on: `declared_ty` for `var`, or
        /// the initializer's type for `const`. Resolved eagerly during
        /// the checker's declaration pass so later lookups of this name
        /// never need to re-derive it.
        resolved_ty: RefCell<Option<Type>>,
        line: usize,
    },
    FuncDecl {
        is_import: bool,
        name: String,
        params: Vec<Param>,
        return_type: Type,
        body: Vec<Stmt>,
        line: usize,
    },
}

impl Stmt {
    pub fn line(&self) -> usize {
        match self {
            Stmt::Assignment { line, .. }
            | Stmt::Print { line, .. }
            | Stmt::If { line, .. }
            | Stmt::While { line, .. }
            | Stmt::Break { line }
            | Stmt::Continue { line }
            | Stmt::Return { line, .. }
            | Stmt::VarDecl { line, .. }
            | Stmt::FuncDecl { line, .. } => *line,
        }
    }
}

impl Stmt {
    /// The resolved type of a `VarDecl`, once the checker has visited it.
    /// Panics if called on any other statement kind or before checking.
    pub fn var_type(&self) -> Type {
        match self {
            Stmt::VarDecl { resolved_ty, .. } => {
                resolved_ty.borrow().expect("var decl type resolved by checker")
            }
            _ => panic!("var_type called on non-VarDecl statement"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl Program {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Program { statements }
    }
}
