//! GoxLang's primitive type set and its operator signature tables.

use crate::ast::{BinOp, UnOp};
use goxlang_core::LowType;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Float,
    Char,
    Bool,
}

impl Type {
    pub fn low_type(self) -> LowType {
        match self {
            Type::Float => LowType::F,
            Type::Int | Type::Char | Type::Bool => LowType::I,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Type::Int => "int",
            Type::Float => "float",
            Type::Char => "char",
            Type::Bool => "bool",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// `(type, op, type) -> result type`, per the Glossary's binary signature
/// table: arithmetic is numeric-only and returns its operand type;
/// comparisons return `bool`; `&&`/`||` only accept `bool`.
pub fn binop_signature(op: BinOp, lhs: Type, rhs: Type) -> Option<Type> {
    if lhs != rhs {
        return None;
    }
    use BinOp::*;
    use Type::*;
    match (op, lhs) {
        (Add | Sub | Mul | Div, Int) => Some(Int),
        (Add | Sub | Mul | Div, Float) => Some(Float),
        (Lt | Le | Gt | Ge | Eq | Ne, Int | Float | Char) => Some(Bool),
        (And | Or, Bool) => Some(Bool),
        _ => None,
    }
}

/// `(op, type) -> result type`, per the Glossary's unary signature table.
pub fn unop_signature(op: UnOp, operand: Type) -> Option<Type> {
    use Type::*;
    use UnOp::*;
    match (op, operand) {
        (Plus | Minus, Int) => Some(Int),
        (Plus | Minus, Float) => Some(Float),
        (Not, Bool) => Some(Bool),
        (Grow, Int) => Some(Int),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_is_numeric_only() {
        assert_eq!(binop_signature(BinOp::Add, Type::Int, Type::Int), Some(Type::Int));
        assert_eq!(binop_signature(BinOp::Add, Type::Bool, Type::Bool), None);
    }

    #[test]
    fn comparisons_return_bool() {
        assert_eq!(binop_signature(BinOp::Lt, Type::Char, Type::Char), Some(Type::Bool));
        assert_eq!(binop_signature(BinOp::Eq, Type::Float, Type::Float), Some(Type::Bool));
    }

    #[test]
    fn mismatched_operand_types_rejected() {
        assert_eq!(binop_signature(BinOp::Add, Type::Int, Type::Float), None);
    }

    #[test]
    fn logical_ops_require_bool() {
        assert_eq!(binop_signature(BinOp::And, Type::Bool, Type::Bool), Some(Type::Bool));
        assert_eq!(binop_signature(BinOp::And, Type::Int, Type::Int), None);
    }

    #[test]
    fn unary_signatures() {
        assert_eq!(unop_signature(UnOp::Minus, Type::Int), Some(Type::Int));
        assert_eq!(unop_signature(UnOp::Not, Type::Bool), Some(Type::Bool));
        assert_eq!(unop_signature(UnOp::Grow, Type::Int), Some(Type::Int));
        assert_eq!(unop_signature(UnOp::Grow, Type::Float), None);
    }
}
