//! Runtime value representation.
//!
//! GoxLang's checker narrows every source type (`int`, `bool`, `char`,
//! `float`) down to one of two IR-level cells before codegen ever runs
//! (see [`crate::ir::LowType`]). `Value` is the VM-side counterpart:
//! an integer cell or a float cell, nothing else. Bools and chars ride
//! inside the integer variant as 0/1 and a code point respectively.

/// A tagged operand-stack / local / global slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    I(i64),
    F(f64),
}

impl Value {
    pub fn low_type(&self) -> crate::ir::LowType {
        match self {
            Value::I(_) => crate::ir::LowType::I,
            Value::F(_) => crate::ir::LowType::F,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I(v) => Some(*v),
            Value::F(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F(v) => Some(*v),
            Value::I(_) => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::I(v) => write!(f, "{v}"),
            Value::F(v) => write!(f, "{v}"),
        }
    }
}
