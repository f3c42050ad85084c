//! Runtime errors.
//!
//! Every variant carries the line number of the IR instruction that
//! raised it, so diagnostics stay consistent with every earlier stage's
//! `"Line N: <category>: <message>"` form.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum VmError {
    StackUnderflow { line: usize, op: String },
    TypeMismatch { line: usize, op: String, detail: String },
    UnknownLocal { line: usize, name: String },
    UnknownGlobal { line: usize, name: String },
    UnknownFunction { line: usize, name: String },
    ArgCountMismatch { line: usize, name: String, expected: usize, got: usize },
    AddressOutOfRange { line: usize, addr: i64, len: usize },
    DivideByZero { line: usize },
    MalformedControlFlow { line: usize, detail: String },
    ImportedFunctionHasNoBody { line: usize, name: String },
}

impl VmError {
    fn line(&self) -> usize {
        match self {
            VmError::StackUnderflow { line, .. }
            | VmError::TypeMismatch { line, .. }
            | VmError::UnknownLocal { line, .. }
            | VmError::UnknownGlobal { line, .. }
            | VmError::UnknownFunction { line, .. }
            | VmError::ArgCountMismatch { line, .. }
            | VmError::AddressOutOfRange { line, .. }
            | VmError::DivideByZero { line }
            | VmError::MalformedControlFlow { line, .. }
            | VmError::ImportedFunctionHasNoBody { line, .. } => *line,
        }
    }
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let detail = match self {
            VmError::StackUnderflow { op, .. } => format!("operand stack underflow at {op}"),
            VmError::TypeMismatch { op, detail, .. } => format!("type mismatch at {op}: {detail}"),
            VmError::UnknownLocal { name, .. } => format!("no such local '{name}'"),
            VmError::UnknownGlobal { name, .. } => format!("no such global '{name}'"),
            VmError::UnknownFunction { name, .. } => format!("no such function '{name}'"),
            VmError::ArgCountMismatch { name, expected, got, .. } => {
                format!("'{name}' expects {expected} argument(s), got {got}")
            }
            VmError::AddressOutOfRange { addr, len, .. } => {
                format!("address {addr} out of range (memory has {len} cells)")
            }
            VmError::DivideByZero { .. } => "integer division by zero".to_string(),
            VmError::MalformedControlFlow { detail, .. } => format!("malformed control flow: {detail}"),
            VmError::ImportedFunctionHasNoBody { name, .. } => {
                format!("cannot call imported function '{name}': no host binding")
            }
        };
        write!(f, "Line {}: RuntimeError: {}", self.line(), detail)
    }
}

impl std::error::Error for VmError {}
