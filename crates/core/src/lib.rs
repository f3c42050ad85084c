//! GoxLang Core: the IR and value model shared by the compiler and the VM
//!
//! This crate is the contract between the two halves of the GoxLang
//! toolchain: the compiler lowers a checked AST into an [`ir::IrModule`],
//! and the virtual machine executes that module directly. Keeping the
//! data model in its own crate means neither side can drift from the
//! opcode set without the other noticing at compile time.
//!
//! # Modules
//!
//! - `ir`: low-level instruction set, functions, globals and modules
//! - `value`: the two-variant runtime value (`I`/`F`) that flows through
//!   the operand stack, locals and globals

pub mod ir;
pub mod value;

pub use ir::{Instr, IrFunction, IrGlobal, IrModule, LowType, Op};
pub use value::Value;
