//! GoxLang VM: a stack-machine interpreter for `goxlang_core::ir::IrModule`.
//!
//! # Example
//!
//! ```
//! use goxlang_core::ir::{IrFunction, IrModule, LowType, Op};
//! use goxlang_vm::Vm;
//!
//! let mut main = IrFunction::new("main", vec![], vec![], LowType::I, false);
//! main.push(Op::ConstI(7), 1);
//! main.push(Op::PrintI, 1);
//! main.push(Op::ConstI(0), 1);
//! main.push(Op::Ret, 1);
//! let mut module = IrModule::new();
//! module.add_function(main);
//!
//! let mut out = Vec::new();
//! let mut vm = Vm::new(&module, 1024, &mut out).unwrap();
//! vm.run().unwrap();
//! assert_eq!(out, b"7");
//! ```

pub mod error;
pub mod machine;

pub use error::VmError;
pub use machine::Vm;
