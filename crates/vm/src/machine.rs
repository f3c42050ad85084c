//! The stack-machine interpreter.
//!
//! Control flow markers (`IF/ELSE/ENDIF`, `LOOP/CBREAK/CONTINUE/ENDLOOP`)
//! are resolved once per function into a jump table before execution
//! starts, rather than scanned at runtime on every pass through a loop.
//! This turns every control-flow marker into an O(1) `pc` assignment and
//! means the interpreter never needs a nested sub-interpreter to skip a
//! region it isn't executing.

use crate::error::VmError;
use goxlang_core::ir::{IrModule, LowType, Op};
use goxlang_core::value::Value;
use std::collections::HashMap;
use std::io::Write;

/// Maps the index of a control-flow marker to where execution should
/// jump when that marker's condition sends it there. `If`/`CBreak` are
/// conditional (checked against the popped operand); `Else`/`Continue`/
/// `EndLoop` are unconditional once reached.
type JumpTable = HashMap<usize, usize>;

fn build_jump_table(code: &[goxlang_core::ir::Instr]) -> Result<JumpTable, VmError> {
    let mut jumps = JumpTable::new();
    let mut if_stack: Vec<(usize, Option<usize>)> = Vec::new();
    struct LoopFrame {
        loop_idx: usize,
        breaks: Vec<usize>,
        continues: Vec<usize>,
    }
    let mut loop_stack: Vec<LoopFrame> = Vec::new();

    for (i, instr) in code.iter().enumerate() {
        match &instr.op {
            Op::If => if_stack.push((i, None)),
            Op::Else => {
                let (_, else_idx) = if_stack.last_mut().ok_or_else(|| {
                    VmError::MalformedControlFlow { line: instr.line, detail: "ELSE without IF".into() }
                })?;
                *else_idx = Some(i);
            }
            Op::EndIf => {
                let (if_idx, else_idx) = if_stack.pop().ok_or_else(|| VmError::MalformedControlFlow {
                    line: instr.line,
                    detail: "ENDIF without IF".into(),
                })?;
                match else_idx {
                    Some(else_idx) => {
                        jumps.insert(if_idx, else_idx + 1);
                        jumps.insert(else_idx, i + 1);
                    }
                    None => {
                        jumps.insert(if_idx, i + 1);
                    }
                }
            }
            Op::Loop => loop_stack.push(LoopFrame { loop_idx: i, breaks: Vec::new(), continues: Vec::new() }),
            Op::CBreak => {
                let frame = loop_stack.last_mut().ok_or_else(|| VmError::MalformedControlFlow {
                    line: instr.line,
                    detail: "CBREAK outside LOOP".into(),
                })?;
                frame.breaks.push(i);
            }
            Op::Continue => {
                let frame = loop_stack.last_mut().ok_or_else(|| VmError::MalformedControlFlow {
                    line: instr.line,
                    detail: "CONTINUE outside LOOP".into(),
                })?;
                frame.continues.push(i);
            }
            Op::EndLoop => {
                let frame = loop_stack.pop().ok_or_else(|| VmError::MalformedControlFlow {
                    line: instr.line,
                    detail: "ENDLOOP without LOOP".into(),
                })?;
                jumps.insert(i, frame.loop_idx + 1);
                for b in frame.breaks {
                    jumps.insert(b, i + 1);
                }
                for c in frame.continues {
                    jumps.insert(c, frame.loop_idx + 1);
                }
            }
            _ => {}
        }
    }
    if let Some((idx, _)) = if_stack.first() {
        return Err(VmError::MalformedControlFlow { line: code[*idx].line, detail: "IF without ENDIF".into() });
    }
    if let Some(frame) = loop_stack.first() {
        return Err(VmError::MalformedControlFlow {
            line: code[frame.loop_idx].line,
            detail: "LOOP without ENDLOOP".into(),
        });
    }
    Ok(jumps)
}

fn zero_value(low_type: LowType) -> Value {
    match low_type {
        LowType::I => Value::I(0),
        LowType::F => Value::F(0.0),
    }
}

fn pop(stack: &mut Vec<Value>, line: usize, op: &str) -> Result<Value, VmError> {
    stack.pop().ok_or_else(|| VmError::StackUnderflow { line, op: op.to_string() })
}

fn pop_i(stack: &mut Vec<Value>, line: usize, op: &str) -> Result<i64, VmError> {
    match pop(stack, line, op)? {
        Value::I(n) => Ok(n),
        Value::F(n) => Err(VmError::TypeMismatch {
            line,
            op: op.to_string(),
            detail: format!("expected an integer cell, found float {n}"),
        }),
    }
}

fn pop_f(stack: &mut Vec<Value>, line: usize, op: &str) -> Result<f64, VmError> {
    match pop(stack, line, op)? {
        Value::F(n) => Ok(n),
        Value::I(n) => Err(VmError::TypeMismatch {
            line,
            op: op.to_string(),
            detail: format!("expected a float cell, found integer {n}"),
        }),
    }
}

fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) { q - 1 } else { q }
}

/// Owns the VM's mutable state: linear memory, globals and the IR
/// module's precomputed jump tables. Output goes through a generic
/// writer so tests can capture it without touching real stdout.
pub struct Vm<'a, W: Write> {
    module: &'a IrModule,
    jump_tables: HashMap<String, JumpTable>,
    memory: Vec<u64>,
    globals: HashMap<String, Value>,
    out: W,
}

impl<'a, W: Write> Vm<'a, W> {
    pub fn new(module: &'a IrModule, memory_cells: usize, out: W) -> Result<Self, VmError> {
        let mut jump_tables = HashMap::new();
        for (name, func) in &module.functions {
            jump_tables.insert(name.clone(), build_jump_table(&func.code)?);
        }
        let globals = module
            .globals
            .iter()
            .map(|(name, g)| (name.clone(), zero_value(g.low_type)))
            .collect();
        Ok(Vm { module, jump_tables, memory: vec![0u64; memory_cells], globals, out })
    }

    /// Runs the module's entry point (the synthetic `main`) and returns
    /// whatever value it leaves on the stack via `RET`.
    pub fn run(&mut self) -> Result<Value, VmError> {
        let mut stack = Vec::new();
        self.call("main", Vec::new(), &mut stack, 0)
    }

    fn call(&mut self, name: &str, args: Vec<Value>, stack: &mut Vec<Value>, call_line: usize) -> Result<Value, VmError> {
        let module = self.module;
        let func = module
            .functions
            .get(name)
            .ok_or_else(|| VmError::UnknownFunction { line: call_line, name: name.to_string() })?;
        if func.imported {
            return Err(VmError::ImportedFunctionHasNoBody { line: call_line, name: name.to_string() });
        }
        if func.parm_names.len() != args.len() {
            return Err(VmError::ArgCountMismatch {
                line: call_line,
                name: name.to_string(),
                expected: func.parm_names.len(),
                got: args.len(),
            });
        }

        let mut locals: HashMap<String, Value> = func
            .locals
            .iter()
            .map(|(n, lt)| (n.clone(), zero_value(*lt)))
            .collect();
        for (pname, val) in func.parm_names.iter().zip(args) {
            locals.insert(pname.clone(), val);
        }

        let jumps = self.jump_tables.get(name).expect("jump table built for every function").clone();
        let mut pc = 0usize;

        loop {
            let instr = func.code.get(pc).ok_or_else(|| VmError::MalformedControlFlow {
                line: func.code.last().map(|i| i.line).unwrap_or(0),
                detail: format!("function '{name}' fell off the end without RET"),
            })?;
            let line = instr.line;

            match &instr.op {
                Op::ConstI(n) => {
                    stack.push(Value::I(*n));
                    pc += 1;
                }
                Op::ConstF(n) => {
                    stack.push(Value::F(*n));
                    pc += 1;
                }

                Op::AddI => bin_i(stack, line, "ADDI", |a, b| Ok(a.wrapping_add(b)))
                    .map(|()| pc += 1)?,
                Op::SubI => bin_i(stack, line, "SUBI", |a, b| Ok(a.wrapping_sub(b))).map(|()| pc += 1)?,
                Op::MulI => bin_i(stack, line, "MULI", |a, b| Ok(a.wrapping_mul(b))).map(|()| pc += 1)?,
                Op::DivI => bin_i(stack, line, "DIVI", |a, b| {
                    if b == 0 { Err(VmError::DivideByZero { line }) } else { Ok(floor_div(a, b)) }
                })
                .map(|()| pc += 1)?,
                Op::LtI => cmp_i(stack, line, "LTI", |a, b| a < b).map(|()| pc += 1)?,
                Op::LeI => cmp_i(stack, line, "LEI", |a, b| a <= b).map(|()| pc += 1)?,
                Op::GtI => cmp_i(stack, line, "GTI", |a, b| a > b).map(|()| pc += 1)?,
                Op::GeI => cmp_i(stack, line, "GEI", |a, b| a >= b).map(|()| pc += 1)?,
                Op::EqI => cmp_i(stack, line, "EQI", |a, b| a == b).map(|()| pc += 1)?,
                Op::NeI => cmp_i(stack, line, "NEI", |a, b| a != b).map(|()| pc += 1)?,
                Op::ItoF => {
                    let n = pop_i(stack, line, "ITOF")?;
                    stack.push(Value::F(n as f64));
                    pc += 1;
                }

                Op::AddF => bin_f(stack, line, "ADDF", |a, b| a + b).map(|()| pc += 1)?,
                Op::SubF => bin_f(stack, line, "SUBF", |a, b| a - b).map(|()| pc += 1)?,
                Op::MulF => bin_f(stack, line, "MULF", |a, b| a * b).map(|()| pc += 1)?,
                Op::DivF => bin_f(stack, line, "DIVF", |a, b| a / b).map(|()| pc += 1)?,
                Op::LtF => cmp_f(stack, line, "LTF", |a, b| a < b).map(|()| pc += 1)?,
                Op::LeF => cmp_f(stack, line, "LEF", |a, b| a <= b).map(|()| pc += 1)?,
                Op::GtF => cmp_f(stack, line, "GTF", |a, b| a > b).map(|()| pc += 1)?,
                Op::GeF => cmp_f(stack, line, "GEF", |a, b| a >= b).map(|()| pc += 1)?,
                Op::EqF => cmp_f(stack, line, "EQF", |a, b| a == b).map(|()| pc += 1)?,
                Op::NeF => cmp_f(stack, line, "NEF", |a, b| a != b).map(|()| pc += 1)?,
                Op::FtoI => {
                    let n = pop_f(stack, line, "FTOI")?;
                    stack.push(Value::I(n as i64));
                    pc += 1;
                }

                Op::PrintI => {
                    let n = pop_i(stack, line, "PRINTI")?;
                    write!(self.out, "{n}").map_err(|e| io_err(line, "PRINTI", e))?;
                    pc += 1;
                }
                Op::PrintF => {
                    let n = pop_f(stack, line, "PRINTF")?;
                    write!(self.out, "{n}").map_err(|e| io_err(line, "PRINTF", e))?;
                    pc += 1;
                }
                Op::PrintBool => {
                    let n = pop_i(stack, line, "PRINTBOOL")?;
                    write!(self.out, "{}", if n != 0 { "true" } else { "false" })
                        .map_err(|e| io_err(line, "PRINTBOOL", e))?;
                    pc += 1;
                }
                Op::PrintChar => {
                    let n = pop_i(stack, line, "PRINTCHAR")?;
                    let c = u32::try_from(n).ok().and_then(char::from_u32).ok_or_else(|| VmError::TypeMismatch {
                        line,
                        op: "PRINTCHAR".to_string(),
                        detail: format!("{n} is not a valid code point"),
                    })?;
                    write!(self.out, "{c}").map_err(|e| io_err(line, "PRINTCHAR", e))?;
                    pc += 1;
                }

                Op::PeekI => {
                    let addr = pop_i(stack, line, "PEEKI")?;
                    let cell = self.read_cell(addr, line)?;
                    stack.push(Value::I(cell as i64));
                    pc += 1;
                }
                Op::PeekB => {
                    let addr = pop_i(stack, line, "PEEKB")?;
                    let cell = self.read_cell(addr, line)?;
                    stack.push(Value::I(cell as i64));
                    pc += 1;
                }
                Op::PeekF => {
                    let addr = pop_i(stack, line, "PEEKF")?;
                    let cell = self.read_cell(addr, line)?;
                    stack.push(Value::F(f64::from_bits(cell)));
                    pc += 1;
                }
                Op::PokeI => {
                    let addr = pop_i(stack, line, "POKEI")?;
                    let v = pop_i(stack, line, "POKEI")?;
                    self.write_cell(addr, v as u64, line)?;
                    pc += 1;
                }
                Op::PokeB => {
                    let addr = pop_i(stack, line, "POKEB")?;
                    let v = pop_i(stack, line, "POKEB")?;
                    self.write_cell(addr, v as u64, line)?;
                    pc += 1;
                }
                Op::PokeF => {
                    let addr = pop_i(stack, line, "POKEF")?;
                    let v = pop_f(stack, line, "POKEF")?;
                    self.write_cell(addr, v.to_bits(), line)?;
                    pc += 1;
                }

                Op::LocalGet(n) => {
                    let v = *locals.get(n).ok_or_else(|| VmError::UnknownLocal { line, name: n.clone() })?;
                    stack.push(v);
                    pc += 1;
                }
                Op::LocalSet(n) => {
                    let v = pop(stack, line, "LOCAL_SET")?;
                    locals.insert(n.clone(), v);
                    pc += 1;
                }
                Op::GlobalGet(n) => {
                    let v = *self
                        .globals
                        .get(n)
                        .ok_or_else(|| VmError::UnknownGlobal { line, name: n.clone() })?;
                    stack.push(v);
                    pc += 1;
                }
                Op::GlobalSet(n) => {
                    let v = pop(stack, line, "GLOBAL_SET")?;
                    if !self.globals.contains_key(n) {
                        return Err(VmError::UnknownGlobal { line, name: n.clone() });
                    }
                    self.globals.insert(n.clone(), v);
                    pc += 1;
                }

                Op::If => {
                    let c = pop_i(stack, line, "IF")?;
                    pc = if c != 0 { pc + 1 } else { *jumps.get(&pc).expect("jump table covers IF") };
                }
                Op::Else => {
                    pc = *jumps.get(&pc).expect("jump table covers ELSE");
                }
                Op::EndIf => pc += 1,
                Op::Loop => pc += 1,
                Op::CBreak => {
                    let c = pop_i(stack, line, "CBREAK")?;
                    pc = if c != 0 { *jumps.get(&pc).expect("jump table covers CBREAK") } else { pc + 1 };
                }
                Op::Continue => {
                    pc = *jumps.get(&pc).expect("jump table covers CONTINUE");
                }
                Op::EndLoop => {
                    pc = *jumps.get(&pc).expect("jump table covers ENDLOOP");
                }

                Op::Call(callee) => {
                    let callee_func = module
                        .functions
                        .get(callee)
                        .ok_or_else(|| VmError::UnknownFunction { line, name: callee.clone() })?;
                    let argc = callee_func.parm_names.len();
                    let mut call_args = Vec::with_capacity(argc);
                    for _ in 0..argc {
                        call_args.push(pop(stack, line, "CALL")?);
                    }
                    call_args.reverse();
                    let ret = self.call(callee, call_args, stack, line)?;
                    stack.push(ret);
                    pc += 1;
                }
                Op::Ret => {
                    return pop(stack, line, "RET");
                }

                Op::Grow => {
                    let n = pop_i(stack, line, "GROW")?;
                    if n < 0 {
                        return Err(VmError::TypeMismatch {
                            line,
                            op: "GROW".to_string(),
                            detail: format!("cannot grow memory by a negative amount ({n})"),
                        });
                    }
                    let old_len = self.memory.len();
                    self.memory.resize(old_len + n as usize, 0);
                    stack.push(Value::I(old_len as i64));
                    pc += 1;
                }
            }
        }
    }

    fn read_cell(&self, addr: i64, line: usize) -> Result<u64, VmError> {
        usize::try_from(addr)
            .ok()
            .and_then(|a| self.memory.get(a).copied())
            .ok_or(VmError::AddressOutOfRange { line, addr, len: self.memory.len() })
    }

    fn write_cell(&mut self, addr: i64, value: u64, line: usize) -> Result<(), VmError> {
        let len = self.memory.len();
        let cell = usize::try_from(addr)
            .ok()
            .and_then(|a| self.memory.get_mut(a))
            .ok_or(VmError::AddressOutOfRange { line, addr, len })?;
        *cell = value;
        Ok(())
    }
}

fn io_err(line: usize, op: &str, e: std::io::Error) -> VmError {
    VmError::TypeMismatch { line, op: op.to_string(), detail: format!("write failed: {e}") }
}

fn bin_i(
    stack: &mut Vec<Value>,
    line: usize,
    op: &str,
    f: impl FnOnce(i64, i64) -> Result<i64, VmError>,
) -> Result<(), VmError> {
    let b = pop_i(stack, line, op)?;
    let a = pop_i(stack, line, op)?;
    stack.push(Value::I(f(a, b)?));
    Ok(())
}

fn cmp_i(stack: &mut Vec<Value>, line: usize, op: &str, f: impl FnOnce(i64, i64) -> bool) -> Result<(), VmError> {
    let b = pop_i(stack, line, op)?;
    let a = pop_i(stack, line, op)?;
    stack.push(Value::I(if f(a, b) { 1 } else { 0 }));
    Ok(())
}

fn bin_f(stack: &mut Vec<Value>, line: usize, op: &str, f: impl FnOnce(f64, f64) -> f64) -> Result<(), VmError> {
    let b = pop_f(stack, line, op)?;
    let a = pop_f(stack, line, op)?;
    stack.push(Value::F(f(a, b)));
    Ok(())
}

fn cmp_f(stack: &mut Vec<Value>, line: usize, op: &str, f: impl FnOnce(f64, f64) -> bool) -> Result<(), VmError> {
    let b = pop_f(stack, line, op)?;
    let a = pop_f(stack, line, op)?;
    stack.push(Value::I(if f(a, b) { 1 } else { 0 }));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use goxlang_core::ir::{IrFunction, IrGlobal};

    fn run_module(module: &IrModule) -> (Value, String) {
        let mut out = Vec::new();
        let ret = {
            let mut vm = Vm::new(module, 1024, &mut out).expect("jump tables build");
            vm.run().expect("run ok")
        };
        (ret, String::from_utf8(out).unwrap())
    }

    #[test]
    fn arithmetic_and_print() {
        let mut main = IrFunction::new("main", vec![], vec![], LowType::I, false);
        for (op, line) in [
            (Op::ConstI(2), 1),
            (Op::ConstI(3), 1),
            (Op::ConstI(4), 1),
            (Op::MulI, 1),
            (Op::AddI, 1),
            (Op::ConstI(5), 1),
            (Op::SubI, 1),
            (Op::PrintI, 1),
            (Op::ConstI(0), 1),
            (Op::Ret, 1),
        ] {
            main.push(op, line);
        }
        let mut module = IrModule::new();
        module.add_function(main);
        let (_, out) = run_module(&module);
        assert_eq!(out, "9");
    }

    #[test]
    fn while_loop_counts_down() {
        // i = 3; while i > 0 { print i; i = i - 1; }
        let mut main = IrFunction::new("main", vec![], vec![], LowType::I, false);
        main.new_local("i", LowType::I);
        main.push(Op::ConstI(3), 1);
        main.push(Op::LocalSet("i".into()), 1);
        main.push(Op::Loop, 2);
        main.push(Op::ConstI(1), 2);
        main.push(Op::LocalGet("i".into()), 2);
        main.push(Op::ConstI(0), 2);
        main.push(Op::GtI, 2);
        main.push(Op::SubI, 2);
        main.push(Op::CBreak, 2);
        main.push(Op::LocalGet("i".into()), 3);
        main.push(Op::PrintI, 3);
        main.push(Op::LocalGet("i".into()), 3);
        main.push(Op::ConstI(1), 3);
        main.push(Op::SubI, 3);
        main.push(Op::LocalSet("i".into()), 3);
        main.push(Op::EndLoop, 4);
        main.push(Op::ConstI(0), 5);
        main.push(Op::Ret, 5);
        let mut module = IrModule::new();
        module.add_function(main);
        let (_, out) = run_module(&module);
        assert_eq!(out, "321");
    }

    #[test]
    fn function_call_round_trips_argument() {
        let mut f = IrFunction::new("f", vec!["n".into()], vec![LowType::I], LowType::I, false);
        f.new_local("n", LowType::I);
        f.push(Op::LocalGet("n".into()), 1);
        f.push(Op::Ret, 1);

        let mut main = IrFunction::new("main", vec![], vec![], LowType::I, false);
        main.push(Op::ConstI(41), 2);
        main.push(Op::Call("f".into()), 2);
        main.push(Op::PrintI, 2);
        main.push(Op::ConstI(0), 2);
        main.push(Op::Ret, 2);

        let mut module = IrModule::new();
        module.add_function(f);
        module.add_function(main);
        let (_, out) = run_module(&module);
        assert_eq!(out, "41");
    }

    #[test]
    fn memory_round_trips_through_peek_and_poke() {
        let mut main = IrFunction::new("main", vec![], vec![], LowType::I, false);
        main.push(Op::ConstI(42), 1);
        main.push(Op::ConstI(5), 1);
        main.push(Op::PokeI, 1);
        main.push(Op::ConstI(5), 2);
        main.push(Op::PeekI, 2);
        main.push(Op::PrintI, 2);
        main.push(Op::ConstI(0), 2);
        main.push(Op::Ret, 2);
        let mut module = IrModule::new();
        module.add_function(main);
        let (_, out) = run_module(&module);
        assert_eq!(out, "42");
    }

    #[test]
    fn out_of_range_address_is_a_runtime_error() {
        let mut main = IrFunction::new("main", vec![], vec![], LowType::I, false);
        main.push(Op::ConstI(999_999), 1);
        main.push(Op::PeekI, 1);
        main.push(Op::Ret, 1);
        let mut module = IrModule::new();
        module.add_function(main);
        let mut out = Vec::new();
        let mut vm = Vm::new(&module, 16, &mut out).unwrap();
        assert!(matches!(vm.run(), Err(VmError::AddressOutOfRange { .. })));
    }

    #[test]
    fn integer_division_floors_toward_negative_infinity() {
        let mut main = IrFunction::new("main", vec![], vec![], LowType::I, false);
        main.push(Op::ConstI(-7), 1);
        main.push(Op::ConstI(2), 1);
        main.push(Op::DivI, 1);
        main.push(Op::PrintI, 1);
        main.push(Op::ConstI(0), 1);
        main.push(Op::Ret, 1);
        let mut module = IrModule::new();
        module.add_function(main);
        let (_, out) = run_module(&module);
        assert_eq!(out, "-4");
    }

    #[test]
    fn global_is_seeded_from_module_and_mutated() {
        let mut module = IrModule::new();
        module.add_global(IrGlobal { name: "x".into(), low_type: LowType::I });
        let mut main = IrFunction::new("main", vec![], vec![], LowType::I, false);
        main.push(Op::GlobalGet("x".into()), 1);
        main.push(Op::PrintI, 1);
        main.push(Op::ConstI(0), 1);
        main.push(Op::Ret, 1);
        module.add_function(main);
        let (_, out) = run_module(&module);
        assert_eq!(out, "0");
    }

    #[test]
    fn malformed_jump_table_is_rejected_before_execution() {
        let mut main = IrFunction::new("main", vec![], vec![], LowType::I, false);
        main.push(Op::If, 1);
        main.push(Op::Ret, 1);
        let mut module = IrModule::new();
        module.add_function(main);
        let mut out = Vec::new();
        assert!(Vm::new(&module, 16, &mut out).is_err());
    }

    #[test]
    fn calling_an_imported_function_is_a_runtime_error() {
        let imported = IrFunction::new("puts", vec!["s".into()], vec![LowType::I], LowType::I, true);
        let mut main = IrFunction::new("main", vec![], vec![], LowType::I, false);
        main.push(Op::ConstI(1), 1);
        main.push(Op::Call("puts".into()), 1);
        main.push(Op::Ret, 1);
        let mut module = IrModule::new();
        module.add_function(imported);
        module.add_function(main);
        let mut out = Vec::new();
        let mut vm = Vm::new(&module, 16, &mut out).unwrap();
        assert!(matches!(vm.run(), Err(VmError::ImportedFunctionHasNoBody { .. })));
    }
}
