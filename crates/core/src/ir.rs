//! The GoxLang intermediate representation.
//!
//! The IR is a flat, typed instruction list per function. Control flow is
//! expressed with structural markers (`If`/`Else`/`EndIf`, `Loop`/`EndLoop`)
//! rather than absolute jump offsets — the VM scans for the matching marker
//! at runtime (see `goxlang-vm`). This mirrors the source compiler's design
//! and keeps the IR generator a straightforward post-order AST walk: it
//! never has to compute jump targets itself.

use std::collections::HashMap;
use std::fmt;

/// The two cell types every source type lowers to.
///
/// `int`, `bool` and `char` all lower to `I` (an integer cell); `float`
/// lowers to `F`. The distinction between int/bool/char is erased once
/// codegen has picked the right opcode for each operation — the VM that
/// executes the IR only ever sees `I` and `F`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LowType {
    I,
    F,
}

impl fmt::Display for LowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LowType::I => write!(f, "I"),
            LowType::F => write!(f, "F"),
        }
    }
}

/// One IR opcode, with its operand (if any) inlined into the variant.
///
/// Every arithmetic/compare/convert/peek/poke/print op is split by low
/// type (`AddI`/`AddF`, `PeekI`/`PeekF`/`PeekB`, ...) rather than carrying
/// a runtime type tag, so a malformed instruction stream is a type error
/// at the Rust level, not a runtime surprise in the VM.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    ConstI(i64),
    ConstF(f64),

    AddI,
    SubI,
    MulI,
    DivI,
    LtI,
    LeI,
    GtI,
    GeI,
    EqI,
    NeI,
    PrintI,
    PeekI,
    PokeI,
    ItoF,

    AddF,
    SubF,
    MulF,
    DivF,
    LtF,
    LeF,
    GtF,
    GeF,
    EqF,
    NeF,
    PrintF,
    PeekF,
    PokeF,
    FtoI,

    PrintBool,
    PrintChar,
    PeekB,
    PokeB,

    LocalGet(String),
    LocalSet(String),
    GlobalGet(String),
    GlobalSet(String),

    If,
    Else,
    EndIf,
    Loop,
    CBreak,
    Continue,
    EndLoop,

    Call(String),
    Ret,

    Grow,
}

/// A single IR instruction, tagged with the source line it was lowered
/// from so VM errors can report `Line N` like every earlier stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    pub op: Op,
    pub line: usize,
}

impl Instr {
    pub fn new(op: Op, line: usize) -> Self {
        Instr { op, line }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.op)
    }
}

/// A module-level global: a name and the cell type it was declared with.
/// The VM seeds it to `(low_type, None)` at load time; the initializer,
/// if any, is emitted as ordinary `main` instructions followed by a
/// `GlobalSet`.
#[derive(Debug, Clone, PartialEq)]
pub struct IrGlobal {
    pub name: String,
    pub low_type: LowType,
}

/// A lowered function: its calling convention plus its instruction list.
#[derive(Debug, Clone)]
pub struct IrFunction {
    pub name: String,
    pub parm_names: Vec<String>,
    pub parm_types: Vec<LowType>,
    pub return_type: LowType,
    pub imported: bool,
    pub locals: HashMap<String, LowType>,
    pub code: Vec<Instr>,
}

impl IrFunction {
    pub fn new(
        name: impl Into<String>,
        parm_names: Vec<String>,
        parm_types: Vec<LowType>,
        return_type: LowType,
        imported: bool,
    ) -> Self {
        IrFunction {
            name: name.into(),
            parm_names,
            parm_types,
            return_type,
            imported,
            locals: HashMap::new(),
            code: Vec::new(),
        }
    }

    pub fn new_local(&mut self, name: impl Into<String>, low_type: LowType) {
        self.locals.insert(name.into(), low_type);
    }

    pub fn push(&mut self, op: Op, line: usize) {
        self.code.push(Instr::new(op, line));
    }

    fn dump(&self, out: &mut String) {
        out.push_str(&format!(
            "FUNCTION::: {} {:?} {:?} -> {}\n",
            self.name, self.parm_names, self.parm_types, self.return_type
        ));
        if !self.locals.is_empty() {
            out.push_str(&format!("  locals: {:?}\n", self.locals));
        }
        for instr in &self.code {
            out.push_str(&format!("  {instr}\n"));
        }
    }
}

/// The full lowered program: every function plus every global, keyed by
/// name. Top-level statements live in the synthetic `"main"` function;
/// a user function literally named `main` is renamed to `_actual_main`
/// (see `goxc::codegen`).
#[derive(Debug, Clone, Default)]
pub struct IrModule {
    pub functions: HashMap<String, IrFunction>,
    pub globals: HashMap<String, IrGlobal>,
}

impl IrModule {
    pub fn new() -> Self {
        IrModule::default()
    }

    pub fn add_function(&mut self, func: IrFunction) {
        self.functions.insert(func.name.clone(), func);
    }

    pub fn add_global(&mut self, global: IrGlobal) {
        self.globals.insert(global.name.clone(), global);
    }

    /// Render the module the way a debugger would print it; used by the
    /// CLI's `--dump-ir` flag. Not a serialization format.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        out.push_str("MODULE:::\n");
        let mut names: Vec<&String> = self.globals.keys().collect();
        names.sort();
        for name in names {
            let g = &self.globals[name];
            out.push_str(&format!("GLOBAL::: {}: {}\n", g.name, g.low_type));
        }
        let mut fnames: Vec<&String> = self.functions.keys().collect();
        fnames.sort();
        for name in fnames {
            self.functions[name].dump(&mut out);
        }
        out
    }
}
