use core_lexer::{BinOp, UnOp};
use std::collections::HashMap;
use std::rc::Rc;

/// Mirrors `core_io::PrintSep` without pulling in an I/O-command
/// dependency: the compiler only needs to remember which separator
/// followed a `PRINT` item, the VM converts it to the real type when it
/// flushes through `core_io::format_print`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintSepOp {
    Comma,
    Semicolon,
}

/// One bytecode instruction. Unlike the spec's generic
/// `{opcode, operand1, operand2, lineNum}` record, each variant carries
/// its own typed operands directly — the natural Rust shape for a closed
/// instruction set, and the dispatcher (`core-vm`) gets exhaustiveness
/// checking on `match` for free instead of runtime operand decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    PushNum(f64),
    PushStr(Rc<str>),
    PushPi,
    PushInkey,
    LoadVar(Rc<str>),
    LoadArray(Rc<str>, usize),
    StoreVar(Rc<str>),
    /// Pops the value first, then `nargs` index expressions (pushed
    /// left-to-right before the value), storing into `NAME(idx...)`.
    StoreArray(Rc<str>, usize),
    /// Pops `usize` dimension-size expressions (pushed left-to-right)
    /// and `DIM`s the named array.
    Dim(Rc<str>, usize),
    Bin(BinOp),
    Un(UnOp),
    CallBuiltin(Rc<str>, usize),
    Pop,
    /// Unconditional jump to a BASIC line number, resolved through the
    /// label table at VM runtime (spec.md §4.E: no backpatching needed).
    Jump(u32),
    /// Pops a value; jumps to the line if it is falsy.
    JumpIfFalse(u32),
    /// Structural jump to an instruction index within the same line
    /// (e.g. the `ELSE` branch), backpatched once the target is known.
    JumpAbs(usize),
    JumpIfFalseAbs(usize),
    Gosub(u32),
    Return,
    /// Expects `[end, step]` on the stack (end pushed first); records a
    /// `FOR` frame bound to the instruction right after this one.
    ForInit(Rc<str>),
    /// `None` for a bare `NEXT`; advances the named (or innermost) frame
    /// and jumps back to its body if the loop continues.
    ForNext(Option<Rc<str>>),
    /// Pops one value, formats it, and appends it to the VM's pending
    /// PRINT-item buffer with the given trailing separator.
    PrintItem(Option<PrintSepOp>),
    /// Flushes the pending PRINT-item buffer through
    /// `core_io::format_print` and clears it.
    PrintFlush,
    Input { prompt: Option<Rc<str>>, var: Rc<str> },
    Read(Rc<str>),
    /// Pops `usize` index expressions and `READ`s the next DATA item
    /// straight into that array cell.
    ReadArray(Rc<str>, usize),
    Restore,
    /// Hands the original source text of one statement back to the
    /// interpreter's direct-mode dispatcher (spec.md §4.E, §9: "fallback
    /// to interpreted").
    Fallback(Rc<str>),
    Halt,
}

#[derive(Debug, Clone)]
pub struct Instr {
    pub op: Op,
    pub line: u32,
}

/// Compiled whole-program output (spec.md §3 "Bytecode program"): a flat
/// instruction vector, a label table for `GOTO`/`GOSUB`/`IF...THEN
/// <line>` jumps, and the fingerprint it was compiled from so `RUN` can
/// skip recompilation when the program store hasn't changed.
#[derive(Debug, Clone)]
pub struct BytecodeProgram {
    pub instrs: Vec<Instr>,
    pub labels: HashMap<u32, usize>,
    pub fingerprint: u64,
}

impl BytecodeProgram {
    pub fn label(&self, line: u32) -> Option<usize> {
        self.labels.get(&line).copied()
    }
}
