//! Bytecode virtual machine (spec component F): a small stack machine that
//! executes a [`core_compiler::BytecodeProgram`] against the shared
//! variable table, `FOR`/`GOSUB` stacks, and DATA pool, suspending at
//! `INPUT` and handing control back to the direct-mode dispatcher at
//! `Fallback` exactly the way the session's single cooperative task
//! expects (spec.md §5, §9: "model INPUT as explicit state").
//!
//! The VM is synchronous and owns no I/O: `run` drives the instruction
//! loop until it halts, faults, suspends, or falls back, then returns
//! control. Suspension state lives in the `Vm`'s own `pc` field — the
//! caller writes the reply into the variable table and calls `run` again,
//! rather than threading a `resumePC` back in by hand.

use core_builtins::{call, BuiltinHost, RandomState};
use core_compiler::{BytecodeProgram, Op, PrintSepOp};
use core_control::{for_loop_done, ForFrame, ForStack, GosubStack};
use core_io::{format_print, PrintSep};
use core_program::{coerce_data_item, ProgramStore};
use core_lexer::{BinOp, UnOp};
use core_value::{BasicError, ErrorCode, Value, VariableTable};
use std::rc::Rc;

/// Operand stack depth bound (spec.md §4.F: a fixed-capacity stack whose
/// overflow is a structured fault, not an unbounded allocation).
pub const OPERAND_STACK_MAX: usize = 1024;

/// What one `Vm::run` call returned control to the caller for.
#[derive(Debug)]
pub enum VmOutcome {
    Halted,
    /// `INPUT` needs a reply: the caller prompts with `prompt` (if any),
    /// writes the answer into `var`, and calls `run` again.
    Suspended { prompt: Option<Rc<str>>, var: Rc<str> },
    /// The compiler couldn't turn this statement into real bytecode; the
    /// caller executes `statement` directly and calls `run` again.
    Fallback { statement: Rc<str>, line: u32 },
}

/// Host hooks the VM can't satisfy on its own. `core_builtins::BuiltinHost`
/// already covers `KEYSTATE`/`KEYPRESSED`/`EOF`/`COLLISION` for
/// `CALL_BUILTIN`; `INKEY$` is a nullary literal rather than a function
/// call, so it gets its own method here.
pub trait VmHost: BuiltinHost {
    fn inkey(&self) -> Rc<str>;
}

/// Receives formatted `PRINT` output as the VM flushes it. Kept separate
/// from `core_events::OutMessage` so this crate doesn't need to depend on
/// the wire format; the session glue supplies a sink that wraps it.
pub trait OutputSink {
    fn print(&mut self, text: &str, suppress_newline: bool);
}

/// Execution state for one running program: program counter, operand
/// stack, and the two bounded control stacks. Does not own the variable
/// table or program store — those are session-wide and outlive any one
/// `RUN`.
pub struct Vm {
    pc: usize,
    stack: Vec<Value>,
    for_stack: ForStack,
    gosub_stack: GosubStack,
    print_buf: Vec<(String, Option<PrintSep>)>,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        Self { pc: 0, stack: Vec::new(), for_stack: ForStack::new(), gosub_stack: GosubStack::new(), print_buf: Vec::new() }
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn set_pc(&mut self, pc: usize) {
        self.pc = pc;
    }

    /// Pushes the current `pc` as a return address and jumps to
    /// `target_pc`, the same bookkeeping `Op::Gosub` does internally.
    /// Exposed so a computed `GOSUB` (a non-literal target, which never
    /// compiles and always arrives as a `Fallback`) can still resolve
    /// its target line to an instruction index and resume the VM with a
    /// working `RETURN` address.
    pub fn gosub_to(&mut self, target_pc: usize) -> Result<(), BasicError> {
        let return_pc = self.pc;
        self.gosub_stack.push(return_pc)?;
        self.pc = target_pc;
        Ok(())
    }

    /// Clears every run-scoped piece of state for a fresh `RUN` (spec.md
    /// §5: `RUN`/`NEW` resets the operand stack and both control stacks
    /// along with the program counter).
    pub fn reset(&mut self) {
        self.pc = 0;
        self.stack.clear();
        self.for_stack.clear();
        self.gosub_stack.clear();
        self.print_buf.clear();
    }

    fn push(&mut self, v: Value) -> Result<(), BasicError> {
        if self.stack.len() >= OPERAND_STACK_MAX {
            return Err(BasicError::new(ErrorCode::StackOverflow, "operand stack overflow"));
        }
        self.stack.push(v);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, BasicError> {
        self.stack.pop().ok_or_else(|| BasicError::new(ErrorCode::StackUnderflow, "operand stack underflow"))
    }

    fn pop_subscript(&mut self) -> Result<usize, BasicError> {
        let v = self.pop()?;
        let n = v.as_num().map_err(|_| BasicError::new(ErrorCode::ArrayIndexNotNumeric, "array index is not numeric"))?;
        if n < 0.0 || n.fract() != 0.0 {
            return Err(BasicError::new(ErrorCode::ArrayIndexNotNumeric, "array index is not numeric"));
        }
        Ok(n as usize)
    }

    /// Pops `n` subscripts, restoring the left-to-right source order the
    /// compiler pushed them in (the rightmost index is on top of stack).
    fn pop_subscripts(&mut self, n: usize) -> Result<Vec<usize>, BasicError> {
        let mut idx = vec![0usize; n];
        for slot in idx.iter_mut().rev() {
            *slot = self.pop_subscript()?;
        }
        Ok(idx)
    }

    /// Runs until `HALT`, a fault, an `INPUT` suspension, or a `Fallback`
    /// hand-off. `cancel` is polled once per instruction (spec.md §5:
    /// "cancellation token polled at every main-loop iteration").
    #[allow(clippy::too_many_arguments)]
    pub fn run<H: VmHost>(
        &mut self,
        prog: &BytecodeProgram,
        vars: &mut VariableTable,
        store: &mut ProgramStore,
        rng: &mut RandomState,
        host: &H,
        sink: &mut dyn OutputSink,
        mut cancel: impl FnMut() -> bool,
    ) -> Result<VmOutcome, BasicError> {
        loop {
            if cancel() {
                return Err(BasicError::new(ErrorCode::ExecutionCancelled, "execution cancelled"));
            }
            let instr = prog
                .instrs
                .get(self.pc)
                .ok_or_else(|| BasicError::new(ErrorCode::LineNotFound, "program counter ran past the end of the program"))?;
            let line = instr.line;
            let op = instr.op.clone();
            self.pc += 1;

            match op {
                Op::PushNum(n) => self.push(Value::Num(n))?,
                Op::PushStr(s) => self.push(Value::Str(s))?,
                Op::PushPi => self.push(Value::Num(std::f64::consts::PI))?,
                Op::PushInkey => self.push(Value::Str(host.inkey()))?,
                Op::LoadVar(name) => {
                    let v = vars.get_scalar(&name).map_err(|e| e.decorate(line, "LOAD_VAR"))?;
                    self.push(v)?;
                }
                Op::LoadArray(name, n) => {
                    let idx = self.pop_subscripts(n)?;
                    let v = vars.get_array(&name, &idx).map_err(|e| e.decorate(line, "LOAD_ARRAY"))?;
                    self.push(v)?;
                }
                Op::StoreVar(name) => {
                    let v = self.pop()?;
                    vars.set_scalar(&name, v);
                }
                Op::StoreArray(name, n) => {
                    let v = self.pop()?;
                    let idx = self.pop_subscripts(n)?;
                    vars.set_array(&name, &idx, v).map_err(|e| e.decorate(line, "STORE_ARRAY"))?;
                }
                Op::Dim(name, n) => {
                    let dims = self.pop_subscripts(n)?;
                    vars.dim_array(&name, dims).map_err(|e| e.decorate(line, "DIM"))?;
                }
                Op::Bin(bop) => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    let result = apply_binop(bop, &lhs, &rhs).map_err(|e| e.decorate(line, "expression"))?;
                    self.push(result)?;
                }
                Op::Un(uop) => {
                    let v = self.pop()?;
                    let result = match uop {
                        UnOp::Neg => v.neg(),
                        UnOp::Not => v.not(),
                        UnOp::Plus => v.as_num().map(Value::Num),
                    }
                    .map_err(|e| e.decorate(line, "expression"))?;
                    self.push(result)?;
                }
                Op::CallBuiltin(name, argc) => {
                    let mut args = vec![Value::Num(0.0); argc];
                    for slot in args.iter_mut().rev() {
                        *slot = self.pop()?;
                    }
                    let result = call(&name, &args, rng, host).map_err(|e| e.decorate(line, &name))?;
                    self.push(result)?;
                }
                Op::Pop => {
                    self.pop()?;
                }
                Op::Jump(target) => self.pc = self.resolve_label(prog, target, line, "GOTO")?,
                Op::JumpIfFalse(target) => {
                    let v = self.pop()?;
                    if !v.truthy().map_err(|e| e.decorate(line, "IF"))? {
                        self.pc = self.resolve_label(prog, target, line, "IF")?;
                    }
                }
                Op::JumpAbs(target) => self.pc = target,
                Op::JumpIfFalseAbs(target) => {
                    let v = self.pop()?;
                    if !v.truthy().map_err(|e| e.decorate(line, "IF"))? {
                        self.pc = target;
                    }
                }
                Op::Gosub(target) => {
                    let return_pc = self.pc;
                    self.pc = self.resolve_label(prog, target, line, "GOSUB")?;
                    self.gosub_stack.push(return_pc).map_err(|e| e.decorate(line, "GOSUB"))?;
                }
                Op::Return => {
                    self.pc = self.gosub_stack.pop().map_err(|e| e.decorate(line, "RETURN"))?;
                }
                Op::ForInit(var) => {
                    let step = self.pop()?.as_num().map_err(|e| e.decorate(line, "FOR"))?;
                    let end = self.pop()?.as_num().map_err(|e| e.decorate(line, "FOR"))?;
                    self.for_stack
                        .push(ForFrame { var, end, step, body_pc: self.pc })
                        .map_err(|e| e.decorate(line, "FOR"))?;
                }
                Op::ForNext(name) => {
                    let idx = self.for_stack.resolve(name.as_deref()).map_err(|e| e.decorate(line, "NEXT"))?;
                    let frame = self.for_stack.frame(idx).clone();
                    let current = vars
                        .get_scalar(&frame.var)
                        .map_err(|e| e.decorate(line, "NEXT"))?
                        .as_num()
                        .map_err(|e| e.decorate(line, "NEXT"))?;
                    let next = current + frame.step;
                    vars.set_scalar(&frame.var, Value::Num(next));
                    if for_loop_done(next, frame.end, frame.step) {
                        self.for_stack.close_from(idx);
                    } else {
                        self.pc = frame.body_pc;
                    }
                }
                Op::PrintItem(sep) => {
                    let v = self.pop()?;
                    self.print_buf.push((v.display_string().to_string(), sep.map(convert_sep)));
                }
                Op::PrintFlush => {
                    let items = std::mem::take(&mut self.print_buf);
                    let (text, suppress_newline) = format_print(&items);
                    sink.print(&text, suppress_newline);
                }
                Op::Input { prompt, var } => return Ok(VmOutcome::Suspended { prompt, var }),
                Op::Read(name) => {
                    let raw = store.read_next_data().map_err(|e| e.decorate(line, "READ"))?;
                    let value = coerce_data_item(&raw, name.ends_with('$')).map_err(|e| e.decorate(line, "READ"))?;
                    vars.set_scalar(&name, value);
                }
                Op::ReadArray(name, n) => {
                    let idx = self.pop_subscripts(n)?;
                    let raw = store.read_next_data().map_err(|e| e.decorate(line, "READ"))?;
                    let is_string = vars.array_is_string(&name);
                    let value = coerce_data_item(&raw, is_string).map_err(|e| e.decorate(line, "READ"))?;
                    vars.set_array(&name, &idx, value).map_err(|e| e.decorate(line, "READ"))?;
                }
                Op::Restore => store.restore(),
                Op::Fallback(statement) => return Ok(VmOutcome::Fallback { statement, line }),
                Op::Halt => return Ok(VmOutcome::Halted),
            }
        }
    }

    fn resolve_label(&self, prog: &BytecodeProgram, target: u32, line: u32, command: &str) -> Result<usize, BasicError> {
        prog.label(target)
            .ok_or_else(|| BasicError::new(ErrorCode::LineNotFound, format!("line {target} not found")).decorate(line, command))
    }
}

fn apply_binop(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, BasicError> {
    match op {
        BinOp::Add => lhs.add(rhs),
        BinOp::Sub => lhs.sub(rhs),
        BinOp::Mul => lhs.mul(rhs),
        BinOp::Div => lhs.div(rhs),
        BinOp::Mod => lhs.modulo(rhs),
        BinOp::Pow => lhs.pow(rhs),
        BinOp::Eq => lhs.eq_basic(rhs),
        BinOp::Ne => lhs.ne_basic(rhs),
        BinOp::Lt => lhs.lt_basic(rhs),
        BinOp::Le => lhs.le_basic(rhs),
        BinOp::Gt => lhs.gt_basic(rhs),
        BinOp::Ge => lhs.ge_basic(rhs),
        BinOp::And => lhs.and(rhs),
        BinOp::Or => lhs.or(rhs),
    }
}

fn convert_sep(sep: PrintSepOp) -> PrintSep {
    match sep {
        PrintSepOp::Comma => PrintSep::Comma,
        PrintSepOp::Semicolon => PrintSep::Semicolon,
    }
}
