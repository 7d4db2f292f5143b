//! Bytecode compiler (spec component D): turns each stored program line's
//! statements into a flat [`Op`] sequence. Only a fixed subset of commands
//! compiles to real bytecode (`LET`, `PRINT`, a single-variable `INPUT`,
//! `IF...THEN...ELSE`, `GOTO`, `GOSUB`, `RETURN`, `FOR`/`NEXT`, `END`/`STOP`,
//! `DIM`, `READ`, `RESTORE`, `REM`/`DATA` as no-ops); anything else compiles
//! to [`Op::Fallback`], handing the original statement text back to the
//! direct-mode dispatcher at run time.

mod expr;
mod op;

pub use op::{BytecodeProgram, Instr, Op, PrintSepOp};

use core_cache::InternPool;
use core_lexer::{tokenize, Expr, Parser, Token, TokenKind};
use core_program::{split_statements, ProgramStore};
use core_value::BasicError;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Compiles every stored program line into one flat instruction vector plus
/// a `line -> first instruction` label table, tagged with the program
/// store's fingerprint so a re-`RUN` can skip recompiling an unchanged
/// program. `intern` hands out the shared `Rc<str>` for every variable/array
/// name and `Fallback` statement text the compiler emits (spec.md §3:
/// "strings are immutable once interned") — the same name appearing in a
/// hundred `LET`/`PRINT` statements across a program becomes one allocation
/// instead of a hundred.
pub fn compile(store: &ProgramStore, intern: &mut InternPool) -> Result<BytecodeProgram, BasicError> {
    debug!(target: "compiler", lines = store.len(), "compile_program");
    let mut instrs = Vec::new();
    let mut labels = HashMap::new();
    for (line, src) in store.lines() {
        labels.insert(line, instrs.len());
        for stmt in split_statements(src) {
            compile_statement(&stmt, line, &mut instrs, intern)?;
        }
    }
    instrs.push(Instr { op: Op::Halt, line: 0 });
    Ok(BytecodeProgram { instrs, labels, fingerprint: store.fingerprint() })
}

fn push(instrs: &mut Vec<Instr>, op: Op, line: u32) {
    instrs.push(Instr { op, line });
}

fn emit(expr: &Expr, line: u32, instrs: &mut Vec<Instr>) {
    let mut ops = Vec::new();
    expr::emit_expr(expr, &mut ops);
    instrs.extend(ops.into_iter().map(|op| Instr { op, line }));
}

/// Compiles one colon-separated statement, falling back to
/// [`Op::Fallback`] when its shape doesn't match the compiled subset.
fn compile_statement(stmt: &str, line: u32, instrs: &mut Vec<Instr>, intern: &mut InternPool) -> Result<(), BasicError> {
    let stmt = stmt.trim();
    if stmt.is_empty() {
        return Ok(());
    }
    let kw = leading_keyword(stmt);
    let rest = stmt[kw.len()..].trim_start();
    let handled = match kw {
        "REM" | "DATA" => true,
        "LET" => compile_assignment(rest, line, instrs, intern)?,
        "PRINT" | "?" | "PR." => {
            compile_print(rest, line, instrs, intern)?;
            true
        }
        "INPUT" => try_compile_input(rest, line, instrs, intern)?,
        "IF" => compile_if(rest, line, instrs, intern)?,
        "GOTO" => try_compile_goto(rest, line, instrs)?,
        "GOSUB" => try_compile_gosub(rest, line, instrs)?,
        "RETURN" => {
            push(instrs, Op::Return, line);
            true
        }
        "FOR" => try_compile_for(rest, line, instrs, intern)?,
        "NEXT" => try_compile_next(rest, line, instrs, intern)?,
        "END" | "STOP" => {
            push(instrs, Op::Halt, line);
            true
        }
        "DIM" => try_compile_dim(rest, line, instrs, intern)?,
        "READ" => try_compile_read(rest, line, instrs, intern)?,
        "RESTORE" => {
            if rest.is_empty() {
                push(instrs, Op::Restore, line);
                true
            } else {
                false
            }
        }
        _ => is_implicit_let(stmt) && compile_assignment(stmt, line, instrs, intern)?,
    };
    if !handled {
        trace!(target: "compiler", line, stmt, "fallback");
        push(instrs, Op::Fallback(intern.intern(stmt)), line);
    }
    Ok(())
}

/// The first word of a statement, used to dispatch on its command. `?` and
/// `PR.` are recognized `PRINT` aliases; every other pseudo-keyword
/// (`TO`, `STEP`, `THEN`, `ELSE`) is an ordinary identifier handled by the
/// statement parsers below, never by this dispatch.
fn leading_keyword(stmt: &str) -> &str {
    let trimmed = stmt.trim_start();
    if trimmed.starts_with('?') {
        return &trimmed[..1];
    }
    if trimmed.len() >= 3 && trimmed[..3].eq_ignore_ascii_case("PR.") {
        return &trimmed[..3];
    }
    let end = trimmed.find(|c: char| c.is_whitespace() || c == ':').unwrap_or(trimmed.len());
    &trimmed[..end]
}

fn is_simple_ident(s: &str) -> bool {
    let s = s.trim();
    if s.is_empty() {
        return false;
    }
    let core = s.strip_suffix('$').unwrap_or(s);
    let mut chars = core.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric())
}

/// Splits `text` on `,` at paren depth 0, outside quoted strings — used for
/// `DIM`/`READ` target lists and `PRINT`/array argument lists.
fn split_top_level_commas(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut in_string = false;
    for (i, ch) in text.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => depth -= 1,
            ',' if !in_string && depth == 0 => {
                out.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&text[start..]);
    out
}

/// Splits a `NAME` or `NAME(args)` target into its name and, when present,
/// the unparsed text between the parens.
fn split_name_and_args(text: &str) -> Option<(&str, Option<&str>)> {
    let text = text.trim();
    match text.find('(') {
        Some(paren) if text.ends_with(')') => {
            let name = text[..paren].trim();
            if !is_simple_ident(name) {
                return None;
            }
            Some((name, Some(&text[paren + 1..text.len() - 1])))
        }
        Some(_) => None,
        None => {
            if !is_simple_ident(text) {
                return None;
            }
            Some((text, None))
        }
    }
}

fn find_top_level_eq(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut in_string = false;
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'"' => in_string = !in_string,
            b'(' if !in_string => depth += 1,
            b')' if !in_string => depth -= 1,
            b'=' if !in_string && depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

/// Finds an ASCII keyword (`THEN`/`ELSE`) at the top level of `s`: outside
/// quoted strings and not embedded in a longer identifier.
fn find_top_level_keyword(s: &str, kw: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut in_string = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                in_string = !in_string;
                i += 1;
            }
            _ if !in_string && s[i..].starts_with(kw) => {
                let before_ok = i == 0 || !bytes[i - 1].is_ascii_alphanumeric();
                let after = i + kw.len();
                let after_ok = after >= bytes.len() || !bytes[after].is_ascii_alphanumeric();
                if before_ok && after_ok {
                    return Some(i);
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    None
}

/// A bare assignment with no leading `LET` (spec.md §4.D: "`LET` is
/// optional") is recognized only once every explicit statement keyword has
/// already failed to match, and only when the text has a top-level `=`.
fn is_implicit_let(stmt: &str) -> bool {
    find_top_level_eq(stmt).is_some()
}

fn compile_assignment(body: &str, line: u32, instrs: &mut Vec<Instr>, intern: &mut InternPool) -> Result<bool, BasicError> {
    let eq = match find_top_level_eq(body) {
        Some(i) => i,
        None => return Ok(false),
    };
    let lhs = body[..eq].trim();
    let rhs = body[eq + 1..].trim();
    if lhs.is_empty() || rhs.is_empty() {
        return Ok(false);
    }
    let (name, args) = match split_name_and_args(lhs) {
        Some(v) => v,
        None => return Ok(false),
    };
    let rhs_expr = core_lexer::parse(rhs)?;
    match args {
        Some(args_text) => {
            let mut idx_exprs = Vec::new();
            for part in split_top_level_commas(args_text) {
                idx_exprs.push(core_lexer::parse(part.trim())?);
            }
            if idx_exprs.is_empty() {
                return Ok(false);
            }
            for e in &idx_exprs {
                emit(e, line, instrs);
            }
            emit(&rhs_expr, line, instrs);
            push(instrs, Op::StoreArray(intern.intern(name), idx_exprs.len()), line);
        }
        None => {
            emit(&rhs_expr, line, instrs);
            push(instrs, Op::StoreVar(intern.intern(name)), line);
        }
    }
    Ok(true)
}

fn split_print_items(rest: &str) -> Vec<(String, Option<PrintSepOp>)> {
    let rest = rest.trim();
    if rest.is_empty() {
        return Vec::new();
    }
    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut in_string = false;
    for ch in rest.chars() {
        match ch {
            '"' => {
                in_string = !in_string;
                current.push(ch);
            }
            '(' if !in_string => {
                depth += 1;
                current.push(ch);
            }
            ')' if !in_string => {
                depth -= 1;
                current.push(ch);
            }
            ',' if !in_string && depth == 0 => {
                items.push((current.trim().to_string(), Some(PrintSepOp::Comma)));
                current.clear();
            }
            ';' if !in_string && depth == 0 => {
                items.push((current.trim().to_string(), Some(PrintSepOp::Semicolon)));
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() || items.is_empty() {
        items.push((current.trim().to_string(), None));
    }
    items
}

fn compile_print(rest: &str, line: u32, instrs: &mut Vec<Instr>, intern: &mut InternPool) -> Result<(), BasicError> {
    let items = split_print_items(rest);
    if items.is_empty() {
        push(instrs, Op::PrintFlush, line);
        return Ok(());
    }
    for (text, sep) in &items {
        if text.is_empty() {
            push(instrs, Op::PushStr(intern.intern("")), line);
        } else {
            let expr = core_lexer::parse(text)?;
            emit(&expr, line, instrs);
        }
        push(instrs, Op::PrintItem(*sep), line);
    }
    push(instrs, Op::PrintFlush, line);
    Ok(())
}

/// Only `INPUT [prompt ;|,] VAR` compiles: a single scalar target, with an
/// optional literal string prompt. Multi-variable and array-target `INPUT`
/// fall back to the interpreter.
fn try_compile_input(rest: &str, line: u32, instrs: &mut Vec<Instr>, intern: &mut InternPool) -> Result<bool, BasicError> {
    let rest = rest.trim();
    let (prompt, tail) = if let Some(after_quote) = rest.strip_prefix('"') {
        let end = match after_quote.find('"') {
            Some(e) => e,
            None => return Ok(false),
        };
        let prompt_text = &after_quote[..end];
        let after = after_quote[end + 1..].trim_start();
        let after = after.strip_prefix(';').or_else(|| after.strip_prefix(','));
        match after {
            Some(t) => (Some(prompt_text), t.trim_start()),
            None => return Ok(false),
        }
    } else {
        (None, rest)
    };
    if !is_simple_ident(tail) {
        return Ok(false);
    }
    push(
        instrs,
        Op::Input { prompt: prompt.map(|p| intern.intern(p)), var: intern.intern(tail) },
        line,
    );
    Ok(true)
}

fn try_compile_goto(rest: &str, line: u32, instrs: &mut Vec<Instr>) -> Result<bool, BasicError> {
    match rest.trim().parse::<u32>() {
        Ok(n) => {
            push(instrs, Op::Jump(n), line);
            Ok(true)
        }
        Err(_) => Ok(false),
    }
}

fn try_compile_gosub(rest: &str, line: u32, instrs: &mut Vec<Instr>) -> Result<bool, BasicError> {
    match rest.trim().parse::<u32>() {
        Ok(n) => {
            push(instrs, Op::Gosub(n), line);
            Ok(true)
        }
        Err(_) => Ok(false),
    }
}

fn tok_is_ident(tokens: &[Token], pos: usize, word: &str) -> bool {
    matches!(tokens.get(pos).map(|t| &t.kind), Some(TokenKind::Ident(w)) if w.eq_ignore_ascii_case(word))
}

fn tok_is_eof(tokens: &[Token], pos: usize) -> bool {
    matches!(tokens.get(pos).map(|t| &t.kind), Some(TokenKind::Eof) | None)
}

/// `FOR var = start TO end [STEP step]`. `TO`/`STEP` are ordinary
/// uppercased identifiers, not dedicated token kinds, so they're matched
/// by text after each sub-expression is parsed with [`Parser::parse_prefix`].
fn try_compile_for(rest: &str, line: u32, instrs: &mut Vec<Instr>, intern: &mut InternPool) -> Result<bool, BasicError> {
    let tokens = tokenize(rest)?;
    let mut pos = 0;
    let var = match tokens.get(pos).map(|t| &t.kind) {
        Some(TokenKind::Ident(name)) => intern.intern(name),
        _ => return Ok(false),
    };
    pos += 1;
    if !matches!(tokens.get(pos).map(|t| &t.kind), Some(TokenKind::Eq)) {
        return Ok(false);
    }
    pos += 1;

    let (start_expr, consumed) = Parser::parse_prefix(&tokens[pos..])?;
    pos += consumed;
    if !tok_is_ident(&tokens, pos, "TO") {
        return Ok(false);
    }
    pos += 1;

    let (end_expr, consumed) = Parser::parse_prefix(&tokens[pos..])?;
    pos += consumed;

    let step_expr = if tok_is_ident(&tokens, pos, "STEP") {
        pos += 1;
        let (se, consumed) = Parser::parse_prefix(&tokens[pos..])?;
        pos += consumed;
        se
    } else {
        Expr::Num(1.0)
    };
    if !tok_is_eof(&tokens, pos) {
        return Ok(false);
    }

    emit(&start_expr, line, instrs);
    push(instrs, Op::StoreVar(var.clone()), line);
    emit(&end_expr, line, instrs);
    emit(&step_expr, line, instrs);
    push(instrs, Op::ForInit(var), line);
    Ok(true)
}

/// Bare `NEXT`, `NEXT var`, or `NEXT var1, var2, ...` (the last expands to
/// one closing `NEXT` per name, in order).
fn try_compile_next(rest: &str, line: u32, instrs: &mut Vec<Instr>, intern: &mut InternPool) -> Result<bool, BasicError> {
    let rest = rest.trim();
    if rest.is_empty() {
        push(instrs, Op::ForNext(None), line);
        return Ok(true);
    }
    let mut names = Vec::new();
    for part in rest.split(',') {
        let part = part.trim();
        if !is_simple_ident(part) {
            return Ok(false);
        }
        names.push(part);
    }
    for name in names {
        push(instrs, Op::ForNext(Some(intern.intern(name))), line);
    }
    Ok(true)
}

fn try_compile_dim(rest: &str, line: u32, instrs: &mut Vec<Instr>, intern: &mut InternPool) -> Result<bool, BasicError> {
    let mut decls = Vec::new();
    for decl in split_top_level_commas(rest) {
        let (name, args_text) = match split_name_and_args(decl) {
            Some((n, Some(a))) => (n, a),
            _ => return Ok(false),
        };
        let mut idx_exprs = Vec::new();
        for part in split_top_level_commas(args_text) {
            idx_exprs.push(core_lexer::parse(part.trim())?);
        }
        if idx_exprs.is_empty() {
            return Ok(false);
        }
        decls.push((name, idx_exprs));
    }
    if decls.is_empty() {
        return Ok(false);
    }
    for (name, idx_exprs) in &decls {
        for e in idx_exprs {
            emit(e, line, instrs);
        }
        push(instrs, Op::Dim(intern.intern(name), idx_exprs.len()), line);
    }
    Ok(true)
}

fn try_compile_read(rest: &str, line: u32, instrs: &mut Vec<Instr>, intern: &mut InternPool) -> Result<bool, BasicError> {
    let mut targets = Vec::new();
    for target in split_top_level_commas(rest) {
        let target = target.trim();
        if target.is_empty() {
            return Ok(false);
        }
        let (name, args_text) = match split_name_and_args(target) {
            Some(v) => v,
            None => return Ok(false),
        };
        let idx_exprs = match args_text {
            Some(args_text) => {
                let mut v = Vec::new();
                for part in split_top_level_commas(args_text) {
                    v.push(core_lexer::parse(part.trim())?);
                }
                if v.is_empty() {
                    return Ok(false);
                }
                Some(v)
            }
            None => None,
        };
        targets.push((name, idx_exprs));
    }
    if targets.is_empty() {
        return Ok(false);
    }
    for (name, idx_exprs) in &targets {
        match idx_exprs {
            Some(exprs) => {
                for e in exprs {
                    emit(e, line, instrs);
                }
                push(instrs, Op::ReadArray(intern.intern(name), exprs.len()), line);
            }
            None => push(instrs, Op::Read(intern.intern(name)), line),
        }
    }
    Ok(true)
}

/// `IF cond THEN <branch> [ELSE <branch>]`. Each branch is either a bare
/// line number (an implicit `GOTO`) or a colon-separated statement list,
/// compiled with a `JumpIfFalseAbs` backpatched once the `ELSE` branch (or
/// the fallthrough point, if there isn't one) is known.
fn compile_if(rest: &str, line: u32, instrs: &mut Vec<Instr>, intern: &mut InternPool) -> Result<bool, BasicError> {
    let then_pos = match find_top_level_keyword(rest, "THEN") {
        Some(p) => p,
        None => return Ok(false),
    };
    let cond_text = rest[..then_pos].trim();
    if cond_text.is_empty() {
        return Ok(false);
    }
    let after_then = rest[then_pos + 4..].trim_start();
    if after_then.is_empty() {
        return Ok(false);
    }

    let (then_text, else_text) = match find_top_level_keyword(after_then, "ELSE") {
        Some(else_pos) => (after_then[..else_pos].trim(), Some(after_then[else_pos + 4..].trim_start())),
        None => (after_then, None),
    };
    if then_text.is_empty() || else_text == Some("") {
        return Ok(false);
    }

    let cond_expr = core_lexer::parse(cond_text)?;
    emit(&cond_expr, line, instrs);
    let jf_idx = instrs.len();
    push(instrs, Op::JumpIfFalseAbs(0), line);

    compile_branch(then_text, line, instrs, intern)?;

    match else_text {
        Some(else_text) => {
            let jmp_idx = instrs.len();
            push(instrs, Op::JumpAbs(0), line);
            let else_start = instrs.len();
            instrs[jf_idx].op = Op::JumpIfFalseAbs(else_start);
            compile_branch(else_text, line, instrs, intern)?;
            let after_else = instrs.len();
            instrs[jmp_idx].op = Op::JumpAbs(after_else);
        }
        None => {
            let after_then = instrs.len();
            instrs[jf_idx].op = Op::JumpIfFalseAbs(after_then);
        }
    }
    Ok(true)
}

fn compile_branch(text: &str, line: u32, instrs: &mut Vec<Instr>, intern: &mut InternPool) -> Result<(), BasicError> {
    if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
        let n: u32 = text.parse().expect("all-digit text always parses as u32");
        push(instrs, Op::Jump(n), line);
        return Ok(());
    }
    for stmt in split_statements(text) {
        compile_statement(&stmt, line, instrs, intern)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_src(lines: &[(u32, &str)]) -> BytecodeProgram {
        let mut store = ProgramStore::new();
        for (n, src) in lines {
            store.edit_line(*n, src);
        }
        compile(&store, &mut InternPool::default()).unwrap()
    }

    #[test]
    fn compiles_plain_let_and_print() {
        let prog = compile_src(&[(10, "LET A = 1"), (20, "PRINT A")]);
        assert!(matches!(prog.instrs[0].op, Op::PushNum(n) if n == 1.0));
        assert!(matches!(&prog.instrs[1].op, Op::StoreVar(name) if &**name == "A"));
        assert!(matches!(&prog.instrs[2].op, Op::LoadVar(name) if &**name == "A"));
        assert!(matches!(prog.instrs[3].op, Op::PrintItem(None)));
        assert!(matches!(prog.instrs[4].op, Op::PrintFlush));
    }

    #[test]
    fn implicit_let_without_let_keyword_is_compiled() {
        let prog = compile_src(&[(10, "A = 1 + 2")]);
        assert!(matches!(&prog.instrs.last().unwrap().op, Op::StoreVar(name) if &**name == "A"));
    }

    #[test]
    fn compiles_for_next_into_init_and_next_ops() {
        let prog = compile_src(&[(10, "FOR I = 1 TO 10 STEP 2"), (20, "PRINT I"), (30, "NEXT I")]);
        let for_init = prog.instrs.iter().find(|i| matches!(i.op, Op::ForInit(_))).unwrap();
        assert!(matches!(&for_init.op, Op::ForInit(name) if &**name == "I"));
        let for_next = prog.instrs.iter().find(|i| matches!(i.op, Op::ForNext(_))).unwrap();
        assert!(matches!(&for_next.op, Op::ForNext(Some(name)) if &**name == "I"));
    }

    #[test]
    fn compiles_goto_and_label_table() {
        let prog = compile_src(&[(10, "GOTO 30"), (20, "PRINT 1"), (30, "PRINT 2")]);
        assert!(matches!(prog.instrs[0].op, Op::Jump(30)));
        assert_eq!(prog.label(30), Some(prog.instrs.iter().position(|i| i.line == 30).unwrap()));
    }

    #[test]
    fn compiles_if_then_else_with_backpatched_jumps() {
        let prog = compile_src(&[(10, "IF X = 1 THEN PRINT 1 ELSE PRINT 2")]);
        let jf_idx = prog.instrs.iter().position(|i| matches!(i.op, Op::JumpIfFalseAbs(_))).unwrap();
        let jf_target = match prog.instrs[jf_idx].op {
            Op::JumpIfFalseAbs(t) => t,
            _ => unreachable!(),
        };
        let jmp_idx = prog.instrs.iter().position(|i| matches!(i.op, Op::JumpAbs(_))).unwrap();
        let jmp_target = match prog.instrs[jmp_idx].op {
            Op::JumpAbs(t) => t,
            _ => unreachable!(),
        };
        assert_eq!(jf_target, jmp_idx + 1);
        assert_eq!(jmp_target, prog.instrs.len() - 1);
    }

    #[test]
    fn if_then_with_bare_line_number_compiles_as_jump() {
        let prog = compile_src(&[(10, "IF X = 1 THEN 100")]);
        assert!(prog.instrs.iter().any(|i| matches!(i.op, Op::Jump(100))));
    }

    #[test]
    fn fallback_for_unsupported_command() {
        let prog = compile_src(&[(10, "CLS")]);
        assert!(matches!(&prog.instrs[0].op, Op::Fallback(text) if &**text == "CLS"));
    }

    #[test]
    fn compiles_dim_and_array_assignment() {
        let prog = compile_src(&[(10, "DIM A(10)"), (20, "A(1) = 5")]);
        assert!(prog.instrs.iter().any(|i| matches!(&i.op, Op::Dim(name, 1) if &**name == "A")));
        assert!(prog.instrs.iter().any(|i| matches!(&i.op, Op::StoreArray(name, 1) if &**name == "A")));
    }

    #[test]
    fn compiles_read_scalar_and_array_targets() {
        let prog = compile_src(&[(10, "READ A, B(I)")]);
        assert!(prog.instrs.iter().any(|i| matches!(&i.op, Op::Read(name) if &**name == "A")));
        assert!(prog.instrs.iter().any(|i| matches!(&i.op, Op::ReadArray(name, 1) if &**name == "B")));
    }

    #[test]
    fn fingerprint_changes_when_program_store_changes() {
        let mut store = ProgramStore::new();
        store.edit_line(10, "PRINT 1");
        let mut intern = InternPool::default();
        let a = compile(&store, &mut intern).unwrap();
        assert_eq!(a.fingerprint, store.fingerprint());
        store.edit_line(10, "PRINT 2");
        let b = compile(&store, &mut intern).unwrap();
        assert_ne!(a.fingerprint, b.fingerprint);
        assert_eq!(b.fingerprint, store.fingerprint());
    }

    #[test]
    fn print_trailing_semicolon_suppresses_implied_newline_marker() {
        let prog = compile_src(&[(10, "PRINT \"HI\";")]);
        assert!(prog.instrs.iter().any(|i| matches!(i.op, Op::PrintItem(Some(PrintSepOp::Semicolon)))));
    }

    #[test]
    fn multi_statement_line_compiles_each_in_order() {
        let prog = compile_src(&[(10, "A = 1 : B = 2")]);
        let store_ops: Vec<_> = prog
            .instrs
            .iter()
            .filter_map(|i| match &i.op {
                Op::StoreVar(name) => Some(name.to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(store_ops, vec!["A", "B"]);
    }
}
