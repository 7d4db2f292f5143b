//! Statement dispatcher: every BASIC command gets exactly one handler
//! here, reached identically whether it was typed directly or handed
//! back by the VM as an `Op::Fallback`. The compiler's compiled subset
//! (`LET`/`PRINT`/`INPUT`/`IF`/literal `GOTO`/`GOSUB`/`FOR`/`NEXT`/`DIM`/
//! `READ`/`RESTORE`/`END`) is re-implemented here too, since a direct-mode
//! line never goes through the compiler at all — this module is the only
//! place a statement's semantics are written down once.
//!
//! `GOTO`/`GOSUB`/`RETURN`/`FOR`/`NEXT` are the one family that can't be
//! executed meaningfully from here: they need a `pc` into a running
//! program. Literal-target forms of them always compile successfully, so
//! the VM never hands them back; direct-mode typing one, or a malformed
//! `FOR`/`NEXT` that fails to compile, is reported as a usage error
//! instead of silently doing nothing.

use crate::util::{
    find_top_level_eq, find_top_level_keyword, leading_keyword, split_name_and_args, split_print_items, split_top_level_commas,
    strip_quotes,
};
use crate::{eval, Interpreter, KeyInput, LiveHost, MessageSink, Pending};
use core_events::{GraphicsCommand, OutMessage, ParticleCommand, SoundCommand, SpriteCommand};
use core_io::{resolve_color, update_vector_command, FileMode, FileSystem};
use core_program::{coerce_data_item, split_statements};
use core_value::{BasicError, ErrorCode, Value};
use std::rc::Rc;

/// What a statement asked the caller to do next.
pub(crate) enum StmtOutcome {
    Continue,
    End,
    Quit,
    Suspend(Pending),
    /// `RUN` (bare) or `RUN "filename"` (loads first).
    RunProgram(Option<String>),
    NewProgram,
    ClearVars,
}

pub(crate) fn exec_statement(
    interp: &mut Interpreter,
    stmt: &str,
    line: Option<u32>,
    key: &dyn KeyInput,
    fs: &dyn FileSystem,
    sink: &mut dyn MessageSink,
) -> Result<StmtOutcome, BasicError> {
    let stmt = stmt.trim();
    if stmt.is_empty() {
        return Ok(StmtOutcome::Continue);
    }
    let kw = leading_keyword(stmt);
    let rest = stmt[kw.len()..].trim_start();
    let kw_upper = kw.to_ascii_uppercase();

    let outcome = match kw_upper.as_str() {
        "REM" | "DATA" => StmtOutcome::Continue,
        "LET" => {
            exec_assignment(interp, rest, key)?;
            StmtOutcome::Continue
        }
        "PRINT" | "?" | "PR." => {
            exec_print(interp, rest, key, sink)?;
            StmtOutcome::Continue
        }
        "INPUT" => exec_input(interp, rest, key)?,
        "LINE" => {
            exec_line_keyword(interp, rest, key, sink)?;
            StmtOutcome::Continue
        }
        "IF" => exec_if(interp, rest, line, key, fs, sink)?,
        "GOTO" | "GOSUB" | "RETURN" | "FOR" | "NEXT" => return Err(control_flow_usage(&kw_upper)),
        "END" | "STOP" => StmtOutcome::End,
        "CLS" => {
            sink.send(OutMessage::ClearScreen);
            StmtOutcome::Continue
        }
        "LIST" => {
            exec_list(interp, rest, sink)?;
            StmtOutcome::Continue
        }
        "RUN" => exec_run(rest)?,
        "NEW" => StmtOutcome::NewProgram,
        "CLEAR" => StmtOutcome::ClearVars,
        "LOAD" => {
            let name = strip_quotes(rest).ok_or_else(|| usage_err_with_hint("LOAD", "LOAD \"filename\""))?;
            interp.load_program(fs, name)?;
            StmtOutcome::Continue
        }
        "SAVE" => {
            let name = strip_quotes(rest).ok_or_else(|| usage_err_with_hint("SAVE", "SAVE \"filename\""))?;
            interp.save_program(fs, name)?;
            StmtOutcome::Continue
        }
        "DIR" => StmtOutcome::Continue,
        "VARS" => {
            exec_vars(interp, sink);
            StmtOutcome::Continue
        }
        "EDITOR" => {
            sink.send(OutMessage::Editor(serde_json::json!({ "action": "open" })));
            StmtOutcome::Continue
        }
        "DIM" => {
            exec_dim(interp, rest, key)?;
            StmtOutcome::Continue
        }
        "READ" => {
            exec_read(interp, rest, key)?;
            StmtOutcome::Continue
        }
        "RESTORE" => {
            interp.program.restore();
            StmtOutcome::Continue
        }
        "OPEN" => {
            exec_open(interp, rest, fs, key)?;
            StmtOutcome::Continue
        }
        "CLOSE" => {
            exec_close(interp, rest, fs)?;
            StmtOutcome::Continue
        }
        "BEEP" => {
            sink.send(OutMessage::Sound(SoundCommand::Beep));
            StmtOutcome::Continue
        }
        "SOUND" => {
            let a = eval_args(interp, rest, key)?;
            require_n("SOUND", &a, 2)?;
            sink.send(OutMessage::Sound(SoundCommand::Tone { freq: num(&a[0])?, duration_ms: num(&a[1])? }));
            StmtOutcome::Continue
        }
        "NOISE" => {
            let a = eval_args(interp, rest, key)?;
            require_n("NOISE", &a, 3)?;
            sink.send(OutMessage::Sound(SoundCommand::Noise {
                pitch: num(&a[0])?,
                amplitude: num(&a[1])?,
                duration_ms: num(&a[2])?,
            }));
            StmtOutcome::Continue
        }
        "MUSIC" => {
            let v = eval_expr_text(interp, rest, key)?;
            sink.send(OutMessage::Sound(SoundCommand::Music { file: text(&v)? }));
            StmtOutcome::Continue
        }
        "SAY" => {
            let v = eval_expr_text(interp, rest, key)?;
            sink.send(OutMessage::Say { text: text(&v)?, blocking: false });
            StmtOutcome::Continue
        }
        "SPEAK" => {
            let v = eval_expr_text(interp, rest, key)?;
            sink.send(OutMessage::Say { text: text(&v)?, blocking: true });
            StmtOutcome::Suspend(Pending::Say)
        }
        "PLOT" => {
            let args = eval_args(interp, rest, key)?;
            let (coords, color) = split_color(args, 2)?;
            sink.send(OutMessage::Graphics(GraphicsCommand::Plot { x: num(&coords[0])?, y: num(&coords[1])?, color }));
            StmtOutcome::Continue
        }
        "RECT" => {
            let args = eval_args(interp, rest, key)?;
            let (coords, color) = split_color(args, 4)?;
            sink.send(OutMessage::Graphics(GraphicsCommand::Rect {
                x: num(&coords[0])?,
                y: num(&coords[1])?,
                w: num(&coords[2])?,
                h: num(&coords[3])?,
                color,
            }));
            StmtOutcome::Continue
        }
        "CIRCLE" => {
            let args = eval_args(interp, rest, key)?;
            let (coords, color) = split_color(args, 3)?;
            sink.send(OutMessage::Graphics(GraphicsCommand::Circle { x: num(&coords[0])?, y: num(&coords[1])?, r: num(&coords[2])?, color }));
            StmtOutcome::Continue
        }
        "LOCATE" => {
            let a = eval_args(interp, rest, key)?;
            require_n("LOCATE", &a, 2)?;
            sink.send(OutMessage::Locate { x: non_negative_u32(num(&a[0])?)?, y: non_negative_u32(num(&a[1])?)? });
            StmtOutcome::Continue
        }
        "INVERSE" => {
            let on = match rest.trim() {
                "ON" => true,
                "OFF" => false,
                _ => return Err(usage_err_with_hint("INVERSE", "INVERSE ON|OFF")),
            };
            interp.inverse = on;
            sink.send(OutMessage::InverseToggle(on));
            StmtOutcome::Continue
        }
        "SPRITE" => {
            exec_sprite(interp, rest, key, sink)?;
            StmtOutcome::Continue
        }
        "VECTOR" | "PYRAMID" | "CYLINDER" | "VECFLOOR" | "VECNODE" => {
            let msg = exec_vector_like(interp, &kw_upper, rest, key)?;
            sink.send(msg);
            StmtOutcome::Continue
        }
        "PARTICLE" => {
            let msg = exec_particle(interp, rest, key)?;
            sink.send(msg);
            StmtOutcome::Continue
        }
        "PLAYSFX" => {
            let msg = exec_playsfx(interp, rest, key)?;
            sink.send(msg);
            StmtOutcome::Continue
        }
        "WAIT" => {
            let v = eval_expr_text(interp, rest, key)?;
            let ms = num(&v)?;
            if ms < 0.0 {
                return Err(illegal_arg("WAIT requires a non-negative duration"));
            }
            StmtOutcome::Suspend(Pending::Wait(ms))
        }
        "RANDOMIZE" => {
            exec_randomize(interp, rest, key)?;
            StmtOutcome::Continue
        }
        "HELP" => {
            sink.send(OutMessage::Text { text: "HELP is not available in this session.".to_string(), no_newline: false, inverse: false, session_id: None });
            StmtOutcome::Continue
        }
        "EXIT" | "QUIT" => StmtOutcome::Quit,
        _ => {
            if is_implicit_let(stmt) {
                exec_assignment(interp, stmt, key)?;
                StmtOutcome::Continue
            } else {
                return Err(BasicError::new(ErrorCode::UnexpectedToken, format!("unknown statement {kw}")).with_command(kw));
            }
        }
    };
    Ok(outcome)
}

/// Replies to a pending `INPUT`, type-coercing each comma-separated field
/// against its target; a count mismatch or a non-numeric reply for a
/// numeric target is classic BASIC's `?REDO FROM START`.
pub(crate) fn apply_input_reply(vars: &mut core_value::VariableTable, targets: &[eval::LValue], reply: &str) -> Result<(), BasicError> {
    let parts: Vec<&str> = if targets.len() > 1 { reply.split(',').map(str::trim).collect() } else { vec![reply.trim()] };
    if parts.len() != targets.len() {
        return Err(BasicError::new(ErrorCode::RedoFromStart, "?REDO FROM START"));
    }
    for (target, part) in targets.iter().zip(parts.iter()) {
        let is_string = target_is_string(target);
        let value = if is_string {
            Value::Str(Rc::from(*part))
        } else {
            match part.parse::<f64>() {
                Ok(n) => Value::Num(n),
                Err(_) => return Err(BasicError::new(ErrorCode::RedoFromStart, "?REDO FROM START")),
            }
        };
        eval::store_lvalue(vars, target, value)?;
    }
    Ok(())
}

fn target_is_string(target: &eval::LValue) -> bool {
    match target {
        eval::LValue::Scalar(name) => name.ends_with('$'),
        eval::LValue::Array(name, _) => name.ends_with('$'),
    }
}

// ---- expression plumbing -------------------------------------------------

fn eval_expr_text(interp: &mut Interpreter, text: &str, key: &dyn KeyInput) -> Result<Value, BasicError> {
    let expr = interp.parser.parse_cached(text)?;
    let Interpreter { vars, rng, files, sprites, .. } = interp;
    let host = LiveHost { key, files, sprites };
    eval::eval_expr(&expr, vars, rng, &host)
}

fn eval_lvalue_text(interp: &mut Interpreter, text: &str, key: &dyn KeyInput) -> Result<eval::LValue, BasicError> {
    let expr = interp.parser.parse_cached(text)?;
    let Interpreter { vars, rng, files, sprites, .. } = interp;
    let host = LiveHost { key, files, sprites };
    eval::eval_lvalue(&expr, vars, rng, &host)
}

fn eval_args(interp: &mut Interpreter, rest: &str, key: &dyn KeyInput) -> Result<Vec<Value>, BasicError> {
    let rest = rest.trim();
    if rest.is_empty() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for part in split_top_level_commas(rest) {
        out.push(eval_expr_text(interp, part.trim(), key)?);
    }
    Ok(out)
}

fn num(v: &Value) -> Result<f64, BasicError> {
    v.as_num()
}

fn text(v: &Value) -> Result<String, BasicError> {
    v.as_str().map(str::to_string)
}

fn idu32(v: &Value) -> Result<u32, BasicError> {
    let n = num(v)? as i64;
    u32::try_from(n).map_err(|_| illegal_arg("id must be a non-negative integer"))
}

fn non_negative_u32(n: f64) -> Result<u32, BasicError> {
    if n < 0.0 || n.fract() != 0.0 {
        return Err(illegal_arg("expected a non-negative integer"));
    }
    Ok(n as u32)
}

/// Splits a fixed-arity `(coords..., color?)` argument list: `n` plain
/// coordinates, with an optional trailing color defaulting to white.
fn split_color(mut args: Vec<Value>, n: usize) -> Result<(Vec<Value>, core_events::Color), BasicError> {
    if args.len() == n {
        Ok((args, resolve_color(&Value::Num(15.0))?))
    } else if args.len() == n + 1 {
        let color_v = args.pop().expect("checked len above");
        Ok((args, resolve_color(&color_v)?))
    } else {
        Err(BasicError::new(ErrorCode::CommandUsage, format!("expected {n} or {} argument(s)", n + 1)))
    }
}

fn require_n(cmd: &str, args: &[Value], n: usize) -> Result<(), BasicError> {
    if args.len() != n {
        return Err(BasicError::new(ErrorCode::CommandUsage, format!("{cmd} requires exactly {n} argument(s)")).with_command(cmd));
    }
    Ok(())
}

fn usage_err(cmd: &str) -> BasicError {
    BasicError::new(ErrorCode::CommandUsage, format!("invalid {cmd} syntax")).with_command(cmd)
}

fn usage_err_with_hint(cmd: &str, hint: &str) -> BasicError {
    usage_err(cmd).with_usage_hint(hint)
}

fn illegal_arg(msg: impl Into<String>) -> BasicError {
    BasicError::new(ErrorCode::IllegalArgument, msg)
}

fn control_flow_usage(kw: &str) -> BasicError {
    BasicError::new(ErrorCode::CommandUsage, format!("{kw} is only valid inside a running program")).with_command(kw)
}

fn split_first_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    let end = s.find(|c: char| c.is_whitespace()).unwrap_or(s.len());
    (&s[..end], s[end..].trim_start())
}

fn is_implicit_let(stmt: &str) -> bool {
    match find_top_level_eq(stmt) {
        Some(eq) => {
            let lhs = stmt[..eq].trim();
            split_name_and_args(lhs).is_some()
        }
        None => false,
    }
}

fn convert_sep(sep: core_compiler::PrintSepOp) -> core_io::PrintSep {
    match sep {
        core_compiler::PrintSepOp::Comma => core_io::PrintSep::Comma,
        core_compiler::PrintSepOp::Semicolon => core_io::PrintSep::Semicolon,
    }
}

// ---- LET / assignment ----------------------------------------------------

fn exec_assignment(interp: &mut Interpreter, body: &str, key: &dyn KeyInput) -> Result<(), BasicError> {
    let eq = find_top_level_eq(body).ok_or_else(|| BasicError::new(ErrorCode::UnexpectedToken, "expected '=' in assignment"))?;
    let lhs = body[..eq].trim();
    let rhs = body[eq + 1..].trim();
    if lhs.is_empty() || rhs.is_empty() {
        return Err(BasicError::new(ErrorCode::UnexpectedToken, "incomplete assignment"));
    }
    let target = eval_lvalue_text(interp, lhs, key)?;
    let value = eval_expr_text(interp, rhs, key)?;
    eval::store_lvalue(&mut interp.vars, &target, value)
}

// ---- PRINT ----------------------------------------------------------------

fn exec_print(interp: &mut Interpreter, rest: &str, key: &dyn KeyInput, sink: &mut dyn MessageSink) -> Result<(), BasicError> {
    let rest_trim = rest.trim_start();
    if let Some(after_hash) = rest_trim.strip_prefix('#') {
        let comma = after_hash.find(',').ok_or_else(|| usage_err_with_hint("PRINT", "PRINT #n, expr[, ...]"))?;
        let handle: i64 = after_hash[..comma].trim().parse().map_err(|_| usage_err("PRINT"))?;
        let body = &after_hash[comma + 1..];
        let rendered = render_print_items(interp, body, key)?;
        let (text_out, _suppress) = core_io::format_print(&rendered);
        interp.files.write_line(handle, &text_out)?;
        return Ok(());
    }
    let rendered = render_print_items(interp, rest, key)?;
    let (text_out, suppress) = core_io::format_print(&rendered);
    sink.send(OutMessage::Text { text: text_out, no_newline: suppress, inverse: interp.inverse, session_id: None });
    Ok(())
}

fn render_print_items(interp: &mut Interpreter, rest: &str, key: &dyn KeyInput) -> Result<Vec<(String, Option<core_io::PrintSep>)>, BasicError> {
    let items = split_print_items(rest);
    let mut rendered = Vec::with_capacity(items.len());
    for (text, sep) in items {
        let s = if text.is_empty() { String::new() } else { eval_expr_text(interp, &text, key)?.display_string().to_string() };
        rendered.push((s, sep.map(convert_sep)));
    }
    Ok(rendered)
}

// ---- INPUT / LINE INPUT ----------------------------------------------------

fn parse_input_prompt(rest: &str) -> Result<(Option<Rc<str>>, &str), BasicError> {
    let rest = rest.trim_start();
    if let Some(after_quote) = rest.strip_prefix('"') {
        let end = after_quote.find('"').ok_or_else(|| BasicError::new(ErrorCode::MissingQuotes, "missing closing quote in INPUT prompt"))?;
        let prompt_text = &after_quote[..end];
        let after = after_quote[end + 1..].trim_start();
        let after = after
            .strip_prefix(';')
            .or_else(|| after.strip_prefix(','))
            .ok_or_else(|| usage_err_with_hint("INPUT", "INPUT [\"prompt\";] var[, var...]"))?;
        Ok((Some(Rc::from(prompt_text)), after.trim_start()))
    } else {
        Ok((None, rest))
    }
}

fn exec_input(interp: &mut Interpreter, rest: &str, key: &dyn KeyInput) -> Result<StmtOutcome, BasicError> {
    let rest = rest.trim();
    if let Some(after_hash) = rest.strip_prefix('#') {
        let comma = after_hash.find(',').ok_or_else(|| usage_err_with_hint("INPUT", "INPUT #n, var[, var...]"))?;
        let handle: i64 = after_hash[..comma].trim().parse().map_err(|_| usage_err("INPUT"))?;
        for target in split_top_level_commas(&after_hash[comma + 1..]) {
            let target = target.trim();
            let lv = eval_lvalue_text(interp, target, key)?;
            let raw = interp.files.read_line(handle)?;
            let value = coerce_data_item(&raw, target_is_string(&lv))?;
            eval::store_lvalue(&mut interp.vars, &lv, value)?;
        }
        return Ok(StmtOutcome::Continue);
    }
    let (prompt, targets_text) = parse_input_prompt(rest)?;
    let parts = split_top_level_commas(targets_text);
    if parts.iter().all(|p| p.trim().is_empty()) {
        return Err(usage_err_with_hint("INPUT", "INPUT [\"prompt\";] var[, var...]"));
    }
    let mut targets = Vec::with_capacity(parts.len());
    for t in parts {
        let t = t.trim();
        if t.is_empty() {
            return Err(usage_err("INPUT"));
        }
        targets.push(eval_lvalue_text(interp, t, key)?);
    }
    Ok(StmtOutcome::Suspend(Pending::Input(prompt, targets)))
}

fn exec_line_keyword(interp: &mut Interpreter, rest: &str, key: &dyn KeyInput, sink: &mut dyn MessageSink) -> Result<(), BasicError> {
    let rest_trim = rest.trim_start();
    if let Some(after) = strip_keyword(rest_trim, "INPUT") {
        exec_line_input(interp, after, key)
    } else {
        let msg = exec_line_graphics(interp, rest, key)?;
        sink.send(msg);
        Ok(())
    }
}

fn strip_keyword<'a>(s: &'a str, kw: &str) -> Option<&'a str> {
    if s.len() >= kw.len() && s[..kw.len()].eq_ignore_ascii_case(kw) {
        let after = &s[kw.len()..];
        if after.is_empty() || after.starts_with(|c: char| c.is_whitespace() || c == '#') {
            return Some(after.trim_start());
        }
    }
    None
}

fn exec_line_input(interp: &mut Interpreter, rest: &str, key: &dyn KeyInput) -> Result<(), BasicError> {
    let rest = rest.trim();
    let after_hash = rest.strip_prefix('#').ok_or_else(|| usage_err_with_hint("LINE INPUT", "LINE INPUT #n, var$"))?;
    let comma = after_hash.find(',').ok_or_else(|| usage_err_with_hint("LINE INPUT", "LINE INPUT #n, var$"))?;
    let handle: i64 = after_hash[..comma].trim().parse().map_err(|_| usage_err("LINE INPUT"))?;
    let target = after_hash[comma + 1..].trim();
    let lv = eval_lvalue_text(interp, target, key)?;
    let raw = interp.files.read_raw_line(handle)?;
    eval::store_lvalue(&mut interp.vars, &lv, Value::Str(Rc::from(raw)))
}

// ---- LINE (graphics) dispatch note: see exec_line_keyword above -----------
//
// Classic BASIC overloads the `LINE` keyword between the graphics
// primitive (`LINE x1,y1,x2,y2[,color]`) and `LINE INPUT #n, var$`. The
// dispatcher in `exec_statement` never reaches a plain "LINE ..." arm
// directly; `exec_line_keyword` tells the two apart by checking whether
// `INPUT` follows, then draws the graphics primitive itself below.

fn exec_line_graphics(interp: &mut Interpreter, rest: &str, key: &dyn KeyInput) -> Result<OutMessage, BasicError> {
    let args = eval_args(interp, rest, key)?;
    let (coords, color) = split_color(args, 4)?;
    Ok(OutMessage::Graphics(GraphicsCommand::Line { x1: num(&coords[0])?, y1: num(&coords[1])?, x2: num(&coords[2])?, y2: num(&coords[3])?, color }))
}

// ---- IF / THEN / ELSE ------------------------------------------------------

fn exec_if(
    interp: &mut Interpreter,
    rest: &str,
    line: Option<u32>,
    key: &dyn KeyInput,
    fs: &dyn FileSystem,
    sink: &mut dyn MessageSink,
) -> Result<StmtOutcome, BasicError> {
    let then_pos = find_top_level_keyword(rest, "THEN").ok_or_else(|| usage_err_with_hint("IF", "IF cond THEN stmt [ELSE stmt]"))?;
    let cond_text = rest[..then_pos].trim();
    let after_then = rest[then_pos + 4..].trim_start();
    let (then_text, else_text) = match find_top_level_keyword(after_then, "ELSE") {
        Some(p) => (after_then[..p].trim(), Some(after_then[p + 4..].trim_start())),
        None => (after_then, None),
    };
    let cond = eval_expr_text(interp, cond_text, key)?.truthy()?;
    let branch = if cond { Some(then_text) } else { else_text };
    match branch {
        None => Ok(StmtOutcome::Continue),
        Some(text) if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) => {
            let target: u32 = text.parse().expect("all-digit branch checked above");
            match (line, interp.running) {
                (Some(_), true) => {
                    let prog = interp.compiled.clone().expect("running implies compiled");
                    let pc = prog.label(target).ok_or_else(|| BasicError::new(ErrorCode::LineNotFound, format!("line {target} not found")))?;
                    interp.vm.set_pc(pc);
                    Ok(StmtOutcome::Continue)
                }
                _ => Err(BasicError::new(ErrorCode::CommandUsage, "IF...THEN <line> is only valid while a program is running")),
            }
        }
        Some(text) => exec_branch(interp, text, line, key, fs, sink),
    }
}

fn exec_branch(
    interp: &mut Interpreter,
    text: &str,
    line: Option<u32>,
    key: &dyn KeyInput,
    fs: &dyn FileSystem,
    sink: &mut dyn MessageSink,
) -> Result<StmtOutcome, BasicError> {
    for stmt in split_statements(text) {
        let outcome = exec_statement(interp, &stmt, line, key, fs, sink)?;
        if !matches!(outcome, StmtOutcome::Continue) {
            return Ok(outcome);
        }
    }
    Ok(StmtOutcome::Continue)
}

// ---- RUN / LIST / VARS -----------------------------------------------------

fn exec_run(rest: &str) -> Result<StmtOutcome, BasicError> {
    let rest = rest.trim();
    if rest.is_empty() {
        Ok(StmtOutcome::RunProgram(None))
    } else if let Some(name) = strip_quotes(rest) {
        Ok(StmtOutcome::RunProgram(Some(name.to_string())))
    } else {
        Err(usage_err_with_hint("RUN", "RUN [\"filename\"]"))
    }
}

fn exec_list(interp: &mut Interpreter, rest: &str, sink: &mut dyn MessageSink) -> Result<(), BasicError> {
    let rest = rest.trim();
    let (start, end) = if rest.is_empty() {
        (0u32, u32::MAX)
    } else if let Some((a, b)) = rest.split_once('-') {
        (a.trim().parse().unwrap_or(0), b.trim().parse().unwrap_or(u32::MAX))
    } else if let Some((a, b)) = rest.split_once(',') {
        (a.trim().parse().unwrap_or(0), b.trim().parse().unwrap_or(u32::MAX))
    } else {
        let n: u32 = rest.parse().map_err(|_| usage_err_with_hint("LIST", "LIST [start[-end|,end]]"))?;
        (n, n)
    };
    for (n, src) in interp.program.lines() {
        if n >= start && n <= end {
            sink.send(OutMessage::Text { text: format!("{n} {src}"), no_newline: false, inverse: false, session_id: None });
        }
    }
    Ok(())
}

fn exec_vars(interp: &Interpreter, sink: &mut dyn MessageSink) {
    for (name, value) in interp.vars.scalar_entries() {
        sink.send(OutMessage::Text {
            text: format!("{name} = {}", value.display_string()),
            no_newline: false,
            inverse: false,
            session_id: None,
        });
    }
}

// ---- DIM / READ / RESTORE --------------------------------------------------

fn eval_dims(interp: &mut Interpreter, args_text: &str, key: &dyn KeyInput) -> Result<Vec<usize>, BasicError> {
    let mut dims = Vec::new();
    for part in split_top_level_commas(args_text) {
        let v = eval_expr_text(interp, part.trim(), key)?;
        let n = v.as_num()?;
        if n < 0.0 || n.fract() != 0.0 {
            return Err(BasicError::new(ErrorCode::ArrayIndexNotNumeric, "array dimension is not numeric"));
        }
        dims.push(n as usize);
    }
    Ok(dims)
}

fn exec_dim(interp: &mut Interpreter, rest: &str, key: &dyn KeyInput) -> Result<(), BasicError> {
    for decl in split_top_level_commas(rest) {
        let (name, args_text) = split_name_and_args(decl.trim()).ok_or_else(|| usage_err_with_hint("DIM", "DIM name(d1[,d2])"))?;
        let args_text = args_text.ok_or_else(|| usage_err_with_hint("DIM", "DIM name(d1[,d2])"))?;
        let dims = eval_dims(interp, args_text, key)?;
        interp.vars.dim_array(name, dims)?;
    }
    Ok(())
}

fn exec_read(interp: &mut Interpreter, rest: &str, key: &dyn KeyInput) -> Result<(), BasicError> {
    for target in split_top_level_commas(rest) {
        let target = target.trim();
        let (name, args_text) = split_name_and_args(target).ok_or_else(|| usage_err_with_hint("READ", "READ var[, var...]"))?;
        match args_text {
            Some(args_text) => {
                let idx = eval_dims(interp, args_text, key)?;
                let raw = interp.program.read_next_data()?;
                let is_string = interp.vars.array_is_string(name);
                let value = coerce_data_item(&raw, is_string)?;
                interp.vars.set_array(name, &idx, value)?;
            }
            None => {
                let raw = interp.program.read_next_data()?;
                let value = coerce_data_item(&raw, name.ends_with('$'))?;
                interp.vars.set_scalar(name, value);
            }
        }
    }
    Ok(())
}

// ---- OPEN / CLOSE -----------------------------------------------------------

fn exec_open(interp: &mut Interpreter, rest: &str, fs: &dyn FileSystem, key: &dyn KeyInput) -> Result<(), BasicError> {
    let rest = rest.trim();
    let usage = || usage_err_with_hint("OPEN", "OPEN \"filename\" FOR INPUT|OUTPUT AS #n");
    let (name, remainder) = if let Some(after_quote) = rest.strip_prefix('"') {
        let end = after_quote.find('"').ok_or_else(|| BasicError::new(ErrorCode::MissingQuotes, "missing closing quote in OPEN"))?;
        (after_quote[..end].to_string(), after_quote[end + 1..].trim_start())
    } else {
        let for_pos = find_top_level_keyword(rest, "FOR").ok_or_else(usage)?;
        let v = eval_expr_text(interp, rest[..for_pos].trim(), key)?;
        (text(&v)?, rest[for_pos..].trim_start())
    };
    let remainder = strip_keyword(remainder, "FOR").ok_or_else(usage)?;
    let (mode_word, after_mode) = split_first_word(remainder);
    let mode = if mode_word.eq_ignore_ascii_case("INPUT") {
        FileMode::Input
    } else if mode_word.eq_ignore_ascii_case("OUTPUT") {
        FileMode::Output
    } else {
        return Err(usage());
    };
    let after_as = strip_keyword(after_mode, "AS").ok_or_else(usage)?;
    let after_hash = after_as.strip_prefix('#').ok_or_else(usage)?;
    let handle: i64 = after_hash.trim().parse().map_err(|_| usage())?;
    interp.files.open(fs, handle, &name, mode)
}

fn exec_close(interp: &mut Interpreter, rest: &str, fs: &dyn FileSystem) -> Result<(), BasicError> {
    let rest = rest.trim();
    let rest = rest.strip_prefix('#').unwrap_or(rest);
    let handle: i64 = rest.trim().parse().map_err(|_| usage_err_with_hint("CLOSE", "CLOSE #n"))?;
    interp.files.close(fs, handle)
}

// ---- SPRITE / VECTOR family / PARTICLE / PLAYSFX --------------------------

fn push_sprite(interp: &mut Interpreter, cmd: SpriteCommand, sink: &mut dyn MessageSink) {
    if let Some(batch) = interp.sprite_batch.push(cmd) {
        sink.send(OutMessage::Sprite(batch));
    }
}

fn exec_sprite(interp: &mut Interpreter, rest: &str, key: &dyn KeyInput, sink: &mut dyn MessageSink) -> Result<(), BasicError> {
    let rest = rest.trim();
    let (word, tail) = split_first_word(rest);
    if word.eq_ignore_ascii_case("UPDATE") {
        let args = eval_args(interp, tail, key)?;
        let (id, x, y, rotation_deg, visible) = match args.as_slice() {
            [id, x, y] => (idu32(id)?, num(x)?, num(y)?, 0.0, true),
            [id, x, y, rot] => (idu32(id)?, num(x)?, num(y)?, num(rot)?, true),
            [id, x, y, rot, vis] => (idu32(id)?, num(x)?, num(y)?, num(rot)?, vis.truthy()?),
            _ => return Err(usage_err_with_hint("SPRITE UPDATE", "SPRITE UPDATE id,x,y[,rotation,visible]")),
        };
        interp.sprites.update(id, x, y, visible)?;
        let cmd = SpriteCommand::UpdateSprite { id, x, y, rotation_rad: core_io::degrees_to_radians(rotation_deg), visible };
        push_sprite(interp, cmd, sink);
        Ok(())
    } else if word.eq_ignore_ascii_case("VIRTUAL") {
        let parts = split_top_level_commas(tail);
        if parts.len() < 4 {
            return Err(usage_err_with_hint("SPRITE VIRTUAL", "SPRITE VIRTUAL id,\"layout\",width,height[,p1,p2,...]"));
        }
        let id = idu32(&eval_expr_text(interp, parts[0].trim(), key)?)?;
        let layout = text(&eval_expr_text(interp, parts[1].trim(), key)?)?;
        let width = non_negative_u32(num(&eval_expr_text(interp, parts[2].trim(), key)?)?)?;
        let height = non_negative_u32(num(&eval_expr_text(interp, parts[3].trim(), key)?)?)?;
        let mut pixels = Vec::with_capacity(parts.len().saturating_sub(4));
        for p in &parts[4..] {
            pixels.push(non_negative_u32(num(&eval_expr_text(interp, p.trim(), key)?)?)? as u8);
        }
        push_sprite(interp, SpriteCommand::DefineVirtualSprite { id, layout, width, height, pixels }, sink);
        Ok(())
    } else {
        let parts = split_top_level_commas(rest);
        if parts.len() < 3 {
            return Err(usage_err_with_hint("SPRITE", "SPRITE id,width,height[,p1,p2,...]"));
        }
        let id = idu32(&eval_expr_text(interp, parts[0].trim(), key)?)?;
        let width = non_negative_u32(num(&eval_expr_text(interp, parts[1].trim(), key)?)?)?;
        let height = non_negative_u32(num(&eval_expr_text(interp, parts[2].trim(), key)?)?)?;
        let mut pixels = Vec::with_capacity(parts.len().saturating_sub(3));
        for p in &parts[3..] {
            pixels.push(non_negative_u32(num(&eval_expr_text(interp, p.trim(), key)?)?)? as u8);
        }
        interp.sprites.define(id, width, height, pixels.clone())?;
        push_sprite(interp, SpriteCommand::DefineSprite { id, width, height, pixels }, sink);
        Ok(())
    }
}

fn exec_vector_like(interp: &mut Interpreter, shape: &str, rest: &str, key: &dyn KeyInput) -> Result<OutMessage, BasicError> {
    let args = eval_args(interp, rest, key)?;
    if args.len() < 10 || args.len() > 11 {
        return Err(usage_err_with_hint(shape, &format!("{shape} id,x,y,z,rx,ry,rz,scale,visible,brightness[,custom]")));
    }
    let id = idu32(&args[0])?;
    let x = num(&args[1])?;
    let y = num(&args[2])?;
    let z = num(&args[3])?;
    let rx = num(&args[4])?;
    let ry = num(&args[5])?;
    let rz = num(&args[6])?;
    let scale = num(&args[7])?;
    let visible = args[8].truthy()?;
    let brightness = num(&args[9])?;
    if !(0.0..=15.0).contains(&brightness) {
        return Err(illegal_arg("brightness must be 0-15"));
    }
    let custom = match args.get(10) {
        Some(Value::Str(s)) => Some(serde_json::from_str(s).unwrap_or_else(|_| serde_json::Value::String(s.to_string()))),
        Some(Value::Num(n)) => Some(serde_json::json!(n)),
        None => None,
    };
    let cmd = update_vector_command(id, shape, x, y, z, (rx, ry, rz), scale, visible, brightness as u8, custom);
    Ok(OutMessage::Vector(cmd))
}

fn exec_particle(interp: &mut Interpreter, rest: &str, key: &dyn KeyInput) -> Result<OutMessage, BasicError> {
    let rest = rest.trim();
    let (sub, body) = split_first_word(rest);
    let cmd = match sub.to_ascii_uppercase().as_str() {
        "CREATE" => {
            let a = eval_args(interp, body, key)?;
            require_n("PARTICLE CREATE", &a, 3)?;
            ParticleCommand::CreateEmitter { id: idu32(&a[0])?, x: num(&a[1])?, y: num(&a[2])? }
        }
        "MOVE" => {
            let a = eval_args(interp, body, key)?;
            require_n("PARTICLE MOVE", &a, 3)?;
            ParticleCommand::MoveEmitter { id: idu32(&a[0])?, x: num(&a[1])?, y: num(&a[2])? }
        }
        "SHOW" => {
            let a = eval_args(interp, body, key)?;
            require_n("PARTICLE SHOW", &a, 1)?;
            ParticleCommand::ShowEmitter { id: idu32(&a[0])? }
        }
        "HIDE" => {
            let a = eval_args(interp, body, key)?;
            require_n("PARTICLE HIDE", &a, 1)?;
            ParticleCommand::HideEmitter { id: idu32(&a[0])? }
        }
        "GRAVITY" => {
            let a = eval_args(interp, body, key)?;
            require_n("PARTICLE GRAVITY", &a, 2)?;
            ParticleCommand::SetGravity { id: idu32(&a[0])?, gravity: num(&a[1])? }
        }
        _ => return Err(usage_err_with_hint("PARTICLE", "PARTICLE CREATE|MOVE|SHOW|HIDE|GRAVITY ...")),
    };
    Ok(OutMessage::Particle(cmd))
}

fn exec_playsfx(interp: &mut Interpreter, rest: &str, key: &dyn KeyInput) -> Result<OutMessage, BasicError> {
    let parts = split_top_level_commas(rest);
    if parts.is_empty() || parts.len() > 2 {
        return Err(usage_err_with_hint("PLAYSFX", "PLAYSFX effect[, variant]"));
    }
    let effect = text(&eval_expr_text(interp, parts[0].trim(), key)?)?;
    let variant = if parts.len() == 2 {
        let v = num(&eval_expr_text(interp, parts[1].trim(), key)?)?;
        if !(1.0..=8.0).contains(&v) {
            return Err(illegal_arg("PLAYSFX variant must be 1-8"));
        }
        Some(v as u8)
    } else {
        None
    };
    Ok(OutMessage::Sfx { effect, variant })
}

// ---- RANDOMIZE --------------------------------------------------------------

fn exec_randomize(interp: &mut Interpreter, rest: &str, key: &dyn KeyInput) -> Result<(), BasicError> {
    let rest = rest.trim();
    let seed = if rest.is_empty() {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos() as u64).unwrap_or(0)
    } else {
        let v = eval_expr_text(interp, rest, key)?;
        num(&v)?.abs() as u64
    };
    interp.rng.reseed(seed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Interpreter, KeyInput, MessageSink};
    use core_io::StdFileSystem;

    struct NoKeys;
    impl KeyInput for NoKeys {
        fn keystate(&self, _k: &str) -> bool {
            false
        }
        fn keypressed(&self, _k: &str) -> bool {
            false
        }
        fn inkey(&self) -> Rc<str> {
            Rc::from("")
        }
    }

    #[derive(Default)]
    struct CollectSink(Vec<OutMessage>);
    impl MessageSink for CollectSink {
        fn send(&mut self, msg: OutMessage) {
            self.0.push(msg);
        }
    }

    fn texts(sink: &CollectSink) -> Vec<String> {
        sink.0
            .iter()
            .filter_map(|m| match m {
                OutMessage::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn direct_mode_print_with_no_run_works_without_a_program() {
        let mut interp = Interpreter::new();
        let mut sink = CollectSink::default();
        interp.exec_direct("PRINT 1+2", &NoKeys, &StdFileSystem, &mut sink);
        assert_eq!(texts(&sink), vec!["3"]);
    }

    #[test]
    fn multi_variable_input_suspends_with_prompt() {
        let mut interp = Interpreter::new();
        let mut sink = CollectSink::default();
        let outcome = interp.exec_direct("INPUT \"NAME\"; A$, B", &NoKeys, &StdFileSystem, &mut sink);
        match outcome {
            crate::Outcome::NeedsInput { prompt } => assert_eq!(prompt.as_deref(), Some("NAME")),
            _ => panic!("expected NeedsInput"),
        }
        let outcome = interp.resume_input("HI, 5", &NoKeys, &StdFileSystem, &mut sink);
        assert!(matches!(outcome, crate::Outcome::Ready));
    }

    #[test]
    fn input_reply_count_mismatch_is_redo_from_start() {
        let mut vars = core_value::VariableTable::new();
        let targets = vec![eval::LValue::Scalar(Rc::from("A")), eval::LValue::Scalar(Rc::from("B"))];
        let err = apply_input_reply(&mut vars, &targets, "1").unwrap_err();
        assert_eq!(err.code, ErrorCode::RedoFromStart);
    }

    #[test]
    fn direct_mode_goto_is_a_command_usage_error() {
        let mut interp = Interpreter::new();
        let mut sink = CollectSink::default();
        interp.exec_direct("GOTO 10", &NoKeys, &StdFileSystem, &mut sink);
        let terminated = sink.0.iter().any(|m| matches!(m, OutMessage::Terminated { message, .. } if message.contains("COMMAND ERROR")));
        assert!(terminated);
    }

    #[test]
    fn cls_and_locate_emit_expected_messages() {
        let mut interp = Interpreter::new();
        let mut sink = CollectSink::default();
        interp.exec_direct("CLS : LOCATE 1,2", &NoKeys, &StdFileSystem, &mut sink);
        assert!(sink.0.iter().any(|m| matches!(m, OutMessage::ClearScreen)));
        assert!(sink.0.iter().any(|m| matches!(m, OutMessage::Locate { x: 1, y: 2 })));
    }

    #[test]
    fn plot_defaults_color_to_white_when_omitted() {
        let mut interp = Interpreter::new();
        let mut sink = CollectSink::default();
        interp.exec_direct("PLOT 1,2", &NoKeys, &StdFileSystem, &mut sink);
        let msg = sink.0.iter().find(|m| matches!(m, OutMessage::Graphics(_))).unwrap();
        match msg {
            OutMessage::Graphics(GraphicsCommand::Plot { color, .. }) => {
                assert_eq!(*color, core_events::Color::Hex("#FFFFFF".to_string()));
            }
            _ => panic!("expected a Plot message"),
        }
    }

    #[test]
    fn vars_lists_assigned_scalars() {
        let mut interp = Interpreter::new();
        let mut sink = CollectSink::default();
        interp.exec_direct("LET A=5 : VARS", &NoKeys, &StdFileSystem, &mut sink);
        assert!(texts(&sink).iter().any(|t| t == "A = 5"));
    }
}
