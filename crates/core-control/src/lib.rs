//! Control-flow runtable (spec component G): bounded `FOR`-loop and
//! `GOSUB` stacks shared by the direct interpreter and the bytecode VM.

use core_value::{BasicError, ErrorCode};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::trace;

/// Nesting bound for both stacks. 32 covers every realistic program while
/// still catching a runaway recursive GOSUB quickly.
pub const FOR_LOOP_DEPTH_MAX: usize = 32;
pub const GOSUB_DEPTH_MAX: usize = 32;

#[derive(Debug, Clone)]
pub struct ForFrame {
    pub var: Rc<str>,
    pub end: f64,
    pub step: f64,
    pub body_pc: usize,
}

/// Open `FOR` frames plus a `variable -> frame index` map giving O(1)
/// lookup of the innermost frame for a bare `NEXT` or a `NEXT var`.
#[derive(Default)]
pub struct ForStack {
    frames: SmallVec<[ForFrame; FOR_LOOP_DEPTH_MAX]>,
    by_name: HashMap<Rc<str>, usize>,
}

impl ForStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: ForFrame) -> Result<(), BasicError> {
        if self.frames.len() >= FOR_LOOP_DEPTH_MAX {
            return Err(BasicError::new(ErrorCode::ForLoopDepthExceeded, "FOR nesting too deep"));
        }
        trace!(target: "control.for", var = %frame.var, depth = self.frames.len() + 1, "for_push");
        self.by_name.insert(frame.var.clone(), self.frames.len());
        self.frames.push(frame);
        Ok(())
    }

    /// Resolves a `NEXT` (optionally naming a variable) to the frame it
    /// closes, without mutating the stack. `None` for `var` means the
    /// innermost frame.
    pub fn resolve(&self, var: Option<&str>) -> Result<usize, BasicError> {
        match var {
            None => self
                .frames
                .last()
                .map(|_| self.frames.len() - 1)
                .ok_or_else(|| BasicError::new(ErrorCode::NextWithoutFor, "NEXT without FOR")),
            Some(name) => self
                .by_name
                .get(name)
                .copied()
                .ok_or_else(|| BasicError::new(ErrorCode::ForNextMismatch, format!("NEXT {name} has no matching FOR"))),
        }
    }

    pub fn frame(&self, index: usize) -> &ForFrame {
        &self.frames[index]
    }

    /// Discards the frame at `index` and every frame nested inside it (a
    /// `NEXT` on an outer variable implicitly closes inner loops that
    /// never ran their own `NEXT`).
    pub fn close_from(&mut self, index: usize) {
        trace!(target: "control.for", depth_before = self.frames.len(), closing_from = index, "for_close");
        self.frames.truncate(index);
        self.by_name.retain(|_, i| *i < index);
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.by_name.clear();
    }
}

/// `GOSUB` return-address stack, bounded identically to `ForStack`.
#[derive(Default)]
pub struct GosubStack {
    frames: SmallVec<[usize; GOSUB_DEPTH_MAX]>,
}

impl GosubStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, return_pc: usize) -> Result<(), BasicError> {
        if self.frames.len() >= GOSUB_DEPTH_MAX {
            return Err(BasicError::new(ErrorCode::GosubDepthExceeded, "GOSUB nesting too deep"));
        }
        trace!(target: "control.gosub", depth = self.frames.len() + 1, "gosub_push");
        self.frames.push(return_pc);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<usize, BasicError> {
        self.frames
            .pop()
            .ok_or_else(|| BasicError::new(ErrorCode::ReturnWithoutGosub, "RETURN without GOSUB"))
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

/// True once `step > 0 && var > end` or `step < 0 && var < end`: the loop
/// body has run its last iteration and the frame should close.
pub fn for_loop_done(current: f64, end: f64, step: f64) -> bool {
    if step >= 0.0 {
        current > end
    } else {
        current < end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(var: &str, end: f64, step: f64) -> ForFrame {
        ForFrame { var: Rc::from(var), end, step, body_pc: 7 }
    }

    #[test]
    fn bare_next_resolves_innermost_frame() {
        let mut stack = ForStack::new();
        stack.push(frame("I", 10.0, 1.0)).unwrap();
        stack.push(frame("J", 5.0, 1.0)).unwrap();
        assert_eq!(stack.resolve(None).unwrap(), 1);
    }

    #[test]
    fn named_next_finds_its_own_frame_by_map_lookup() {
        let mut stack = ForStack::new();
        stack.push(frame("I", 10.0, 1.0)).unwrap();
        stack.push(frame("J", 5.0, 1.0)).unwrap();
        assert_eq!(stack.resolve(Some("I")).unwrap(), 0);
    }

    #[test]
    fn next_with_unknown_variable_is_for_next_mismatch() {
        let mut stack = ForStack::new();
        stack.push(frame("I", 10.0, 1.0)).unwrap();
        assert!(matches!(
            stack.resolve(Some("Z")),
            Err(e) if e.code == ErrorCode::ForNextMismatch
        ));
    }

    #[test]
    fn next_without_any_open_for_is_next_without_for() {
        let stack = ForStack::new();
        assert!(matches!(stack.resolve(None), Err(e) if e.code == ErrorCode::NextWithoutFor));
    }

    #[test]
    fn closing_an_outer_frame_drops_unclosed_inner_frames_too() {
        let mut stack = ForStack::new();
        stack.push(frame("I", 10.0, 1.0)).unwrap();
        stack.push(frame("J", 5.0, 1.0)).unwrap();
        let idx = stack.resolve(Some("I")).unwrap();
        stack.close_from(idx);
        assert_eq!(stack.depth(), 0);
        assert!(stack.resolve(Some("J")).is_err());
    }

    #[test]
    fn for_depth_beyond_max_faults() {
        let mut stack = ForStack::new();
        for i in 0..FOR_LOOP_DEPTH_MAX {
            stack.push(frame(&format!("V{i}"), 1.0, 1.0)).unwrap();
        }
        assert!(matches!(
            stack.push(frame("OVERFLOW", 1.0, 1.0)),
            Err(e) if e.code == ErrorCode::ForLoopDepthExceeded
        ));
    }

    #[test]
    fn gosub_push_pop_is_lifo() {
        let mut stack = GosubStack::new();
        stack.push(3).unwrap();
        stack.push(9).unwrap();
        assert_eq!(stack.pop().unwrap(), 9);
        assert_eq!(stack.pop().unwrap(), 3);
    }

    #[test]
    fn return_without_gosub_faults() {
        let mut stack = GosubStack::new();
        assert!(matches!(stack.pop(), Err(e) if e.code == ErrorCode::ReturnWithoutGosub));
    }

    #[test]
    fn gosub_depth_beyond_max_faults() {
        let mut stack = GosubStack::new();
        for pc in 0..GOSUB_DEPTH_MAX {
            stack.push(pc).unwrap();
        }
        assert!(matches!(stack.push(999), Err(e) if e.code == ErrorCode::GosubDepthExceeded));
    }

    #[test]
    fn for_loop_done_respects_step_sign() {
        assert!(!for_loop_done(5.0, 10.0, 1.0));
        assert!(for_loop_done(11.0, 10.0, 1.0));
        assert!(!for_loop_done(5.0, 1.0, -1.0));
        assert!(for_loop_done(0.0, 1.0, -1.0));
    }
}
