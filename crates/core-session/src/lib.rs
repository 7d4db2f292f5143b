//! Session glue (spec component K): the single cooperative task that owns
//! one [`core_interp::Interpreter`] for the lifetime of a session, drains
//! its `Event` channel, and drives the interpreter's suspend/resume
//! contract for `INPUT`, `WAIT`, and the SAY_DONE rendezvous.
//!
//! Grounded on the teacher's `EditorRuntime::run()` event loop shape
//! (`ox-bin::main`): one `mpsc::Receiver<Event>`, one `while let Some(event)
//! = rx.recv().await` loop, dispatch by event kind. Unlike the teacher,
//! nothing here needs `Send` across threads — `core_value::Value` uses
//! `Rc<str>`, so the `Interpreter` is pinned to whichever task calls
//! [`Session::run`] and never moves across an `.await` while borrowed by
//! another task. A caller on a multi-threaded `tokio` runtime should drive
//! it from a [`tokio::task::LocalSet`] (`spawn_local`), not `tokio::spawn`.
//!
//! Cancellation (`__BREAK__`) does not go through the interpreter at all:
//! it flips a plain `Arc<AtomicBool>` that every `resume_*`/`exec_direct`
//! call already polls (spec.md §5, wired in `core-interp`). Setting that
//! flag never needs to wait for an in-flight `RUN` to return, which is
//! the whole point — a `RUN` can be spinning through a `FOR` loop with no
//! `.await` point of its own.

mod key_state;
mod sink;

pub use key_state::KeyState;
pub use sink::ChannelSink;

use core_events::{Event, InMessage, OutMessage};
use core_interp::{Interpreter, Outcome};
use core_io::{FileSystem, StdFileSystem};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{Receiver, Sender};
use tracing::warn;

/// What the interpreter is currently suspended on. Tracked here, not
/// inside `core-interp`, because only the session loop needs to know
/// which external event satisfies the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Waiting {
    None,
    Input,
    SayDone,
    Wait,
}

/// One user's BASIC session: an interpreter, its key-state, and the
/// cancellation flag, wired to an inbound [`Event`] channel and an
/// outbound [`OutMessage`] channel.
pub struct Session {
    interp: Interpreter,
    keys: Arc<KeyState>,
    cancel: Arc<AtomicBool>,
    fs: Box<dyn FileSystem>,
    waiting: Waiting,
}

impl Session {
    pub fn new(limits: core_config::SessionLimits) -> Self {
        Self {
            interp: Interpreter::with_expr_cache_capacity(limits.expr_cache_capacity),
            keys: Arc::new(KeyState::new()),
            cancel: Arc::new(AtomicBool::new(false)),
            fs: Box::new(StdFileSystem),
            waiting: Waiting::None,
        }
    }

    /// A handle the host can use to push raw key events in, independent of
    /// the session's `Event` channel (spec.md §3: key state is written
    /// from outside the interpreter).
    pub fn keys(&self) -> Arc<KeyState> {
        self.keys.clone()
    }

    pub fn program_text(&self) -> String {
        self.interp.program_text()
    }

    pub fn is_running(&self) -> bool {
        self.interp.is_running()
    }

    fn cancel_fn(&self) -> impl Fn() -> bool {
        let cancel = self.cancel.clone();
        move || cancel.load(Ordering::Relaxed)
    }

    fn exec(&mut self, line: &str, sink: &mut ChannelSink) -> Outcome {
        let cancel = self.cancel_fn();
        self.interp.exec_direct(line, &*self.keys, &*self.fs, sink, &cancel)
    }

    fn resume_reply(&mut self, reply: &str, sink: &mut ChannelSink) -> Outcome {
        let cancel = self.cancel_fn();
        self.interp.resume_input(reply, &*self.keys, &*self.fs, sink, &cancel)
    }

    fn resume_say(&mut self, sink: &mut ChannelSink) -> Outcome {
        let cancel = self.cancel_fn();
        self.interp.resume_after_say(&*self.keys, &*self.fs, sink, &cancel)
    }

    fn resume_wait(&mut self, sink: &mut ChannelSink) -> Outcome {
        let cancel = self.cancel_fn();
        self.interp.resume_after_wait(&*self.keys, &*self.fs, sink, &cancel)
    }

    fn emit_prompt(prompt: Option<Rc<str>>, sink: &mut ChannelSink) {
        let mut text = prompt.map(|p| p.to_string()).unwrap_or_default();
        text.push_str("? ");
        sink.send(OutMessage::Text { text, no_newline: true, inverse: false, session_id: None });
    }

    /// Runs the session to completion: drains `rx` until `Shutdown` or the
    /// channel closes. Never returns early on a running program — `RUN`
    /// is driven to `Halted`/fault/suspension entirely inside `drive`.
    pub async fn run(mut self, mut rx: Receiver<Event>, out_tx: Sender<OutMessage>) {
        let mut sink = ChannelSink::new(out_tx);
        loop {
            let event = match rx.recv().await {
                Some(e) => e,
                None => break,
            };
            match event {
                Event::Shutdown => break,
                Event::Tick => continue,
                Event::SayDone => {
                    if self.waiting == Waiting::SayDone {
                        let outcome = self.resume_say(&mut sink);
                        if !self.drive(outcome, &mut rx, &mut sink).await {
                            break;
                        }
                    }
                }
                Event::Input(InMessage::Break) => {
                    let outcome = match self.waiting {
                        Waiting::None => {
                            continue;
                        }
                        Waiting::Input => {
                            self.cancel.store(true, Ordering::Relaxed);
                            self.resume_reply("", &mut sink)
                        }
                        Waiting::SayDone => {
                            self.cancel.store(true, Ordering::Relaxed);
                            self.resume_say(&mut sink)
                        }
                        Waiting::Wait => {
                            self.cancel.store(true, Ordering::Relaxed);
                            self.resume_wait(&mut sink)
                        }
                    };
                    if !self.drive(outcome, &mut rx, &mut sink).await {
                        break;
                    }
                }
                Event::Input(InMessage::InputReply(reply)) => {
                    if self.waiting != Waiting::Input {
                        warn!(target: "session", "input reply received with nothing pending, ignored");
                        continue;
                    }
                    let outcome = self.resume_reply(&reply, &mut sink);
                    if !self.drive(outcome, &mut rx, &mut sink).await {
                        break;
                    }
                }
                Event::Input(InMessage::ProgramLine { line, code }) => {
                    if self.waiting != Waiting::None {
                        warn!(target: "session", "program edit ignored while busy");
                        continue;
                    }
                    self.interp.edit_line(line, &code);
                }
                Event::Input(InMessage::Direct(line)) => {
                    if self.waiting != Waiting::None {
                        warn!(target: "session", "direct statement ignored while busy");
                        continue;
                    }
                    let outcome = self.exec(&line, &mut sink);
                    if !self.drive(outcome, &mut rx, &mut sink).await {
                        break;
                    }
                }
            }
        }
    }

    /// Resolves an `Outcome` to either `Ready`/`Quit` (returns to the main
    /// loop, which waits for the next `Event`) or a further suspension
    /// that this session can settle on its own (`WAIT`'s timer, SAY_DONE).
    /// Returns `false` when the session should shut down entirely.
    async fn drive(&mut self, mut outcome: Outcome, rx: &mut Receiver<Event>, sink: &mut ChannelSink) -> bool {
        loop {
            match outcome {
                Outcome::Ready => {
                    self.waiting = Waiting::None;
                    self.cancel.store(false, Ordering::Relaxed);
                    return true;
                }
                Outcome::Quit => {
                    self.waiting = Waiting::None;
                    return false;
                }
                Outcome::NeedsInput { prompt } => {
                    self.waiting = Waiting::Input;
                    Self::emit_prompt(prompt, sink);
                    return true;
                }
                Outcome::NeedsSayDone => {
                    self.waiting = Waiting::SayDone;
                    match Self::wait_for_say_done(rx, &self.cancel).await {
                        Some(()) => outcome = self.resume_say(sink),
                        None => return false,
                    }
                }
                Outcome::NeedsWait { ms } => {
                    self.waiting = Waiting::Wait;
                    match Self::wait_for_timer_or_break(rx, &self.cancel, ms).await {
                        Some(()) => outcome = self.resume_wait(sink),
                        None => return false,
                    }
                }
            }
        }
    }

    /// Waits for either `Event::SayDone` or a cancellation; ignores any
    /// other event that arrives while a blocking `SPEAK` is in flight.
    /// Returns `None` only on `Shutdown`/channel close.
    async fn wait_for_say_done(rx: &mut Receiver<Event>, cancel: &Arc<AtomicBool>) -> Option<()> {
        loop {
            match rx.recv().await? {
                Event::SayDone => return Some(()),
                Event::Input(InMessage::Break) => {
                    cancel.store(true, Ordering::Relaxed);
                    return Some(());
                }
                Event::Shutdown => return None,
                _ => {}
            }
        }
    }

    /// Waits for the `WAIT ms` timer to elapse or for a cancellation,
    /// whichever comes first (spec.md §5: "the mutex is released during
    /// the sleep" — here, nothing else holds the interpreter at all, so
    /// releasing it is just not calling into it until one of these fires).
    async fn wait_for_timer_or_break(rx: &mut Receiver<Event>, cancel: &Arc<AtomicBool>, ms: f64) -> Option<()> {
        let sleep = tokio::time::sleep(Duration::from_millis(ms.max(0.0) as u64));
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return Some(()),
                ev = rx.recv() => match ev? {
                    Event::Input(InMessage::Break) => {
                        cancel.store(true, Ordering::Relaxed);
                        return Some(());
                    }
                    Event::Shutdown => return None,
                    _ => continue,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::SESSION_CHANNEL_CAP;
    use tokio::sync::mpsc;

    async fn drain_text(out_rx: &mut mpsc::Receiver<OutMessage>) -> Vec<String> {
        let mut texts = Vec::new();
        while let Ok(msg) = out_rx.try_recv() {
            if let OutMessage::Text { text, .. } = msg {
                texts.push(text);
            }
        }
        texts
    }

    #[tokio::test]
    async fn direct_mode_print_reaches_output_channel() {
        let (tx, rx) = mpsc::channel(SESSION_CHANNEL_CAP);
        let (out_tx, mut out_rx) = mpsc::channel(SESSION_CHANNEL_CAP);
        let session = Session::new(core_config::SessionLimits::default());
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let handle = tokio::task::spawn_local(session.run(rx, out_tx));
                tx.send(Event::Input(InMessage::Direct("PRINT 1+2".to_string()))).await.unwrap();
                tx.send(Event::Shutdown).await.unwrap();
                drop(tx);
                let _ = handle.await;
            })
            .await;
        let texts = drain_text(&mut out_rx).await;
        assert!(texts.contains(&"3".to_string()));
    }

    #[tokio::test]
    async fn program_run_and_input_reply_roundtrip() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let (tx, rx) = mpsc::channel(SESSION_CHANNEL_CAP);
                let (out_tx, mut out_rx) = mpsc::channel(SESSION_CHANNEL_CAP);
                let mut session = Session::new(core_config::SessionLimits::default());
                session.interp.edit_line(10, "INPUT \"NAME\"; N$");
                session.interp.edit_line(20, "PRINT \"HI \";N$");
                let handle = tokio::task::spawn_local(session.run(rx, out_tx));
                tx.send(Event::Input(InMessage::Direct("RUN".to_string()))).await.unwrap();
                tx.send(Event::Input(InMessage::InputReply("ADA".to_string()))).await.unwrap();
                tx.send(Event::Shutdown).await.unwrap();
                drop(tx);
                let _ = handle.await;
                let texts = drain_text(&mut out_rx).await;
                assert!(texts.iter().any(|t| t.contains("HI ADA")));
            })
            .await;
    }

    #[tokio::test]
    async fn break_during_wait_terminates_the_program() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let (tx, rx) = mpsc::channel(SESSION_CHANNEL_CAP);
                let (out_tx, mut out_rx) = mpsc::channel(SESSION_CHANNEL_CAP);
                let mut session = Session::new(core_config::SessionLimits::default());
                session.interp.edit_line(10, "WAIT 60000");
                session.interp.edit_line(20, "PRINT \"UNREACHABLE\"");
                let handle = tokio::task::spawn_local(session.run(rx, out_tx));
                tx.send(Event::Input(InMessage::Direct("RUN".to_string()))).await.unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;
                tx.send(Event::Input(InMessage::Break)).await.unwrap();
                tx.send(Event::Shutdown).await.unwrap();
                drop(tx);
                let _ = handle.await;
                let texts = drain_text(&mut out_rx).await;
                assert!(!texts.iter().any(|t| t.contains("UNREACHABLE")));
            })
            .await;
    }
}
