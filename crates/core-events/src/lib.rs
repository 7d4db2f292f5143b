//! Message/event types and channel plumbing shared by the session glue,
//! the external I/O commands, and the VM's cooperative suspension points.
//!
//! `OutMessage` is the one thing the core is allowed to produce for the
//! (out of scope) remote front-end: every graphics/sprite/sound/text
//! primitive is a typed, `serde`-serializable value, never a raw string.
//! `InMessage` is everything the host can hand back in: a program-store
//! edit, a direct-mode statement, an `INPUT` reply, or a cancellation.

use std::sync::atomic::AtomicU64;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

/// Bounded channel capacity for the output message channel. Sized the same
/// way the teacher sizes its event channel: generous enough that a single
/// producer/single consumer pair never blocks under normal program output,
/// while still bounding memory if the consumer stalls.
pub const SESSION_CHANNEL_CAP: usize = 4096;

/// Default sprite-message batching window (spec.md §4.I: "auto-flush at
/// ≤32 entries or after a ≤5 ms idle gap").
pub const SPRITE_BATCH_MAX_ENTRIES: usize = 32;
pub const SPRITE_BATCH_IDLE: Duration = Duration::from_millis(5);

pub static CHANNEL_SEND_FAILURES: AtomicU64 = AtomicU64::new(0);

/// One 0-15 gray brightness, or a named/hex color string, resolved to a
/// hex gray string by `core-io` at emit time (spec.md: "rendered to a hex
/// string at emit time").
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Color {
    Brightness(u8),
    Named(String),
    Hex(String),
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GraphicsCommand {
    Plot { x: f64, y: f64, color: Color },
    Line { x1: f64, y1: f64, x2: f64, y2: f64, color: Color },
    Rect { x: f64, y: f64, w: f64, h: f64, color: Color },
    Circle { x: f64, y: f64, r: f64, color: Color },
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SoundCommand {
    Beep,
    Tone { freq: f64, duration_ms: f64 },
    Noise { pitch: f64, amplitude: f64, duration_ms: f64 },
    Music { file: String },
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpriteCommand {
    DefineSprite { id: u32, width: u32, height: u32, pixels: Vec<u8> },
    UpdateSprite { id: u32, x: f64, y: f64, rotation_rad: f64, visible: bool },
    DefineVirtualSprite { id: u32, layout: String, width: u32, height: u32, pixels: Vec<u8> },
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VectorCommand {
    UpdateVector {
        id: u32,
        shape: String,
        x: f64,
        y: f64,
        z: f64,
        rotation_rad: (f64, f64, f64),
        scale: f64,
        visible: bool,
        brightness: u8,
        custom: Option<serde_json::Value>,
    },
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticleCommand {
    CreateEmitter { id: u32, x: f64, y: f64 },
    MoveEmitter { id: u32, x: f64, y: f64 },
    ShowEmitter { id: u32 },
    HideEmitter { id: u32 },
    SetGravity { id: u32, gravity: f64 },
}

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InputControl {
    Enable,
    Disable,
    RunMode(bool),
}

/// Everything the core is allowed to emit towards the (out of scope)
/// remote display. One message per semantic action, in program order;
/// sprite commands may be internally batched by `core-io` but a batch is
/// still sent as one ordered group (spec.md §5: "no message is reordered
/// across a batch boundary").
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutMessage {
    Text { text: String, no_newline: bool, inverse: bool, session_id: Option<String> },
    ClearScreen,
    Locate { x: u32, y: u32 },
    InverseToggle(bool),
    Graphics(GraphicsCommand),
    Sound(SoundCommand),
    Sprite(Vec<SpriteCommand>),
    Vector(VectorCommand),
    Particle(ParticleCommand),
    Sfx { effect: String, variant: Option<u8> },
    /// `SAY`/`SPEAK text`. `blocking` marks a `SPEAK` that suspends the
    /// program on the SAY_DONE rendezvous until the front-end finishes
    /// playback; a non-blocking `SAY` fires and forgets.
    Say { text: String, blocking: bool },
    InputControlMsg(InputControl),
    Editor(serde_json::Value),
    MusicStop,
    Terminated { line: Option<u32>, message: String },
}

/// Everything the host can hand back into a running session.
#[derive(Debug, Clone, PartialEq)]
pub enum InMessage {
    /// `<line#> <code>` program-store edit (empty code deletes the line).
    ProgramLine { line: u32, code: String },
    /// A direct-mode statement (no leading line number).
    Direct(String),
    /// A reply to a pending `INPUT`.
    InputReply(String),
    /// `__BREAK__`: request immediate cancellation of the running program.
    Break,
}

impl InMessage {
    /// Classifies a raw trimmed line the way spec.md §6 describes:
    /// `__BREAK__` cancels; a leading positive integer is a program edit;
    /// anything else is a direct-mode statement.
    pub fn classify(line: &str) -> InMessage {
        let trimmed = line.trim_end();
        if trimmed == "__BREAK__" {
            return InMessage::Break;
        }
        let mut chars = trimmed.char_indices();
        let mut end = 0;
        for (i, c) in chars.by_ref() {
            if c.is_ascii_digit() {
                end = i + 1;
            } else {
                break;
            }
        }
        if end > 0 {
            if let Ok(n) = trimmed[..end].parse::<u32>() {
                if n > 0 {
                    let code = trimmed[end..].trim_start();
                    return InMessage::ProgramLine { line: n, code: code.to_string() };
                }
            }
        }
        InMessage::Direct(trimmed.to_string())
    }
}

/// Internal scheduling events driving the session's single cooperative
/// task, distinct from the `OutMessage` wire type above.
#[derive(Debug, Clone)]
pub enum Event {
    Input(InMessage),
    Tick,
    SayDone,
    Shutdown,
}

pub type EventResult<T> = anyhow::Result<T>;

/// Implemented by any async producer feeding the session's event channel
/// (periodic ticks today; future producers such as a plugin host or
/// timer-driven sprite-batch flush can register the same way).
pub trait AsyncEventSource: Send + 'static {
    fn name(&self) -> &'static str;
    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()>;
}

pub struct TickEventSource {
    interval: Duration,
}

impl TickEventSource {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl AsyncEventSource for TickEventSource {
    fn name(&self) -> &'static str {
        "tick"
    }
    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
        let dur = self.interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(dur);
            loop {
                interval.tick().await;
                if tx.send(Event::Tick).await.is_err() {
                    break;
                }
            }
        })
    }
}

#[derive(Default)]
pub struct EventSourceRegistry {
    sources: Vec<Box<dyn AsyncEventSource>>,
}

impl EventSourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<S: AsyncEventSource>(&mut self, src: S) {
        self.sources.push(Box::new(src));
    }

    pub fn spawn_all(&mut self, tx: &Sender<Event>) -> Vec<JoinHandle<()>> {
        let mut out = Vec::with_capacity(self.sources.len());
        for src in self.sources.drain(..) {
            let name = src.name();
            tracing::info!(target: "session.events", source = name, "spawning event source");
            out.push(src.spawn(tx.clone()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_program_line() {
        assert_eq!(
            InMessage::classify("10 PRINT \"HI\""),
            InMessage::ProgramLine { line: 10, code: "PRINT \"HI\"".to_string() }
        );
    }

    #[test]
    fn classify_line_delete_has_empty_code() {
        assert_eq!(InMessage::classify("10"), InMessage::ProgramLine { line: 10, code: String::new() });
    }

    #[test]
    fn classify_direct_statement() {
        assert_eq!(InMessage::classify("PRINT 1"), InMessage::Direct("PRINT 1".to_string()));
    }

    #[test]
    fn classify_break_token() {
        assert_eq!(InMessage::classify("__BREAK__"), InMessage::Break);
    }

    #[tokio::test]
    async fn tick_source_emits_events() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        let mut reg = EventSourceRegistry::new();
        reg.register(TickEventSource::new(Duration::from_millis(5)));
        let handles = reg.spawn_all(&tx);
        let ev = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await.unwrap().unwrap();
        assert!(matches!(ev, Event::Tick));
        drop(tx);
        for h in handles {
            let _ = tokio::time::timeout(Duration::from_millis(50), h).await;
        }
    }

    #[test]
    fn out_message_round_trips_json() {
        let msg = OutMessage::Text { text: "HI".into(), no_newline: false, inverse: false, session_id: None };
        let json = serde_json::to_string(&msg).unwrap();
        let back: OutMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }
}
