//! Minimal CLI host: wires one [`core_session::Session`] to stdin/stdout.
//! Spec.md scopes the remote front-end/host shell out of this crate's
//! responsibility; this binary exists so the interpreter can actually be
//! exercised locally, the same role `ox-bin` plays for the teacher's
//! editor crates (startup/logging bootstrap, one `Event` channel, one
//! `OutMessage` channel, nothing rendering-specific).

use anyhow::Result;
use clap::Parser;
use core_events::{Event, InMessage, OutMessage, EventSourceRegistry, TickEventSource, SESSION_CHANNEL_CAP};
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "basic-online", version, about = "Sandboxed BASIC session host")]
struct Args {
    /// Program file to LOAD before handing control to the user.
    path: Option<PathBuf>,
    /// Configuration file path (overrides discovery of `basic.toml`).
    #[arg(long = "config")]
    config: Option<PathBuf>,
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join("basic-online.log");
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }
        let file_appender = tracing_appender::rolling::never(log_dir, "basic-online.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .try_init()
        {
            Ok(_) => self.log_guard = Some(guard),
            Err(_) => {
                // A global subscriber is already installed (e.g. under test); drop the guard.
            }
        }
        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

/// Prints everything the session hands back, the way a real front-end's
/// text-mode renderer would (spec.md's remote front-end is out of scope;
/// this just proves the wire format round-trips to something readable).
async fn print_loop(mut rx: mpsc::Receiver<OutMessage>) {
    let mut stdout = tokio::io::stdout();
    while let Some(msg) = rx.recv().await {
        let rendered = match msg {
            OutMessage::Text { text, no_newline, .. } => {
                if no_newline {
                    text
                } else {
                    format!("{text}\n")
                }
            }
            OutMessage::ClearScreen => "\x1b[2J\x1b[H".to_string(),
            OutMessage::Terminated { line, message } => match line {
                Some(n) => format!("{message} IN LINE {n}\n"),
                None => format!("{message}\n"),
            },
            OutMessage::Say { text, .. } => format!("[SAY] {text}\n"),
            // Graphics/sound/sprite/vector/particle/editor/input-control messages have no
            // text-terminal rendering; a real front-end consumes the typed payload directly.
            _ => continue,
        };
        if stdout.write_all(rendered.as_bytes()).await.is_err() {
            break;
        }
        let _ = stdout.flush().await;
    }
}

/// Reads stdin line by line, classifies each line (spec.md §6), and feeds
/// it to the session as an `Event::Input`.
async fn stdin_loop(tx: mpsc::Sender<Event>) {
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let msg = InMessage::classify(&line);
                if tx.send(Event::Input(msg)).await.is_err() {
                    break;
                }
            }
            Ok(None) => {
                let _ = tx.send(Event::Shutdown).await;
                break;
            }
            Err(e) => {
                error!(target: "host.stdin", error = %e, "stdin read error");
                break;
            }
        }
    }
}

fn main() -> Result<()> {
    let mut startup = AppStartup::new();
    startup.configure_logging()?;
    AppStartup::install_panic_hook();
    info!(target: "runtime", "startup");

    let args = Args::parse();
    let config = core_config::load_from(args.config)?;

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    let local = tokio::task::LocalSet::new();
    local.block_on(&runtime, async move {
        let (in_tx, in_rx) = mpsc::channel::<Event>(SESSION_CHANNEL_CAP);
        let (out_tx, out_rx) = mpsc::channel::<OutMessage>(SESSION_CHANNEL_CAP);

        let mut registry = EventSourceRegistry::new();
        registry.register(TickEventSource::new(Duration::from_millis(250)));
        let source_handles = registry.spawn_all(&in_tx);

        let session = core_session::Session::new(config.limits);
        if let Some(path) = args.path.as_ref() {
            match std::fs::read_to_string(path) {
                Ok(text) => {
                    for raw in text.lines() {
                        let raw = raw.trim();
                        if raw.is_empty() {
                            continue;
                        }
                        let _ = in_tx.send(Event::Input(InMessage::classify(raw))).await;
                    }
                }
                Err(e) => error!(target: "host.startup", path = %path.display(), error = %e, "could not read startup program"),
            }
        }

        let print_task = tokio::spawn(print_loop(out_rx));
        let stdin_task = tokio::task::spawn_local(stdin_loop(in_tx));
        let session_task = tokio::task::spawn_local(session.run(in_rx, out_tx));

        let _ = session_task.await;
        for h in source_handles {
            let _ = tokio::time::timeout(Duration::from_millis(200), h).await;
        }
        stdin_task.abort();
        let _ = tokio::time::timeout(Duration::from_millis(200), print_task).await;
    });

    Ok(())
}
