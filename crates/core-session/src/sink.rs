//! Forwards `Interpreter` output straight onto the session's outbound
//! channel. The channel is bounded (spec.md §5: "all output leaves
//! through a message sink"); a full channel means the consumer has
//! stopped draining, which is a host-side problem, not one the running
//! program should fault over, so a dropped send is counted rather than
//! propagated.

use core_events::{OutMessage, CHANNEL_SEND_FAILURES};
use core_interp::MessageSink;
use std::sync::atomic::Ordering;
use tokio::sync::mpsc::Sender;
use tracing::warn;

pub struct ChannelSink {
    tx: Sender<OutMessage>,
}

impl ChannelSink {
    pub fn new(tx: Sender<OutMessage>) -> Self {
        Self { tx }
    }
}

impl MessageSink for ChannelSink {
    fn send(&mut self, msg: OutMessage) {
        if self.tx.try_send(msg).is_err() {
            CHANNEL_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
            warn!(target: "session.sink", "output channel full or closed, message dropped");
        }
    }
}
