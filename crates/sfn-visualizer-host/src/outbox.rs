//! Queue of server-initiated notifications, flushed by the transport.

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;

use sfn_visualizer::OutputChannel;

use crate::types::{Notification, LogMessageParams, LOG_MESSAGE};

/// Sending half; cheap to clone and usable from synchronous callbacks.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    pub fn notify(&self, method: &str, params: &impl Serialize) {
        let notification = Notification::with_params(method, params);
        if self.tx.send(notification).is_err() {
            tracing::debug!("Outbox closed, dropping {method}");
        }
    }
}

/// Receiving half.
pub struct Outbox {
    rx: Mutex<mpsc::UnboundedReceiver<Notification>>,
}

impl Outbox {
    pub fn channel() -> (Notifier, Outbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Notifier { tx }, Outbox { rx: Mutex::new(rx) })
    }

    /// Everything queued so far, oldest first.
    pub fn drain(&self) -> Vec<Notification> {
        let mut rx = self.rx.lock();
        let mut drained = Vec::new();
        while let Ok(notification) = rx.try_recv() {
            drained.push(notification);
        }
        drained
    }
}

/// Logger output channel that forwards each line as `window/logMessage`.
pub struct LogMessageChannel {
    notifier: Notifier,
}

impl LogMessageChannel {
    pub fn new(notifier: Notifier) -> Self {
        Self { notifier }
    }
}

impl OutputChannel for LogMessageChannel {
    fn append_line(&self, line: &str) {
        self.notifier.notify(
            LOG_MESSAGE,
            &LogMessageParams {
                message: line.to_string(),
            },
        );
    }
}
