//! Progress and log events emitted by a translation run.
//!
//! The pipeline only ever produces events; whoever renders them owns the
//! receiving half of the channel. Events are observational and never feed
//! back into control flow.

use std::fmt;
use std::path::PathBuf;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

/// `tracing` target of the log events an [`EventSink`] mirrors
pub const EVENT_TARGET: &str = "subtrans::events";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// Batch lifecycle notifications
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    /// `first..=last` is the span of 1-based cue positions the batch covers.
    /// Already-translated and empty cues are skipped, so the span may have
    /// gaps; `size` is the number of items actually sent.
    Started {
        number: usize,
        first: usize,
        last: usize,
        size: usize,
    },
    Succeeded {
        number: usize,
    },
    PartiallySucceeded {
        number: usize,
        received: usize,
        expected: usize,
    },
    Retrying {
        number: usize,
        attempt: u32,
        max_attempts: u32,
        delay_ms: u64,
        error: String,
    },
    Exhausted {
        number: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Log { level: LogLevel, text: String },
    /// Percent complete, 0..=100
    Progress(u8),
    Batch(BatchEvent),
    Finished { output: PathBuf },
    Failed { message: String },
}

/// Sending half of the event stream.
///
/// Sends never block and a dropped receiver is ignored. Log events are also
/// mirrored to `tracing`.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<PipelineEvent>>,
}

impl EventSink {
    pub fn new(tx: UnboundedSender<PipelineEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Sink that only logs through `tracing`
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn channel() -> (Self, UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send(&self, event: PipelineEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    pub fn log(&self, level: LogLevel, text: impl Into<String>) {
        let text = text.into();
        match level {
            LogLevel::Debug => debug!(target: EVENT_TARGET, "{}", text),
            LogLevel::Info => info!(target: EVENT_TARGET, "{}", text),
            LogLevel::Warn => warn!(target: EVENT_TARGET, "{}", text),
            LogLevel::Error => error!(target: EVENT_TARGET, "{}", text),
        }
        self.send(PipelineEvent::Log { level, text });
    }

    pub fn debug(&self, text: impl Into<String>) {
        self.log(LogLevel::Debug, text);
    }

    pub fn info(&self, text: impl Into<String>) {
        self.log(LogLevel::Info, text);
    }

    pub fn warn(&self, text: impl Into<String>) {
        self.log(LogLevel::Warn, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.log(LogLevel::Error, text);
    }

    pub fn progress(&self, percent: u8) {
        self.send(PipelineEvent::Progress(percent.min(100)));
    }

    pub fn batch(&self, event: BatchEvent) {
        self.send(PipelineEvent::Batch(event));
    }

    pub fn finished(&self, output: PathBuf) {
        self.send(PipelineEvent::Finished { output });
    }

    pub fn failed(&self, message: impl Into<String>) {
        self.send(PipelineEvent::Failed { message: message.into() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_order() {
        let (sink, mut rx) = EventSink::channel();
        sink.info("starting");
        sink.progress(150);
        sink.batch(BatchEvent::Succeeded { number: 1 });

        assert_eq!(
            rx.try_recv().unwrap(),
            PipelineEvent::Log { level: LogLevel::Info, text: "starting".to_string() }
        );
        assert_eq!(rx.try_recv().unwrap(), PipelineEvent::Progress(100));
        assert_eq!(
            rx.try_recv().unwrap(),
            PipelineEvent::Batch(BatchEvent::Succeeded { number: 1 })
        );
    }

    #[test]
    fn test_event_target_is_this_module() {
        assert_eq!(EVENT_TARGET, module_path!());
    }

    #[test]
    fn test_closed_receiver_is_ignored() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.warn("nobody listening");
        EventSink::disabled().error("also fine");
    }
}
