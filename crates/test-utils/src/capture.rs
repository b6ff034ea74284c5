//! A tracing layer that keeps every event message with the time it was
//! emitted, for tests that assert on log output and its timing.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

#[derive(Debug, Clone)]
pub struct CapturedLine {
    pub at: Instant,
    pub message: String,
}

/// Cloneable handle; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct CaptureLayer {
    lines: Arc<Mutex<Vec<CapturedLine>>>,
}

impl CaptureLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<CapturedLine> {
        self.lines.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lines().into_iter().map(|l| l.message).collect()
    }

    /// First captured line equal to `message`.
    pub fn find(&self, message: &str) -> Option<CapturedLine> {
        self.lines().into_iter().find(|l| l.message == message)
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.lines.lock().unwrap().push(CapturedLine {
            at: Instant::now(),
            message: visitor.message,
        });
    }
}
