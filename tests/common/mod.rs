//! Shared utilities for integration tests.

#![allow(dead_code)]

use runlevel::lifecycle::{Application, Exit, RunState};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

/// A captured tracing event.
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    fn mentions(&self, needle: &str) -> bool {
        self.message.contains(needle) || self.fields.iter().any(|(_, v)| v.contains(needle))
    }
}

/// Events recorded while a [`capture_logs`] guard is alive.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CapturedLogs {
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Number of events at `level` whose message or fields contain `needle`.
    pub fn count(&self, level: Level, needle: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.level == level && e.mentions(needle))
            .count()
    }

    pub fn has(&self, level: Level, needle: &str) -> bool {
        self.count(level, needle) > 0
    }
}

struct CaptureLayer {
    logs: CapturedLogs,
}

struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let value = format!("{value:?}");
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.push((field.name().to_string(), value));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor {
            message: String::new(),
            fields: Vec::new(),
        };
        event.record(&mut visitor);
        self.logs.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

/// Capture events on the current thread until the guard is dropped.
///
/// Works with the default current-thread `#[tokio::test]` runtime, where every
/// spawned task runs on the test thread.
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::registry().with(CaptureLayer { logs: logs.clone() });
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}

/// [`Exit`] that records codes instead of ending the process.
pub struct RecordingExit {
    tx: mpsc::UnboundedSender<i32>,
    log: Option<Arc<Mutex<Vec<String>>>>,
}

impl RecordingExit {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<i32>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, log: None }, rx)
    }

    /// Also append `exit:<code>` to a shared ordering log.
    pub fn with_log(log: Arc<Mutex<Vec<String>>>) -> (Self, mpsc::UnboundedReceiver<i32>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, log: Some(log) }, rx)
    }
}

impl Exit for RecordingExit {
    fn exit(&self, code: i32) {
        if let Some(log) = &self.log {
            log.lock().unwrap().push(format!("exit:{code}"));
        }
        let _ = self.tx.send(code);
    }
}

/// Spawn `start` and wait until the application reports `started`.
pub async fn start_in_background(app: &Application) -> tokio::task::JoinHandle<runlevel::Result<()>> {
    let handle = tokio::spawn({
        let app = app.clone();
        async move { app.start().await }
    });
    wait_for_state(app, RunState::Started).await;
    handle
}

pub async fn wait_for_state(app: &Application, state: RunState) {
    tokio::time::timeout(
        Duration::from_secs(5),
        app.subscribe().wait_for(|current| *current == state),
    )
    .await
    .expect("timed out waiting for run state")
    .expect("state channel closed");
}

/// Yield until `condition` holds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
