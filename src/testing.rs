//! Scripted stand-ins for the source and sink, shared by unit tests.

use std::{
    collections::VecDeque,
    io,
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
    time::Duration,
};

use chrono::DateTime;
use serde_json::Value;
use tokio::io::AsyncWrite;

use crate::{
    carbon_sender::SinkConnector,
    error::SourceError,
    schema::Snapshot,
    sources::StatusSource,
};

/// Asserts two durations are within a couple of timer ticks.
pub fn assert_close(actual: Duration, expected: Duration) {
    let diff = actual.abs_diff(expected);
    assert!(
        diff <= Duration::from_millis(5),
        "expected ~{expected:?}, got {actual:?}"
    );
}

enum SourceStep {
    Ok(Value),
    Transient,
    Fatal(&'static str),
    Stall(Duration),
    Slow(Duration, Value),
}

/// Source that replays a fixed script, then repeats its last success.
pub struct ScriptedSource {
    steps: VecDeque<SourceStep>,
    last_ok: Option<Value>,
    seen_sections: Arc<Mutex<Vec<Vec<String>>>>,
    local_time: i64,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            steps: VecDeque::new(),
            last_ok: None,
            seen_sections: Arc::default(),
            local_time: 1_000,
        }
    }

    pub fn ok(mut self, document: Value) -> Self {
        self.steps.push_back(SourceStep::Ok(document));
        self
    }

    pub fn transient(mut self, times: usize) -> Self {
        for _ in 0..times {
            self.steps.push_back(SourceStep::Transient);
        }
        self
    }

    pub fn fatal(mut self, reason: &'static str) -> Self {
        self.steps.push_back(SourceStep::Fatal(reason));
        self
    }

    /// Never answers within `delay`.
    pub fn stall(mut self, delay: Duration) -> Self {
        self.steps.push_back(SourceStep::Stall(delay));
        self
    }

    /// Answers after `delay`.
    pub fn slow(mut self, delay: Duration, document: Value) -> Self {
        self.steps.push_back(SourceStep::Slow(delay, document));
        self
    }

    pub fn seen_sections(&self) -> Arc<Mutex<Vec<Vec<String>>>> {
        self.seen_sections.clone()
    }

    fn snapshot(&mut self, document: Value) -> Snapshot {
        self.last_ok = Some(document.clone());
        let local_time = DateTime::from_timestamp(self.local_time, 0).unwrap();
        self.local_time += 1;
        Snapshot::new(local_time, document)
    }
}

#[async_trait::async_trait]
impl StatusSource for ScriptedSource {
    fn target(&self) -> &str {
        "scripted"
    }

    async fn server_status(&mut self, disabled_sections: &[String]) -> Result<Snapshot, SourceError> {
        self.seen_sections.lock().unwrap().push(disabled_sections.to_vec());

        let step = match self.steps.pop_front() {
            Some(step) => step,
            None => SourceStep::Ok(self.last_ok.clone().expect("script exhausted")),
        };

        match step {
            SourceStep::Ok(document) => Ok(self.snapshot(document)),
            SourceStep::Transient => Err(SourceError::Transient("connection closed".into())),
            SourceStep::Fatal(reason) => Err(SourceError::Fatal(anyhow::anyhow!(reason))),
            SourceStep::Stall(delay) => {
                tokio::time::sleep(delay).await;
                Err(SourceError::Transient("stalled".into()))
            }
            SourceStep::Slow(delay, document) => {
                tokio::time::sleep(delay).await;
                Ok(self.snapshot(document))
            }
        }
    }
}

/// What the next write on a scripted stream does.
#[derive(Debug, Clone, Copy)]
pub enum WriteStep {
    Accept,
    Partial(usize),
    Fail(io::ErrorKind),
    /// Never completes; the caller's timeout fires.
    Stall,
}

#[derive(Default)]
struct Shared {
    writes: VecDeque<WriteStep>,
    connect_failures: VecDeque<io::ErrorKind>,
    written: Vec<Vec<u8>>,
    connects: usize,
    shutdowns: usize,
}

/// Connector whose streams follow a shared write script.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    shared: Arc<Mutex<Shared>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, step: WriteStep) -> Self {
        self.shared.lock().unwrap().writes.push_back(step);
        self
    }

    pub fn refuse_connect(self, kind: io::ErrorKind) -> Self {
        self.shared.lock().unwrap().connect_failures.push_back(kind);
        self
    }

    /// Every buffer that was accepted, in order.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.shared.lock().unwrap().written.clone()
    }

    pub fn connects(&self) -> usize {
        self.shared.lock().unwrap().connects
    }

    pub fn shutdowns(&self) -> usize {
        self.shared.lock().unwrap().shutdowns
    }
}

#[async_trait::async_trait]
impl SinkConnector for ScriptedConnector {
    type Stream = ScriptedStream;

    fn describe(&self) -> String {
        "scripted".into()
    }

    async fn connect(&self) -> io::Result<ScriptedStream> {
        let mut shared = self.shared.lock().unwrap();
        if let Some(kind) = shared.connect_failures.pop_front() {
            return Err(kind.into());
        }
        shared.connects += 1;
        Ok(ScriptedStream {
            shared: self.shared.clone(),
            stalled: false,
        })
    }
}

pub struct ScriptedStream {
    shared: Arc<Mutex<Shared>>,
    // a stalled stream stays stalled, even when polled again
    stalled: bool,
}

impl AsyncWrite for ScriptedStream {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.stalled {
            return Poll::Pending;
        }

        let mut shared = this.shared.lock().unwrap();
        match shared.writes.pop_front().unwrap_or(WriteStep::Accept) {
            WriteStep::Accept => {
                shared.written.push(buf.to_vec());
                Poll::Ready(Ok(buf.len()))
            }
            WriteStep::Partial(n) => {
                let n = n.min(buf.len());
                shared.written.push(buf[..n].to_vec());
                Poll::Ready(Ok(n))
            }
            WriteStep::Fail(kind) => Poll::Ready(Err(kind.into())),
            WriteStep::Stall => {
                this.stalled = true;
                Poll::Pending
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.shared.lock().unwrap().shutdowns += 1;
        Poll::Ready(Ok(()))
    }
}
