#![allow(dead_code)]

use http::header::{HeaderValue, RETRY_AFTER};
use http::StatusCode;
use retryhook::{HttpResponse, RetryPolicy, TrackingSleeper, TransportError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;

pub type Reply = Result<HttpResponse, TransportError>;

/// Fake HTTP endpoint answering from a script, then `200 ok` once the script runs out.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEndpoint {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedEndpoint {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().collect())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn send(&self) -> Reply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| status(200))
    }
}

pub fn status(code: u16) -> Reply {
    let status = StatusCode::from_u16(code).unwrap();
    Ok(HttpResponse::new(status, format!("status {code}")))
}

pub fn rate_limited(seconds: u64) -> Reply {
    let value = HeaderValue::from_str(&seconds.to_string()).unwrap();
    let response = HttpResponse::new(StatusCode::TOO_MANY_REQUESTS, "slow down");
    Ok(response.with_header(RETRY_AFTER, value))
}

/// Default-schedule policy whose waits are recorded instead of slept.
pub fn tracked_policy(max_attempts: usize) -> (RetryPolicy, TrackingSleeper) {
    let sleeper = TrackingSleeper::new();
    let policy = RetryPolicy::builder()
        .name("webhook")
        .max_attempts(max_attempts)
        .with_sleeper(sleeper.clone())
        .build()
        .unwrap();
    (policy, sleeper)
}

pub fn secs(values: &[u64]) -> Vec<Duration> {
    values.iter().copied().map(Duration::from_secs).collect()
}

#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogGuard;
    fn make_writer(&'a self) -> Self::Writer {
        LogGuard(self.0.clone())
    }
}

pub struct LogGuard(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogGuard {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Route DEBUG and above into a buffer for the current thread until the guard drops.
pub fn capture_logs() -> (LogBuffer, DefaultGuard) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(BoxMakeWriter::new(buffer.clone()))
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .without_time()
        .finish();
    (buffer, tracing::subscriber::set_default(subscriber))
}
