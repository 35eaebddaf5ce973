//! In-memory transport and clock fakes for unit tests.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Request, Response, Url};
use tracing::subscriber::DefaultGuard;

use super::client::HttpClient;
use super::sleeper::Sleeper;

type Responder = Box<dyn Fn(&Request) -> (u16, String) + Send + Sync>;

enum Script {
    Queue(Mutex<VecDeque<(u16, String)>>),
    Responder(Responder),
}

/// What the fake transport saw.
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub url: Url,
    pub headers: HeaderMap,
    pub timeout: Option<Duration>,
}

impl RecordedRequest {
    pub fn query(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }
}

/// An [`HttpClient`] that answers from a script instead of the network.
pub(crate) struct ScriptedClient {
    script: Script,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedClient {
    /// Replies in order; once the queue is empty every request gets a 500.
    pub fn new<'a>(replies: impl IntoIterator<Item = (u16, &'a str)>) -> Self {
        let queue = replies
            .into_iter()
            .map(|(status, body)| (status, body.to_string()))
            .collect();
        Self {
            script: Script::Queue(Mutex::new(queue)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always(status: u16, body: &str) -> Self {
        let body = body.to_string();
        Self::responder(move |_| (status, body.clone()))
    }

    pub fn responder(f: impl Fn(&Request) -> (u16, String) + Send + Sync + 'static) -> Self {
        Self {
            script: Script::Responder(Box::new(f)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpClient for ScriptedClient {
    async fn execute(&self, req: Request) -> reqwest::Result<Response> {
        self.requests.lock().unwrap().push(RecordedRequest {
            url: req.url().clone(),
            headers: req.headers().clone(),
            timeout: req.timeout().copied(),
        });

        let (status, body) = match &self.script {
            Script::Queue(queue) => queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or((500, "script exhausted".to_string())),
            Script::Responder(f) => f(&req),
        };

        let resp = http::Response::builder()
            .status(status)
            .body(body)
            .expect("scripted response");
        Ok(Response::from(resp))
    }
}

/// A [`Sleeper`] that records requested waits and returns immediately.
#[derive(Default)]
pub(crate) struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }

    pub fn total(&self) -> Duration {
        self.waits().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
    }
}

/// Log lines emitted while a [`capture_logs`] guard is alive.
#[derive(Clone, Default)]
pub(crate) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Routes this thread's tracing events into a buffer until the guard drops.
/// Works with `#[tokio::test]`'s current-thread runtime.
pub(crate) fn capture_logs() -> (DefaultGuard, CapturedLogs) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(move || writer.clone())
        .finish();
    (tracing::subscriber::set_default(subscriber), logs)
}
