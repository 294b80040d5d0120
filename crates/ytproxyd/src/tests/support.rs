//! Shared doubles for the behavioural suites.

use std::collections::VecDeque;
use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde_json::{Value, json};

use ytproxy_config::{Config, ListenEndpoint};

use crate::browser::{
    ApiMethod, BrowserError, BrowserService, FetchOutcome, FetchStatus, UpstreamFragment,
};
use crate::executor::{ExecutorError, ExecutorSettings};
use crate::health::HealthReporter;
use crate::process::{LaunchError, ShutdownToken};
use crate::server::{RunningServer, Server, ServerSettings};
use crate::test_support::read_frame;

/// URL that makes the scripted browser block until its gate opens.
pub(super) const HOLD_URL: &str = "hold";
/// URL that makes the scripted browser report a transport failure.
pub(super) const TRANSPORT_ERROR_URL: &str = "transport-error";
/// URL that makes the scripted browser find nothing.
pub(super) const EMPTY_URL: &str = "empty";
/// URL that makes the scripted browser panic.
pub(super) const PANIC_URL: &str = "panic";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum HealthEvent {
    StartupStarting,
    StartupSucceeded,
    StartupFailed(String),
    Listening,
    BrowserReady,
    BrowserFailed,
    ExecutorFailed,
    ShutdownStarted,
    ShutdownCompleted,
}

#[derive(Debug, Default)]
pub(super) struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    pub(super) fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn startup_starting(&self) {
        self.record(HealthEvent::StartupStarting);
    }

    fn startup_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::StartupSucceeded);
    }

    fn startup_failed(&self, error: &LaunchError) {
        self.record(HealthEvent::StartupFailed(error.to_string()));
    }

    fn listening(&self, _addr: SocketAddr) {
        self.record(HealthEvent::Listening);
    }

    fn browser_ready(&self) {
        self.record(HealthEvent::BrowserReady);
    }

    fn browser_failed(&self, _error: &BrowserError) {
        self.record(HealthEvent::BrowserFailed);
    }

    fn executor_failed(&self, _error: &ExecutorError) {
        self.record(HealthEvent::ExecutorFailed);
    }

    fn shutdown_started(&self) {
        self.record(HealthEvent::ShutdownStarted);
    }

    fn shutdown_completed(&self) {
        self.record(HealthEvent::ShutdownCompleted);
    }
}

/// One-shot latch the scripted browser waits on for [`HOLD_URL`].
#[derive(Debug, Clone, Default)]
pub(super) struct Gate {
    state: Arc<(Mutex<bool>, Condvar)>,
}

impl Gate {
    pub(super) fn open(&self) {
        let (open, changed) = &*self.state;
        *open.lock().unwrap_or_else(PoisonError::into_inner) = true;
        changed.notify_all();
    }

    fn wait(&self) {
        let (open, changed) = &*self.state;
        let guard = open.lock().unwrap_or_else(PoisonError::into_inner);
        let _open = changed
            .wait_timeout_while(guard, Duration::from_secs(10), |open| !*open)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

/// Browser double whose behaviour is selected by the requested URL.
#[derive(Debug, Clone, Default)]
pub(super) struct ScriptedBrowser {
    calls: Arc<Mutex<Vec<String>>>,
    gate: Gate,
    fail_start: bool,
    stopped: Arc<Mutex<bool>>,
}

impl ScriptedBrowser {
    pub(super) fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    pub(super) fn gate(&self) -> Gate {
        self.gate.clone()
    }

    pub(super) fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(super) fn was_stopped(&self) -> bool {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Polls until at least `count` fetches were made.
    pub(super) fn wait_for_calls(&self, count: usize) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if self.calls().len() >= count {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }
}

impl BrowserService for ScriptedBrowser {
    fn start(&mut self) -> Result<(), BrowserError> {
        if self.fail_start {
            return Err(BrowserError::start("chromium not found"));
        }
        Ok(())
    }

    fn fetch(&mut self, url: &str, methods: &[ApiMethod]) -> FetchOutcome {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_owned());
        match url {
            HOLD_URL => {
                self.gate.wait();
                FetchOutcome::failed(FetchStatus::NoMatchingFragment)
            }
            TRANSPORT_ERROR_URL => FetchOutcome::failed(FetchStatus::TransportError),
            EMPTY_URL => FetchOutcome::failed(FetchStatus::NoMatchingFragment),
            PANIC_URL => panic!("scripted browser crash"),
            _ => FetchOutcome::ok(
                methods
                    .iter()
                    .map(|method| {
                        UpstreamFragment::with_data(
                            format!("{url}/api/{method}"),
                            *method,
                            json!({"source": url}),
                        )
                    })
                    .collect(),
            ),
        }
    }

    fn stop(&mut self) {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }
}

pub(super) fn test_settings() -> ServerSettings {
    ServerSettings {
        endpoint: ListenEndpoint::new("127.0.0.1", 0),
        read_timeout: Duration::from_millis(100),
        executor: ExecutorSettings {
            delay: Duration::from_millis(10),
            watch_interval: Duration::from_millis(30),
        },
    }
}

pub(super) fn start_server(
    browser: ScriptedBrowser,
    reporter: Arc<RecordingHealthReporter>,
) -> RunningServer<ScriptedBrowser> {
    Server::start(test_settings(), browser, reporter, ShutdownToken::new())
        .expect("server starts")
}

/// Line-protocol client that separates synchronous replies from result
/// envelopes, which may arrive interleaved.
pub(super) struct TestClient {
    stream: TcpStream,
    replies: VecDeque<Value>,
    results: VecDeque<Value>,
}

impl TestClient {
    pub(super) fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).expect("connect client");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("set client timeout");
        Self {
            stream,
            replies: VecDeque::new(),
            results: VecDeque::new(),
        }
    }

    pub(super) fn send(&mut self, line: &str) {
        self.stream
            .write_all(format!("{line}\n").as_bytes())
            .expect("write line");
    }

    /// Next frame that is not a result envelope.
    pub(super) fn reply(&mut self) -> Value {
        loop {
            if let Some(reply) = self.replies.pop_front() {
                return reply;
            }
            self.read_one();
        }
    }

    /// Next result envelope.
    pub(super) fn result(&mut self) -> Value {
        loop {
            if let Some(result) = self.results.pop_front() {
                return result;
            }
            self.read_one();
        }
    }

    /// Collects envelopes for `id` up to and including the final one.
    pub(super) fn results_for(&mut self, id: &str) -> Vec<Value> {
        let mut collected = Vec::new();
        loop {
            let envelope = self.result();
            if envelope["id"] != id {
                continue;
            }
            let last = envelope["expect_more_data"] == false;
            collected.push(envelope);
            if last {
                return collected;
            }
        }
    }

    fn read_one(&mut self) {
        let frame = read_frame(&mut self.stream).expect("read frame");
        let value: Value = serde_json::from_slice(&frame).expect("frame is JSON");
        if value.get("method").is_some() {
            self.results.push_back(value);
        } else {
            self.replies.push_back(value);
        }
    }
}
