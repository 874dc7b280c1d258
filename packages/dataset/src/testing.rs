//! Shared test doubles: a manual clock and an in-memory transport stub.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::DatasetError;
use crate::cache::Clock;
use crate::transport::{ChunkResponse, Transport};

/// A clock that only moves when told to.
pub struct TestClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap();
        *offset += by;
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap()
    }
}

/// A scripted reply for one request to a stubbed path.
#[derive(Debug, Clone)]
pub enum StubReply {
    /// Respond with this status and body.
    Respond(u16, String),
    /// Fail at the network level.
    NetworkError(String),
}

#[derive(Default)]
struct StubState {
    routes: HashMap<String, VecDeque<StubReply>>,
    get_calls: Vec<String>,
    probe_calls: Vec<String>,
}

/// In-memory [`Transport`] with scripted per-path replies.
///
/// Each path holds a queue of replies; the final reply repeats once the
/// queue is down to one, so `500, 200` scripts a single transient
/// failure. Unscripted paths respond 404.
#[derive(Default)]
pub struct StubTransport {
    state: Mutex<StubState>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts a single repeating reply for `path`.
    pub fn respond(&self, path: &str, status: u16, body: impl Into<String>) {
        self.respond_seq(path, vec![StubReply::Respond(status, body.into())]);
    }

    /// Scripts a JSON reply for `path`.
    pub fn respond_json(&self, path: &str, status: u16, body: &serde_json::Value) {
        self.respond(path, status, body.to_string());
    }

    /// Scripts a sequence of replies for `path`; the last one repeats.
    pub fn respond_seq(&self, path: &str, replies: Vec<StubReply>) {
        let mut state = self.state.lock().unwrap();
        state.routes.insert(path.to_owned(), replies.into());
    }

    /// Total number of GET requests issued.
    pub fn get_calls(&self) -> usize {
        self.state.lock().unwrap().get_calls.len()
    }

    /// Number of GET requests issued for `path`.
    pub fn get_calls_for(&self, path: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .get_calls
            .iter()
            .filter(|p| p.as_str() == path)
            .count()
    }

    /// Probe targets in the order they were issued.
    pub fn probe_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().probe_calls.clone()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn get(&self, path: &str) -> Result<ChunkResponse, DatasetError> {
        let reply = {
            let mut state = self.state.lock().unwrap();
            state.get_calls.push(path.to_owned());
            match state.routes.get_mut(path) {
                None => StubReply::Respond(404, String::new()),
                Some(queue) => {
                    if queue.len() > 1 {
                        queue.pop_front().unwrap()
                    } else {
                        queue.front().cloned().unwrap_or(StubReply::Respond(404, String::new()))
                    }
                }
            }
        };
        match reply {
            StubReply::Respond(status, body) => Ok(ChunkResponse { status, body }),
            StubReply::NetworkError(message) => Err(DatasetError::Transport { message }),
        }
    }

    async fn probe(&self, path: &str) -> Result<bool, DatasetError> {
        let mut state = self.state.lock().unwrap();
        state.probe_calls.push(path.to_owned());
        Ok(state.routes.contains_key(path))
    }
}
