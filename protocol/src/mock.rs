//! An in-memory device that answers commands from a script.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use crate::decoder::CommandSpec;
use crate::engine::Exchange;
use crate::error::ProtocolError;
use crate::reply::ParsedReply;

#[derive(Debug, Clone)]
enum Scripted {
    Reply(String),
    Refuse,
}

#[derive(Debug, Default)]
struct Script {
    replies: HashMap<String, VecDeque<Scripted>>,
    sent: Vec<String>,
}

/// Replies to each command line with the next entry of its queue. The last
/// entry of a queue is repeated forever, so a single scripted reply answers
/// every poll.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    script: Mutex<Script>,
    latency: Duration,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every exchange takes this long, measured on the tokio clock.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn on<I, S>(self, command: &str, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(command, replies.into_iter().map(|r| Scripted::Reply(r.into())));
        self
    }

    /// Queues a refused connection for `command`.
    pub fn refuse(self, command: &str) -> Self {
        self.push(command, [Scripted::Refuse]);
        self
    }

    fn push(&self, command: &str, entries: impl IntoIterator<Item = Scripted>) {
        let mut script = self.lock();
        script
            .replies
            .entry(command.to_string())
            .or_default()
            .extend(entries);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        // A panicking test thread must not hide the script from the others.
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Command lines received so far, oldest first.
    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    pub fn count(&self, command: &str) -> usize {
        self.lock().sent.iter().filter(|sent| *sent == command).count()
    }

    fn next_reply(&self, command: &str) -> Option<Scripted> {
        let mut script = self.lock();
        script.sent.push(command.to_string());

        let queue = script.replies.get_mut(command)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl Exchange for ScriptedBackend {
    async fn exchange(&self, spec: &CommandSpec) -> Result<ParsedReply, ProtocolError> {
        let command = spec.line();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let connection_error = |kind: io::ErrorKind, message: String| ProtocolError::Connection {
            address: "scripted".to_string(),
            command: command.to_string(),
            source: io::Error::new(kind, message),
        };

        let raw = match self.next_reply(command) {
            Some(Scripted::Reply(raw)) => raw,
            Some(Scripted::Refuse) => {
                return Err(connection_error(
                    io::ErrorKind::ConnectionRefused,
                    "refused by script".to_string(),
                ));
            }
            None => {
                return Err(connection_error(
                    io::ErrorKind::NotFound,
                    format!("no scripted reply for {:?}", command),
                ));
            }
        };
        trace!("Scripted reply to {:?}: {:?}", command, raw);

        spec.framing().parse(&raw).map_err(|source| ProtocolError::Parse {
            command: command.to_string(),
            source,
        })
    }
}
