use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};
use utilities::telnet::{TelnetConnection, TelnetSettings};

use crate::decoder::CommandSpec;
use crate::error::ProtocolError;
use crate::reply::{Framing, ParsedReply};

/// One request/reply round trip with a device.
///
/// The Engine is the production implementation; tests substitute
/// [`crate::mock::ScriptedBackend`].
#[async_trait]
pub trait Exchange: Send + Sync {
    async fn exchange(&self, command: &CommandSpec) -> Result<ParsedReply, ProtocolError>;
}

/// Sends single command lines to one `host:port`, opening a fresh connection
/// for every command. Holds no state between calls besides the address.
#[derive(Debug, Clone)]
pub struct Engine {
    connection: TelnetConnection,
}

impl Engine {
    pub fn new(host: impl Into<String>, port: u16, settings: TelnetSettings) -> Self {
        Self {
            connection: TelnetConnection::new(host, port, settings),
        }
    }

    pub fn address(&self) -> String {
        self.connection.address()
    }

    /// Runs one connection lifecycle and returns every received line
    /// concatenated, without terminators. `reply_timeout` extends the read
    /// timeout for this exchange; it never shortens it.
    #[instrument(skip(self), fields(address = %self.connection.address()))]
    pub async fn send_raw(
        &self,
        command: &str,
        reply_timeout: Option<Duration>,
    ) -> Result<String, ProtocolError> {
        let connection_error = |source: std::io::Error| ProtocolError::Connection {
            address: self.connection.address(),
            command: command.to_string(),
            source,
        };

        let mut session = self.connection.open().await.map_err(connection_error)?;
        if let Some(reply_timeout) = reply_timeout {
            let read_timeout = self.connection.settings().read_timeout.max(reply_timeout);
            session.set_read_timeout(read_timeout);
        }
        let reader = session.spawn_reader().map_err(connection_error)?;

        if let Err(e) = session.send_line(command).await {
            reader.abort();
            return Err(connection_error(e));
        }

        let lines = reader.join().await.map_err(connection_error)?;

        if let Err(e) = session.close().await {
            // The reply is already complete at this point.
            debug!("Closing connection after {:?} failed: {}", command, e);
        }

        let raw = lines.concat();
        debug!(lines = lines.len(), "Received reply {:?}", raw);

        Ok(raw)
    }

    pub async fn send_framed(
        &self,
        command: &str,
        framing: Framing,
    ) -> Result<ParsedReply, ProtocolError> {
        self.send_with(command, framing, None).await
    }

    async fn send_with(
        &self,
        command: &str,
        framing: Framing,
        reply_timeout: Option<Duration>,
    ) -> Result<ParsedReply, ProtocolError> {
        let raw = self.send_raw(command, reply_timeout).await?;

        let reply = framing.parse(&raw).map_err(|source| {
            warn!("Unparseable reply to {:?} from {}: {}", command, self.address(), source);
            ProtocolError::Parse {
                command: command.to_string(),
                source,
            }
        })?;

        if !reply.ok() {
            debug!(
                return_code = reply.return_code(),
                "Command {:?} failed: {}",
                command,
                reply.payload()
            );
        }

        Ok(reply)
    }

    /// Sends `command` and parses the reply as `<return code> <payload>`.
    pub async fn send(&self, command: &str) -> Result<ParsedReply, ProtocolError> {
        self.send_framed(command, Framing::ReturnCode).await
    }
}

#[async_trait]
impl Exchange for Engine {
    async fn exchange(&self, command: &CommandSpec) -> Result<ParsedReply, ProtocolError> {
        self.send_with(command.line(), command.framing(), command.reply_timeout())
            .await
    }
}

/// Sends one command to `host:port` with default transport timeouts.
pub async fn send(host: &str, port: u16, command: &str) -> Result<ParsedReply, ProtocolError> {
    Engine::new(host, port, TelnetSettings::default())
        .send(command)
        .await
}
