use std::io;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("No space between return code and payload in reply {reply:?}")]
    NoDelimiter { reply: String },

    #[error("Return code {token:?} is not a base-10 integer")]
    BadReturnCode { token: String },

    #[error("Peer closed the connection without replying")]
    EmptyReply,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("Payload {payload:?} is not an integer")]
    NotInteger { payload: String },

    #[error("Payload {payload:?} is not a decimal number")]
    NotDouble { payload: String },

    #[error("Payload {payload:?} has no {field} at token {index}")]
    MissingToken {
        index: usize,
        field: &'static str,
        payload: String,
    },

    #[error("Timestamp {timestamp:?} is invalid: {reason}")]
    BadTimestamp { timestamp: String, reason: String },

    #[error("Device reported an error: {description}")]
    ErrorReply { description: String },

    #[error("Payload {payload:?} does not start with \"ok\" or \"error\"")]
    UnexpectedReply { payload: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Failed to exchange {command:?} with {address}: {source}")]
    Connection {
        address: String,
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse reply to {command:?}: {source}")]
    Parse {
        command: String,
        #[source]
        source: ParseError,
    },

    #[error("Failed to decode reply to {command:?}: {source}")]
    Decode {
        command: String,
        #[source]
        source: DecodeError,
    },

    #[error("Command {command:?} failed with return code {code}: {description}")]
    Upstream {
        command: String,
        code: i32,
        description: String,
    },
}

impl ProtocolError {
    pub fn command(&self) -> &str {
        match self {
            ProtocolError::Connection { command, .. }
            | ProtocolError::Parse { command, .. }
            | ProtocolError::Decode { command, .. }
            | ProtocolError::Upstream { command, .. } => command,
        }
    }

    /// Description text supplied by the device, when there is one.
    pub fn device_description(&self) -> Option<&str> {
        match self {
            ProtocolError::Upstream { description, .. } => Some(description),
            ProtocolError::Decode {
                source: DecodeError::ErrorReply { description },
                ..
            } => Some(description),
            _ => None,
        }
    }
}

impl From<ProtocolError> for io::Error {
    fn from(error: ProtocolError) -> Self {
        match error {
            ProtocolError::Connection { source, .. } => source,
            _ => io::Error::new(io::ErrorKind::Other, error.to_string()),
        }
    }
}
