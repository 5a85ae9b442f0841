pub mod decoder;
pub mod engine;
pub mod error;
pub mod mock;
pub mod reply;

pub use decoder::{CommandSpec, Decode, Decoded, DecoderKind, TypedReply};
pub use engine::{Engine, Exchange};
pub use error::{DecodeError, ParseError, ProtocolError};
pub use reply::{Framing, ParsedReply};
pub use utilities::telnet::TelnetSettings;
