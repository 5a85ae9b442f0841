use crate::error::{ParseError, ProtocolError};

/// Return code used for mechanism replies that start with `error`.
pub const BARE_ERROR_CODE: i32 = 1;

/// How a raw reply is split into a return code and a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// `<integer return code><space><payload>`, as sent by the detector server.
    #[default]
    ReturnCode,
    /// The whole reply is the payload, unless its first token is `error`.
    /// This is what the mechanism microcontroller sends.
    Bare,
}

impl Framing {
    pub fn parse(&self, raw: &str) -> Result<ParsedReply, ParseError> {
        match self {
            Framing::ReturnCode => ParsedReply::parse(raw),
            Framing::Bare => ParsedReply::parse_bare(raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    return_code: i32,
    payload: String,
}

impl ParsedReply {
    pub fn new(return_code: i32, payload: impl Into<String>) -> Self {
        Self {
            return_code,
            payload: payload.into(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        if raw.is_empty() {
            return Err(ParseError::EmptyReply);
        }

        let (code, payload) = raw.split_once(' ').ok_or_else(|| ParseError::NoDelimiter {
            reply: raw.to_string(),
        })?;

        let return_code = code.parse::<i32>().map_err(|_| ParseError::BadReturnCode {
            token: code.to_string(),
        })?;

        Ok(Self::new(return_code, payload))
    }

    pub fn parse_bare(raw: &str) -> Result<Self, ParseError> {
        if raw.is_empty() {
            return Err(ParseError::EmptyReply);
        }

        let mut tokens = raw.splitn(2, ' ');
        match (tokens.next(), tokens.next()) {
            (Some("error"), description) => Ok(Self::new(
                BARE_ERROR_CODE,
                description.unwrap_or_default().trim_start(),
            )),
            _ => Ok(Self::new(0, raw)),
        }
    }

    pub fn return_code(&self) -> i32 {
        self.return_code
    }

    pub fn ok(&self) -> bool {
        self.return_code == 0
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Hands back the payload of a successful reply, or an upstream error
    /// carrying the device's own description.
    pub fn into_payload(self, command: &str) -> Result<String, ProtocolError> {
        if self.ok() {
            Ok(self.payload)
        } else {
            Err(ProtocolError::Upstream {
                command: command.to_string(),
                code: self.return_code,
                description: self.payload,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_code_and_payload_at_first_space() {
        for (code, payload) in [(0, "1 sprat_20200102_1_1_0_0.fits"), (-7, ""), (654, "Failed: bad")] {
            let raw = format!("{} {}", code, payload);
            let reply = ParsedReply::parse(&raw).unwrap();

            assert_eq!(reply.return_code(), code);
            assert_eq!(reply.ok(), code == 0);
            assert_eq!(reply.payload(), payload);
        }
    }

    #[test]
    fn reply_without_space_has_no_delimiter() {
        for raw in ["0", "in", "error:bad", "0\t1"] {
            assert_eq!(
                ParsedReply::parse(raw),
                Err(ParseError::NoDelimiter {
                    reply: raw.to_string()
                })
            );
        }
    }

    #[test]
    fn non_numeric_code_is_rejected() {
        assert_eq!(
            ParsedReply::parse("ok 12.5"),
            Err(ParseError::BadReturnCode {
                token: "ok".to_string()
            })
        );
        assert_eq!(
            ParsedReply::parse(" 0 leading space"),
            Err(ParseError::BadReturnCode {
                token: String::new()
            })
        );
    }

    #[test]
    fn empty_reply_is_its_own_error() {
        assert_eq!(ParsedReply::parse(""), Err(ParseError::EmptyReply));
        assert_eq!(ParsedReply::parse_bare(""), Err(ParseError::EmptyReply));
    }

    #[test]
    fn bare_framing_treats_reply_as_payload() {
        let reply = Framing::Bare.parse("ok 21.5").unwrap();
        assert!(reply.ok());
        assert_eq!(reply.payload(), "ok 21.5");

        let reply = Framing::Bare.parse("unknown").unwrap();
        assert_eq!(reply.payload(), "unknown");
    }

    #[test]
    fn bare_framing_detects_error_replies() {
        let reply = Framing::Bare.parse("error Grism jammed").unwrap();
        assert!(!reply.ok());
        assert_eq!(reply.return_code(), BARE_ERROR_CODE);
        assert_eq!(reply.payload(), "Grism jammed");

        let reply = Framing::Bare.parse("error").unwrap();
        assert!(!reply.ok());
        assert_eq!(reply.payload(), "");

        assert!(Framing::Bare.parse("errors 3").unwrap().ok());
    }

    #[test]
    fn failed_reply_becomes_upstream_error() {
        let error = ParsedReply::parse("1 Bias failed:CCD not ready")
            .unwrap()
            .into_payload("bias")
            .unwrap_err();

        assert_eq!(error.device_description(), Some("Bias failed:CCD not ready"));
        assert!(matches!(error, ProtocolError::Upstream { code: 1, .. }));
    }
}
