//! `tib-types` – shared vocabulary of the test-bench controller.
//!
//! Every other crate speaks in terms of the types defined here: the decoded
//! [`Command`], the outbound [`Response`], the switch [`SwitchPosition`] and the
//! [`TibError`] taxonomy.  The wire-level limits are part of the request/reply
//! protocol and are exported as plain constants.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ────────────────────────────────────────────────────────────────────────────
// Wire contract
// ────────────────────────────────────────────────────────────────────────────

/// Topic prefix every inbound request is published under.
pub const COMMAND_TOPIC_PREFIX: &str = "cmd/hsfib-tib/req/";
/// Topic used for replies when the request carried no usable response topic.
pub const DEFAULT_RESPONSE_TOPIC: &str = "cmd/hsfib-tib/resp";
/// Topic photodiode samples are published on.
pub const PHOTODIODE_TOPIC: &str = "dt/hsfib-tib/photodiode";

/// Maximum byte length of a command key (topic with the prefix stripped).
pub const MAX_KEY_LEN: usize = 47;
/// Maximum byte length of a response topic.
pub const MAX_TOPIC_LEN: usize = 63;
/// Maximum byte length of a request or response JSON payload.
pub const MAX_PAYLOAD_LEN: usize = 512;
/// Maximum byte length of an echoed correlation token.
pub const MAX_CORRELATION_LEN: usize = 16;

/// Payload substituted when a handler produced more than [`MAX_PAYLOAD_LEN`] bytes.
pub const OVERFLOW_PAYLOAD: &str = r#"{"error":"overflow building JSON"}"#;

// ────────────────────────────────────────────────────────────────────────────
// Request side
// ────────────────────────────────────────────────────────────────────────────

/// Operation requested by a [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Get,
    Set,
}

impl Verb {
    /// Parse a `msg_type` value, ignoring ASCII case.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("get") {
            Some(Verb::Get)
        } else if raw.eq_ignore_ascii_case("set") {
            Some(Verb::Set)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verb::Get => write!(f, "get"),
            Verb::Set => write!(f, "set"),
        }
    }
}

/// Opaque correlation bytes supplied by the requester and echoed verbatim.
///
/// Construction enforces the `1..=MAX_CORRELATION_LEN` byte bound, so a token
/// that exists is always safe to echo.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationToken(Vec<u8>);

impl CorrelationToken {
    /// Returns `None` when `bytes` is empty or longer than [`MAX_CORRELATION_LEN`].
    pub fn new(bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() || bytes.len() > MAX_CORRELATION_LEN {
            None
        } else {
            Some(Self(bytes.to_vec()))
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Where, and with which correlation token, a reply must be sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyTo {
    response_topic: Option<String>,
    correlation: Option<CorrelationToken>,
}

impl ReplyTo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a response topic.
    ///
    /// # Errors
    ///
    /// [`TibError::InvalidCommand`] when the topic is empty or longer than
    /// [`MAX_TOPIC_LEN`].
    pub fn with_response_topic(mut self, topic: &str) -> Result<Self, TibError> {
        if topic.is_empty() || topic.len() > MAX_TOPIC_LEN {
            return Err(TibError::InvalidCommand(format!(
                "response topic must be 1..={MAX_TOPIC_LEN} bytes, got {}",
                topic.len()
            )));
        }
        self.response_topic = Some(topic.to_string());
        Ok(self)
    }

    pub fn with_correlation(mut self, token: CorrelationToken) -> Self {
        self.correlation = Some(token);
        self
    }

    pub fn response_topic(&self) -> Option<&str> {
        self.response_topic.as_deref()
    }

    pub fn correlation(&self) -> Option<&CorrelationToken> {
        self.correlation.as_ref()
    }

    /// The topic a reply goes to: the requested one, else [`DEFAULT_RESPONSE_TOPIC`].
    pub fn topic(&self) -> &str {
        self.response_topic.as_deref().unwrap_or(DEFAULT_RESPONSE_TOPIC)
    }
}

/// A decoded, validated inbound request.  Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    key: String,
    verb: Verb,
    payload: String,
    reply_to: ReplyTo,
}

impl Command {
    /// Build a command for `key` (`<device>[/<setting>]`).
    ///
    /// # Errors
    ///
    /// [`TibError::InvalidCommand`] when the key is empty or exceeds
    /// [`MAX_KEY_LEN`], or the payload exceeds [`MAX_PAYLOAD_LEN`].
    pub fn new(
        key: impl Into<String>,
        verb: Verb,
        payload: impl Into<String>,
    ) -> Result<Self, TibError> {
        let key = key.into();
        let payload = payload.into();
        if key.is_empty() || key.len() > MAX_KEY_LEN {
            return Err(TibError::InvalidCommand(format!(
                "key must be 1..={MAX_KEY_LEN} bytes, got {}",
                key.len()
            )));
        }
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(TibError::InvalidCommand(format!(
                "payload exceeds {MAX_PAYLOAD_LEN} bytes"
            )));
        }
        Ok(Self {
            key,
            verb,
            payload,
            reply_to: ReplyTo::default(),
        })
    }

    pub fn with_reply_to(mut self, reply_to: ReplyTo) -> Self {
        self.reply_to = reply_to;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    /// Raw JSON body, including the `msg_type` field.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn reply_to(&self) -> &ReplyTo {
        &self.reply_to
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Reply side
// ────────────────────────────────────────────────────────────────────────────

/// Classification of an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseKind {
    Ok,
    Error,
    Ack,
}

/// Delivery guarantee requested from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QoS {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl QoS {
    pub fn level(self) -> u8 {
        match self {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => 1,
            QoS::ExactlyOnce => 2,
        }
    }
}

/// An outbound message: a reply to a [`Command`] or an autonomous sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    kind: ResponseKind,
    topic: String,
    payload: String,
    qos: QoS,
    correlation: Option<CorrelationToken>,
}

impl Response {
    /// Build a reply routed according to `reply_to`.
    ///
    /// Payloads longer than [`MAX_PAYLOAD_LEN`] are replaced by
    /// [`OVERFLOW_PAYLOAD`] and the reply becomes an error.
    pub fn reply(reply_to: &ReplyTo, kind: ResponseKind, payload: impl Into<String>) -> Self {
        let payload = payload.into();
        let (kind, payload) = if payload.len() > MAX_PAYLOAD_LEN {
            (ResponseKind::Error, OVERFLOW_PAYLOAD.to_string())
        } else {
            (kind, payload)
        };
        Self {
            kind,
            topic: reply_to.topic().to_string(),
            payload,
            qos: QoS::AtLeastOnce,
            correlation: reply_to.correlation().cloned(),
        }
    }

    /// Reply to `cmd`, echoing its response topic and correlation token.
    pub fn to_command(cmd: &Command, kind: ResponseKind, payload: impl Into<String>) -> Self {
        Self::reply(cmd.reply_to(), kind, payload)
    }

    /// An unsolicited sensor sample published fire-and-forget.
    pub fn sample(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            kind: ResponseKind::Ok,
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::AtMostOnce,
            correlation: None,
        }
    }

    pub fn kind(&self) -> ResponseKind {
        self.kind
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn qos(&self) -> QoS {
        self.qos
    }

    pub fn correlation(&self) -> Option<&CorrelationToken> {
        self.correlation.as_ref()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Devices
// ────────────────────────────────────────────────────────────────────────────

/// Logical position of a two-way optical switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwitchPosition {
    A,
    B,
    /// Not actuated since power-up.
    Unknown,
}

impl SwitchPosition {
    pub fn as_char(self) -> char {
        match self {
            SwitchPosition::A => 'A',
            SwitchPosition::B => 'B',
            SwitchPosition::Unknown => 'U',
        }
    }

    /// Parse an actuation target.  Only `"A"` and `"B"` are accepted.
    pub fn parse_target(raw: &str) -> Option<Self> {
        match raw {
            "A" => Some(SwitchPosition::A),
            "B" => Some(SwitchPosition::B),
            _ => None,
        }
    }
}

impl std::fmt::Display for SwitchPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Error taxonomy spanning protocol decoding, dispatch, validation, device I/O
/// and configuration.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TibError {
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Unknown request: {0}")]
    UnknownKey(String),

    #[error("Unsupported operation: {verb} on {key}")]
    UnsupportedVerb { key: String, verb: Verb },

    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Internal configuration error: {0}")]
    InternalConfig(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TibError {
    /// Shorthand for [`TibError::HardwareFault`].
    pub fn hardware(component: impl Into<String>, details: impl Into<String>) -> Self {
        TibError::HardwareFault {
            component: component.into(),
            details: details.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verb_parse_ignores_case() {
        assert_eq!(Verb::parse("GET"), Some(Verb::Get));
        assert_eq!(Verb::parse("Set"), Some(Verb::Set));
        assert_eq!(Verb::parse("put"), None);
        assert_eq!(Verb::parse(""), None);
    }

    #[test]
    fn correlation_token_bounds() {
        assert!(CorrelationToken::new(&[]).is_none());
        assert!(CorrelationToken::new(&[7u8; MAX_CORRELATION_LEN]).is_some());
        assert!(CorrelationToken::new(&[7u8; MAX_CORRELATION_LEN + 1]).is_none());
    }

    #[test]
    fn command_rejects_empty_and_long_keys() {
        assert!(Command::new("", Verb::Get, "{}").is_err());
        let long = "k".repeat(MAX_KEY_LEN + 1);
        assert!(matches!(
            Command::new(long, Verb::Get, "{}"),
            Err(TibError::InvalidCommand(_))
        ));
        assert!(Command::new("k".repeat(MAX_KEY_LEN), Verb::Get, "{}").is_ok());
    }

    #[test]
    fn command_rejects_oversized_payload() {
        let body = "x".repeat(MAX_PAYLOAD_LEN + 1);
        assert!(Command::new("status", Verb::Get, body).is_err());
    }

    #[test]
    fn reply_defaults_topic_and_echoes_correlation() {
        let token = CorrelationToken::new(b"abc").unwrap();
        let cmd = Command::new("status", Verb::Get, "{}")
            .unwrap()
            .with_reply_to(ReplyTo::new().with_correlation(token.clone()));

        let resp = Response::to_command(&cmd, ResponseKind::Ok, "{}");
        assert_eq!(resp.topic(), DEFAULT_RESPONSE_TOPIC);
        assert_eq!(resp.correlation(), Some(&token));
        assert_eq!(resp.qos(), QoS::AtLeastOnce);
    }

    #[test]
    fn reply_uses_requested_topic() {
        let reply_to = ReplyTo::new().with_response_topic("client/42/inbox").unwrap();
        let resp = Response::reply(&reply_to, ResponseKind::Ok, "{}");
        assert_eq!(resp.topic(), "client/42/inbox");
        assert!(resp.correlation().is_none());
    }

    #[test]
    fn response_topic_bound_is_enforced() {
        assert!(ReplyTo::new().with_response_topic("").is_err());
        let long = "t".repeat(MAX_TOPIC_LEN + 1);
        assert!(ReplyTo::new().with_response_topic(&long).is_err());
    }

    #[test]
    fn oversized_reply_becomes_overflow_error() {
        let resp = Response::reply(
            &ReplyTo::new(),
            ResponseKind::Ok,
            "y".repeat(MAX_PAYLOAD_LEN + 1),
        );
        assert_eq!(resp.kind(), ResponseKind::Error);
        assert_eq!(resp.payload(), OVERFLOW_PAYLOAD);
    }

    #[test]
    fn sample_is_fire_and_forget() {
        let resp = Response::sample(PHOTODIODE_TOPIC, r#"{"yj":1}"#);
        assert_eq!(resp.qos(), QoS::AtMostOnce);
        assert_eq!(resp.qos().level(), 0);
        assert_eq!(resp.topic(), PHOTODIODE_TOPIC);
    }

    #[test]
    fn switch_position_targets() {
        assert_eq!(SwitchPosition::parse_target("A"), Some(SwitchPosition::A));
        assert_eq!(SwitchPosition::parse_target("B"), Some(SwitchPosition::B));
        assert_eq!(SwitchPosition::parse_target("U"), None);
        assert_eq!(SwitchPosition::parse_target("a"), None);
        assert_eq!(SwitchPosition::Unknown.to_string(), "U");
    }

    #[test]
    fn tib_error_display() {
        let err = TibError::hardware("fieldbus", "timeout");
        assert!(err.to_string().contains("fieldbus"));

        let err = TibError::UnsupportedVerb {
            key: "status".to_string(),
            verb: Verb::Set,
        };
        assert_eq!(err.to_string(), "Unsupported operation: set on status");
    }

    #[test]
    fn tib_error_serialization_roundtrip() {
        let err = TibError::Validation {
            field: "value".to_string(),
            reason: "missing".to_string(),
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: TibError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
