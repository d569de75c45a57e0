//! Request decoding and reply synthesis.
//!
//! [`decode`] turns a raw [`InboundMessage`] into a [`Command`].  A message
//! that cannot be decoded is never dropped silently: it becomes an error
//! [`Response`] that still echoes whatever correlation data and response
//! topic were recovered from it.
//!
//! Every reply payload is a JSON object; failures carry a single `error`
//! field.

use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tib_middleware::InboundMessage;
use tib_types::{
    COMMAND_TOPIC_PREFIX, Command, CorrelationToken, MAX_KEY_LEN, MAX_PAYLOAD_LEN, ReplyTo,
    Response, ResponseKind, TibError, Verb,
};
use tracing::warn;

/// Longest accepted device or setting segment of a key.
pub const MAX_KEY_PART_LEN: usize = 31;

const INVALID_COMMAND: &str = "Invalid or unrecognized command";
const UNKNOWN_REQUEST: &str = "Unknown request";
const UNSUPPORTED_OPERATION: &str = "Unsupported operation";
const BUSY: &str = "busy";

// ────────────────────────────────────────────────────────────────────────────
// Decoding
// ────────────────────────────────────────────────────────────────────────────

/// Outcome of [`decode`].
#[derive(Debug)]
pub enum Decoded {
    Command(Command),
    /// The message was malformed; publish this reply instead.
    Rejected(Response),
    /// The topic is not a command topic.
    Ignored,
}

#[derive(Deserialize)]
struct Envelope {
    msg_type: String,
}

/// Extract the verb from a request body's `msg_type` field.
pub fn parse_msg_type(payload: &[u8]) -> Option<Verb> {
    let envelope: Envelope = serde_json::from_slice(payload).ok()?;
    Verb::parse(&envelope.msg_type)
}

/// Decode one inbound message.
pub fn decode(msg: &InboundMessage) -> Decoded {
    let Some(key) = msg.topic.strip_prefix(COMMAND_TOPIC_PREFIX) else {
        warn!(topic = %msg.topic, "message outside the command namespace");
        return Decoded::Ignored;
    };

    // Recover reply routing first so every rejection below can use it.
    let mut reply_to = ReplyTo::new();
    if let Some(token) = msg.correlation.as_deref().and_then(CorrelationToken::new) {
        reply_to = reply_to.with_correlation(token);
    }
    let topic_ok = match msg.response_topic.as_deref() {
        Some(topic) => match reply_to.clone().with_response_topic(topic) {
            Ok(r) => {
                reply_to = r;
                true
            }
            Err(_) => false,
        },
        None => false,
    };

    let reject = |reason: &str| {
        warn!(topic = %msg.topic, reason, "rejecting command");
        Decoded::Rejected(invalid_command_response(&reply_to))
    };

    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return reject("key length out of bounds");
    }
    if msg.payload.len() > MAX_PAYLOAD_LEN {
        return reject("payload too long");
    }
    let Ok(payload) = std::str::from_utf8(&msg.payload) else {
        return reject("payload is not UTF-8");
    };
    let Some(verb) = parse_msg_type(&msg.payload) else {
        return reject("no valid msg_type");
    };
    if !topic_ok {
        return reject("no valid response topic");
    }

    match Command::new(key, verb, payload) {
        Ok(cmd) => Decoded::Command(cmd.with_reply_to(reply_to.clone())),
        Err(e) => reject(&e.to_string()),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Keys
// ────────────────────────────────────────────────────────────────────────────

/// Why a `<device>/<setting>` key could not be split.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPairError {
    #[error("key has no '/' separator")]
    MissingSeparator,
    #[error("key has an empty segment")]
    EmptySegment,
    #[error("key segment longer than {MAX_KEY_PART_LEN} bytes")]
    SegmentTooLong,
}

/// Split `key` into its device and setting segments.
///
/// The setting ends at the next `/`, if any.
///
/// # Errors
///
/// [`KeyPairError`] when either segment is missing, empty or too long.
pub fn parse_key_pair(key: &str) -> Result<(&str, &str), KeyPairError> {
    let (device, rest) = key.split_once('/').ok_or(KeyPairError::MissingSeparator)?;
    let setting = rest.split('/').next().unwrap_or_default();
    for part in [device, setting] {
        if part.is_empty() {
            return Err(KeyPairError::EmptySegment);
        }
        if part.len() > MAX_KEY_PART_LEN {
            return Err(KeyPairError::SegmentTooLong);
        }
    }
    Ok((device, setting))
}

/// Split a device segment into its family and instance at the first ASCII
/// digit: `laser1028y` → (`laser`, `Some("1028y")`), `mems` → (`mems`, `None`).
pub fn split_family(device: &str) -> (&str, Option<&str>) {
    match device.find(|c: char| c.is_ascii_digit()) {
        Some(idx) => (&device[..idx], Some(&device[idx..])),
        None => (device, None),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Replies
// ────────────────────────────────────────────────────────────────────────────

/// `{"error": message}` as a string.
pub fn error_payload(message: &str) -> String {
    json!({ "error": message }).to_string()
}

pub fn error_response(cmd: &Command, message: &str) -> Response {
    Response::to_command(cmd, ResponseKind::Error, error_payload(message))
}

pub fn ok_response(cmd: &Command, body: Value) -> Response {
    Response::to_command(cmd, ResponseKind::Ok, body.to_string())
}

/// `{"status":"OK"}`.
pub fn status_ok(cmd: &Command) -> Response {
    ok_response(cmd, json!({ "status": "OK" }))
}

pub fn invalid_command_response(reply_to: &ReplyTo) -> Response {
    Response::reply(reply_to, ResponseKind::Error, error_payload(INVALID_COMMAND))
}

/// The error reply for `err` raised while routing `cmd`.
///
/// Routing failures map onto their fixed wire messages; any other error is
/// reported with its display text.
pub fn failure_response(cmd: &Command, err: &TibError) -> Response {
    match err {
        TibError::UnknownKey(_) => error_response(cmd, UNKNOWN_REQUEST),
        TibError::UnsupportedVerb { .. } => error_response(cmd, UNSUPPORTED_OPERATION),
        TibError::InvalidCommand(_) => error_response(cmd, INVALID_COMMAND),
        other => error_response(cmd, &other.to_string()),
    }
}

pub fn busy_response(cmd: &Command) -> Response {
    error_response(cmd, BUSY)
}
