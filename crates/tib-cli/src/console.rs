//! Line-oriented operator console: request lines in, published messages out.
//!
//! A request line is `<key> <json>`, for example
//! `mems/yj_cal_laser {"msg_type":"set","value":"A"}`.  Blank lines and lines
//! starting with `#` are skipped.

use serde_json::{Value, json};
use tib_middleware::{InboundMessage, OutboundPublish};
use tib_types::{COMMAND_TOPIC_PREFIX, DEFAULT_RESPONSE_TOPIC};

/// Split a console line into key and body.  `None` for lines to skip.
pub fn parse_request_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    match line.split_once(char::is_whitespace) {
        Some((key, body)) => Some((key, body.trim())),
        None => Some((line, "")),
    }
}

/// The broker message a console request stands for.  Replies go to the
/// default response topic and carry `seq` as their correlation token.
pub fn to_request(key: &str, body: &str, seq: u64) -> InboundMessage {
    InboundMessage::new(format!("{COMMAND_TOPIC_PREFIX}{key}"), body)
        .with_response_topic(DEFAULT_RESPONSE_TOPIC)
        .with_correlation(seq.to_string().into_bytes())
}

/// One JSON line describing a published message.  JSON payloads are
/// embedded as objects; anything else as a string.
pub fn format_publish(msg: &OutboundPublish) -> String {
    let payload = serde_json::from_str::<Value>(&msg.payload)
        .unwrap_or_else(|_| Value::String(msg.payload.clone()));
    let correlation = msg
        .correlation
        .as_deref()
        .map(|c| Value::String(String::from_utf8_lossy(c).into_owned()))
        .unwrap_or(Value::Null);
    json!({
        "topic": msg.topic,
        "qos": msg.qos.level(),
        "correlation": correlation,
        "payload": payload,
    })
    .to_string()
}
