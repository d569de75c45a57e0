//! Device handlers invoked by the dispatch engine.
//!
//! Every handler follows the same shape: split the key, validate the JSON
//! body against a request type, call the device, and build the reply.  A
//! handler never fails; each error path produces an error reply with a fixed
//! message.

pub mod atten;
pub mod laser;
pub mod power;
pub mod route;
pub mod switch;

use serde::de::DeserializeOwned;
use tib_types::Command;

/// Deserialize the command body into `T`, ignoring unknown fields such as
/// `msg_type`.
fn parse_body<T: DeserializeOwned>(cmd: &Command) -> Option<T> {
    serde_json::from_str(cmd.payload()).ok()
}

/// Body of every scalar set request.
#[derive(serde::Deserialize)]
struct ValueRequest<T> {
    value: T,
}
