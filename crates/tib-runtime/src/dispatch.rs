//! Dispatch Engine – routes a [`Command`] to the handler for its key.
//!
//! The first key segment selects a [`DispatchEntry`] by *family*: the segment
//! up to its first digit (`laser1028y/current` → `laser`).  Families are
//! compared exactly and case-sensitively; the first matching entry wins.
//! Only instanced families accept a suffix: `status9` and `mems1/x` are
//! unknown keys.
//!
//! | Family | get | set |
//! |---|---|---|
//! | `memsroute` | active routes | apply route |
//! | `mems` | switch position | actuate switch |
//! | `laser` | read register | write register |
//! | `power` | rail state | drive rail |
//! | `atten` | calibration / level | recalibrate / set level |
//! | `status` | rail state | – |
//! | `sleep` | – | power down |

use tib_types::{Command, Response, TibError, Verb};
use tracing::{debug, instrument};

use crate::context::InstrumentContext;
use crate::handlers::{atten, laser, power, route, switch};
use crate::protocol::{failure_response, split_family};

/// A request handler.  Never fails: every error becomes an error [`Response`].
pub type HandlerFn = fn(&mut InstrumentContext, &Command) -> Response;

/// One row of the dispatch table.
#[derive(Clone, Copy)]
pub struct DispatchEntry {
    pub family: &'static str,
    /// Whether the device segment carries an instance after the family.
    pub instanced: bool,
    pub get: Option<HandlerFn>,
    pub set: Option<HandlerFn>,
}

impl DispatchEntry {
    pub fn handler(&self, verb: Verb) -> Option<HandlerFn> {
        match verb {
            Verb::Get => self.get,
            Verb::Set => self.set,
        }
    }
}

pub static DISPATCH_TABLE: &[DispatchEntry] = &[
    DispatchEntry {
        family: "memsroute",
        instanced: false,
        get: Some(route::get),
        set: Some(route::set),
    },
    DispatchEntry {
        family: "mems",
        instanced: false,
        get: Some(switch::get),
        set: Some(switch::set),
    },
    DispatchEntry {
        family: "laser",
        instanced: true,
        get: Some(laser::get),
        set: Some(laser::set),
    },
    DispatchEntry {
        family: "power",
        instanced: false,
        get: Some(power::get),
        set: Some(power::set),
    },
    DispatchEntry {
        family: "atten",
        instanced: true,
        get: Some(atten::get),
        set: Some(atten::set),
    },
    DispatchEntry {
        family: "status",
        instanced: false,
        get: Some(power::status),
        set: None,
    },
    DispatchEntry {
        family: "sleep",
        instanced: false,
        get: None,
        set: Some(power::sleep),
    },
];

/// Look up the entry serving `key` in `table`.
pub fn find_dispatch<'a>(table: &'a [DispatchEntry], key: &str) -> Option<&'a DispatchEntry> {
    let device = key.split('/').next().unwrap_or(key);
    let (family, instance) = split_family(device);
    table
        .iter()
        .find(|e| e.family == family && (e.instanced || instance.is_none()))
}

/// Owns the dispatch table consulted for every command.
#[derive(Clone, Copy)]
pub struct Dispatcher {
    table: &'static [DispatchEntry],
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_table(DISPATCH_TABLE)
    }

    pub fn with_table(table: &'static [DispatchEntry]) -> Self {
        Self { table }
    }

    /// The handler serving `cmd`.
    ///
    /// # Errors
    ///
    /// * [`TibError::UnknownKey`] when no entry serves the key.
    /// * [`TibError::UnsupportedVerb`] when the entry has no handler for the
    ///   verb.
    pub fn resolve(&self, cmd: &Command) -> Result<HandlerFn, TibError> {
        let entry = find_dispatch(self.table, cmd.key())
            .ok_or_else(|| TibError::UnknownKey(cmd.key().to_string()))?;
        entry.handler(cmd.verb()).ok_or_else(|| TibError::UnsupportedVerb {
            key: cmd.key().to_string(),
            verb: cmd.verb(),
        })
    }

    /// Run `cmd` against `ctx` and return the reply to publish.
    #[instrument(skip(self, ctx, cmd), fields(key = cmd.key(), verb = %cmd.verb()))]
    pub fn dispatch(&self, ctx: &mut InstrumentContext, cmd: &Command) -> Response {
        match self.resolve(cmd) {
            Ok(handler) => handler(ctx, cmd),
            Err(e) => {
                debug!(error = %e, "not dispatched");
                failure_response(cmd, &e)
            }
        }
    }
}
