//! `tib-runtime` – Command Path & Pipeline
//!
//! Turns broker messages into device actions and device state into replies.
//!
//! # Modules
//!
//! - [`protocol`] – [`decode`][protocol::decode]: topic and payload
//!   validation, key splitting and every fixed error reply.
//! - [`dispatch`] – [`Dispatcher`][dispatch::Dispatcher]: picks the handler
//!   for a key family and verb.
//! - [`handlers`] – the `memsroute`, `mems`, `laser`, `atten`, `power`,
//!   `status` and `sleep` device handlers.
//! - [`context`] – [`InstrumentContext`][context::InstrumentContext]: the
//!   router, device registry and attenuator bank owned by the executor.
//! - [`pipeline`] – [`Pipeline`][pipeline::Pipeline]: ingress, executor,
//!   sampler and publisher wired through bounded queues, with watchdog
//!   feeding.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console or
//!   JSON logs plus optional OTLP span export.

pub mod context;
pub mod dispatch;
pub mod handlers;
pub mod pipeline;
pub mod protocol;
pub mod telemetry;

pub use context::InstrumentContext;
pub use dispatch::{DispatchEntry, Dispatcher, HandlerFn};
pub use pipeline::{Pipeline, PipelineConfig, ingest};
pub use protocol::{Decoded, decode};
pub use telemetry::{TracerProviderGuard, init_tracing};
