//! `tib-middleware` – Queues & Transport
//!
//! Moves commands, replies and samples between the pipeline's units and the
//! outside world without caring what they mean.
//!
//! # Modules
//!
//! - [`queue`] – bounded channels with the three overflow policies:
//!   busy-reject ([`InboundQueue`]), drop-newest ([`OutboundQueue`]) and
//!   purge-and-retry ([`SampleQueue`]).
//! - [`transport`] – the [`Transport`] boundary trait and the in-process
//!   [`LoopbackTransport`].

pub mod queue;
pub mod transport;

pub use crossbeam::channel::Receiver;
pub use queue::{InboundQueue, OutboundQueue, SampleQueue};
pub use transport::{InboundMessage, LoopbackClient, LoopbackTransport, OutboundPublish, Transport};
