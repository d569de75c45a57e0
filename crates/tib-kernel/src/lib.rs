//! `tib-kernel` – Switch Routing & Liveness
//!
//! Owns the optical switch fabric and keeps the controller alive.
//!
//! # Modules
//!
//! - [`switching`] – [`Router`][switching::Router]: two-position switches,
//!   declared multi-step routes between logical ports, route application and
//!   the active-route query.
//! - [`topology`] – the bench's eight switches and sixteen routes, installed
//!   with [`topology::install`].
//! - [`watchdog`] – [`WatchdogFeeder`][watchdog::WatchdogFeeder]: feeds the
//!   hardware watchdog from the control loop at a fixed interval.

pub mod switching;
pub mod topology;
pub mod watchdog;

pub use switching::{
    Route, RouteError, RouteKey, RouteStep, Router, Switch, SwitchError, SwitchLines,
};
pub use watchdog::WatchdogFeeder;
