//! `tib-hal` – Hardware Abstraction Layer
//!
//! Translates the controller's abstract device operations into driver calls.
//! Every bench peripheral sits behind a small `Send` trait so the command path
//! and the pipeline can run against real drivers or the simulated [`sim`]
//! bench interchangeably.
//!
//! # Modules
//!
//! | Module | Contents |
//! |---|---|
//! | [`digital`] | [`DigitalOutput`] – GPIO expander lines driving the switch coils |
//! | [`analog`] | [`AnalogOutput`] / [`AnalogInput`] – DAC and ADC channels |
//! | [`fieldbus`] | [`FieldBus`] – holding-register access to the laser controllers |
//! | [`power`] | [`PowerControl`] – the laser driver power rail |
//! | [`watchdog`] | [`WatchdogTimer`] – the hardware reset timer |
//! | [`attenuator`] | [`Attenuator`] / [`AttenuatorBank`] – calibrated optical attenuators |
//! | [`laser`] | [`LaserDriver`] plus the laser and register name tables |
//! | [`photodiode`] | [`PhotodiodeSampler`] – two-channel photodiode reads |
//! | [`registry`] | [`DeviceRegistry`] – the drivers owned by the command path |
//! | [`sim`] | In-process simulated drivers and the [`SimBench`] builder |

pub mod analog;
pub mod attenuator;
pub mod digital;
pub mod fieldbus;
pub mod laser;
pub mod photodiode;
pub mod power;
pub mod registry;
pub mod sim;
pub mod watchdog;

pub use analog::{AnalogInput, AnalogOutput};
pub use attenuator::{Attenuator, AttenuatorBank, Calibration, Units};
pub use digital::{DigitalOutput, PinId};
pub use fieldbus::FieldBus;
pub use laser::LaserDriver;
pub use photodiode::{PhotodiodeSample, PhotodiodeSampler};
pub use power::PowerControl;
pub use registry::DeviceRegistry;
pub use sim::{SimBench, SimBenchBuilder};
pub use watchdog::WatchdogTimer;
