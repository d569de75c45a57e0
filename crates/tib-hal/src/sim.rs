//! In-process simulated drivers for running the controller without a bench.
//!
//! Every simulated driver is a cheap, cloneable handle onto shared state: box
//! one clone into the controller and keep another to inspect what the
//! controller did (pins pulsed, registers written, …) or to inject faults.
//!
//! # Example
//!
//! ```rust
//! use tib_hal::FieldBus;
//! use tib_hal::sim::SimBench;
//!
//! let bench = SimBench::new().with_register(1, 0x1004, 250).build();
//! let mut registry = bench.registry();
//! assert_eq!(registry.bus().read_register(1, 0x1004).unwrap(), 250);
//! assert_eq!(bench.bus.operations().len(), 1);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tib_types::TibError;

use crate::analog::{AnalogInput, AnalogOutput};
use crate::digital::{DigitalOutput, PinId};
use crate::fieldbus::FieldBus;
use crate::power::PowerControl;
use crate::registry::DeviceRegistry;
use crate::watchdog::WatchdogTimer;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ────────────────────────────────────────────────────────────────────────────
// GPIO expander
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct GpioState {
    levels: HashMap<PinId, bool>,
    writes: Vec<(PinId, bool)>,
    failing: HashSet<PinId>,
}

/// Simulated GPIO expander.  Records every write in order.
#[derive(Clone, Default)]
pub struct SimGpio {
    state: Arc<Mutex<GpioState>>,
}

impl SimGpio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(pin, level)` written so far, oldest first.
    pub fn writes(&self) -> Vec<(PinId, bool)> {
        lock(&self.state).writes.clone()
    }

    pub fn level(&self, pin: PinId) -> bool {
        lock(&self.state).levels.get(&pin).copied().unwrap_or(false)
    }

    /// Make every subsequent write to `pin` fail.
    pub fn fail_pin(&self, pin: PinId) {
        lock(&self.state).failing.insert(pin);
    }

    pub fn clear_writes(&self) {
        lock(&self.state).writes.clear();
    }
}

impl DigitalOutput for SimGpio {
    fn set_pin(&mut self, pin: PinId, level: bool) -> Result<(), TibError> {
        let mut st = lock(&self.state);
        if st.failing.contains(&pin) {
            return Err(TibError::hardware("gpio", format!("pin {pin} write failed")));
        }
        st.levels.insert(pin, level);
        st.writes.push((pin, level));
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// DAC
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct DacState {
    writes: Vec<(u8, u16)>,
    not_ready: bool,
}

/// Simulated DAC.  Records every `(channel, code)` write.
#[derive(Clone, Default)]
pub struct SimDac {
    state: Arc<Mutex<DacState>>,
}

impl SimDac {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<(u8, u16)> {
        lock(&self.state).writes.clone()
    }

    pub fn last_code(&self, channel: u8) -> Option<u16> {
        lock(&self.state)
            .writes
            .iter()
            .rev()
            .find(|(ch, _)| *ch == channel)
            .map(|(_, code)| *code)
    }

    pub fn set_ready(&self, ready: bool) {
        lock(&self.state).not_ready = !ready;
    }
}

impl AnalogOutput for SimDac {
    fn write_dac(&mut self, channel: u8, code: u16) -> Result<(), TibError> {
        let mut st = lock(&self.state);
        if st.not_ready {
            return Err(TibError::hardware("dac", "device not ready"));
        }
        st.writes.push((channel, code));
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ADC
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct AdcState {
    values: HashMap<u8, i16>,
    failing: HashSet<u8>,
    reads: usize,
}

/// Simulated ADC returning preset per-channel values (0 when unset).
#[derive(Clone, Default)]
pub struct SimAdc {
    state: Arc<Mutex<AdcState>>,
}

impl SimAdc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_value(&self, channel: u8, value: i16) {
        lock(&self.state).values.insert(channel, value);
    }

    pub fn fail_channel(&self, channel: u8) {
        lock(&self.state).failing.insert(channel);
    }

    pub fn reads(&self) -> usize {
        lock(&self.state).reads
    }
}

impl AnalogInput for SimAdc {
    fn read_adc(&mut self, channel: u8) -> Result<i16, TibError> {
        let mut st = lock(&self.state);
        st.reads += 1;
        if st.failing.contains(&channel) {
            return Err(TibError::hardware("adc", format!("channel {channel} read failed")));
        }
        Ok(st.values.get(&channel).copied().unwrap_or(0))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Field bus
// ────────────────────────────────────────────────────────────────────────────

/// One transaction observed on the simulated bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOp {
    Read { node: u8, address: u16 },
    Write { node: u8, address: u16, value: u16 },
}

#[derive(Default)]
struct BusState {
    registers: HashMap<(u8, u16), u16>,
    ops: Vec<BusOp>,
    offline: bool,
}

/// Simulated field bus.  Unset registers read as 0.
#[derive(Clone, Default)]
pub struct SimFieldBus {
    state: Arc<Mutex<BusState>>,
}

impl SimFieldBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_register(&self, node: u8, address: u16, value: u16) {
        lock(&self.state).registers.insert((node, address), value);
    }

    pub fn register(&self, node: u8, address: u16) -> Option<u16> {
        lock(&self.state).registers.get(&(node, address)).copied()
    }

    /// Every transaction attempted so far, including failed ones.
    pub fn operations(&self) -> Vec<BusOp> {
        lock(&self.state).ops.clone()
    }

    /// Make every subsequent transaction time out.
    pub fn set_offline(&self, offline: bool) {
        lock(&self.state).offline = offline;
    }
}

impl FieldBus for SimFieldBus {
    fn read_register(&mut self, node: u8, address: u16) -> Result<u16, TibError> {
        let mut st = lock(&self.state);
        st.ops.push(BusOp::Read { node, address });
        if st.offline {
            return Err(TibError::hardware("fieldbus", format!("node {node} timed out")));
        }
        Ok(st.registers.get(&(node, address)).copied().unwrap_or(0))
    }

    fn write_register(&mut self, node: u8, address: u16, value: u16) -> Result<(), TibError> {
        let mut st = lock(&self.state);
        st.ops.push(BusOp::Write { node, address, value });
        if st.offline {
            return Err(TibError::hardware("fieldbus", format!("node {node} timed out")));
        }
        st.registers.insert((node, address), value);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Power rail
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct PowerState {
    enabled: bool,
    toggles: usize,
    faulty: bool,
}

/// Simulated power rail, initially off.
#[derive(Clone, Default)]
pub struct SimPower {
    state: Arc<Mutex<PowerState>>,
}

impl SimPower {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(&self) -> bool {
        lock(&self.state).enabled
    }

    /// Number of writes that reached the enable line.
    pub fn toggles(&self) -> usize {
        lock(&self.state).toggles
    }

    pub fn set_faulty(&self, faulty: bool) {
        lock(&self.state).faulty = faulty;
    }
}

impl PowerControl for SimPower {
    fn is_enabled(&self) -> Result<bool, TibError> {
        Ok(lock(&self.state).enabled)
    }

    fn set_enabled(&mut self, on: bool) -> Result<(), TibError> {
        let mut st = lock(&self.state);
        if st.faulty {
            return Err(TibError::hardware("power", "enable line stuck"));
        }
        st.enabled = on;
        st.toggles += 1;
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Watchdog
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct WatchdogState {
    timeout: Option<Duration>,
    last_feed: Option<Instant>,
    feeds: usize,
}

/// Simulated watchdog.  Never resets anything; reports whether it would have.
#[derive(Clone, Default)]
pub struct SimWatchdog {
    state: Arc<Mutex<WatchdogState>>,
}

impl SimWatchdog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feeds(&self) -> usize {
        lock(&self.state).feeds
    }

    pub fn timeout(&self) -> Option<Duration> {
        lock(&self.state).timeout
    }

    /// `true` once an installed timeout has elapsed since the last feed.
    pub fn expired(&self) -> bool {
        let st = lock(&self.state);
        match (st.timeout, st.last_feed) {
            (Some(timeout), Some(fed)) => fed.elapsed() > timeout,
            _ => false,
        }
    }
}

impl WatchdogTimer for SimWatchdog {
    fn install(&mut self, timeout: Duration) -> Result<(), TibError> {
        let mut st = lock(&self.state);
        st.timeout = Some(timeout);
        st.last_feed = Some(Instant::now());
        Ok(())
    }

    fn feed(&mut self) -> Result<(), TibError> {
        let mut st = lock(&self.state);
        if st.timeout.is_none() {
            return Err(TibError::hardware("watchdog", "fed before install"));
        }
        st.last_feed = Some(Instant::now());
        st.feeds += 1;
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimBench builder
// ────────────────────────────────────────────────────────────────────────────

/// Handles onto a complete simulated bench.
#[derive(Clone, Default)]
pub struct SimBench {
    pub gpio: SimGpio,
    pub dac: SimDac,
    pub adc: SimAdc,
    pub bus: SimFieldBus,
    pub power: SimPower,
    pub watchdog: SimWatchdog,
}

impl SimBench {
    /// Start building a bench with every driver in its power-up state.
    pub fn new() -> SimBenchBuilder {
        SimBenchBuilder::default()
    }

    /// A [`DeviceRegistry`] wired to this bench's power rail, DAC and bus.
    pub fn registry(&self) -> DeviceRegistry {
        DeviceRegistry::new(
            Box::new(self.power.clone()),
            Box::new(self.dac.clone()),
            Box::new(self.bus.clone()),
        )
    }
}

/// Builder for [`SimBench`].
#[derive(Default)]
pub struct SimBenchBuilder {
    bench: SimBench,
}

impl SimBenchBuilder {
    /// Preset a field-bus register.
    pub fn with_register(self, node: u8, address: u16, value: u16) -> Self {
        self.bench.bus.set_register(node, address, value);
        self
    }

    /// Preset a photodiode reading.
    pub fn with_adc_value(self, channel: u8, value: i16) -> Self {
        self.bench.adc.set_value(channel, value);
        self
    }

    /// Start with the laser rail already enabled.
    pub fn with_power_on(self) -> Self {
        lock(&self.bench.power.state).enabled = true;
        self
    }

    pub fn build(self) -> SimBench {
        self.bench
    }
}
