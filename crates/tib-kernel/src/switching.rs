//! Switch Routing Engine – two-position optical switches and declared routes.
//!
//! A [`Router`] owns up to [`MAX_SWITCHES`] [`Switch`]es and up to
//! [`MAX_ROUTES`] [`Route`]s.  A route connects a logical input port to an
//! output port through an ordered list of [`RouteStep`]s, each naming a switch
//! and the position it must be in.
//!
//! Switches are actuated by pulsing the control line of the target position
//! (deassert, assert, deassert, separated by a settle delay).  The pulse is
//! synchronous: [`Router::set_switch`] and [`Router::apply_route`] block the
//! caller for the whole sequence.  A switch's logical state is committed only
//! after its pulse completed.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use tib_hal::sim::SimGpio;
//! use tib_kernel::switching::{Router, RouteStep, SwitchLines};
//! use tib_types::SwitchPosition;
//!
//! let mut router = Router::new(Box::new(SimGpio::new()), Duration::ZERO);
//! router.add_switch("yj_cal_laser", SwitchLines::new(0, 1)).unwrap();
//! router
//!     .define_route("yj_cal", "yj_ao", vec![RouteStep::new("yj_cal_laser", SwitchPosition::A)])
//!     .unwrap();
//!
//! router.apply_route("yj_cal", "yj_ao").unwrap();
//! assert_eq!(router.active_routes(6).len(), 1);
//! ```

use std::thread;
use std::time::Duration;

use thiserror::Error;
use tib_hal::{DigitalOutput, PinId};
use tib_types::{SwitchPosition, TibError};
use tracing::{debug, error, info};

pub const MAX_SWITCHES: usize = 8;
pub const MAX_ROUTES: usize = 18;
pub const MAX_ROUTE_STEPS: usize = 5;
/// Default cap on the number of keys reported by [`Router::active_routes`].
pub const MAX_ACTIVE_ROUTES: usize = 6;
pub const MAX_SWITCH_NAME_LEN: usize = 23;
/// Delay between the phases of an actuation pulse.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(2);

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Failure to actuate a single switch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SwitchError {
    #[error("invalid target state {0}")]
    InvalidState(SwitchPosition),

    #[error("switch {0} not found")]
    NotFound(String),

    #[error("actuating {name} failed: {source}")]
    Actuation { name: String, source: TibError },
}

/// Failure to register, declare or apply a route.
///
/// Declaration errors leave the router untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouteError {
    #[error("switch table full ({MAX_SWITCHES} switches)")]
    SwitchTableFull,

    #[error("invalid switch name {0:?}")]
    InvalidSwitchName(String),

    #[error("switch {0} already registered")]
    DuplicateSwitch(String),

    #[error("route table full ({MAX_ROUTES} routes)")]
    RouteTableFull,

    #[error("route must have 1..={MAX_ROUTE_STEPS} steps, got {0}")]
    InvalidStepCount(usize),

    #[error("route step for {0} requires position A or B")]
    InvalidStepState(String),

    #[error("route step references unregistered switch {0}")]
    UnknownSwitch(String),

    #[error("route {input} -> {output} already defined")]
    DuplicateRoute { input: String, output: String },

    #[error("no route {input} -> {output}")]
    NoSuchRoute { input: String, output: String },

    /// A declared step names a switch the router no longer holds.
    #[error("route references missing switch {0}")]
    MissingSwitch(String),

    #[error("step {index} ({switch} -> {target}) failed: {source}")]
    StepFailed {
        index: usize,
        switch: String,
        target: SwitchPosition,
        source: SwitchError,
    },
}

impl From<RouteError> for TibError {
    fn from(e: RouteError) -> Self {
        match e {
            RouteError::NoSuchRoute { .. } => TibError::Validation {
                field: "route".to_string(),
                reason: e.to_string(),
            },
            RouteError::StepFailed { ref switch, .. } => {
                TibError::hardware(format!("switch {switch}"), e.to_string())
            }
            other => TibError::InternalConfig(other.to_string()),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Switch
// ────────────────────────────────────────────────────────────────────────────

/// Control lines of one switch: pulsing `a` moves it to position A.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchLines {
    pub a: PinId,
    pub b: PinId,
}

impl SwitchLines {
    pub fn new(a: PinId, b: PinId) -> Self {
        Self { a, b }
    }

    fn for_target(&self, target: SwitchPosition) -> Option<PinId> {
        match target {
            SwitchPosition::A => Some(self.a),
            SwitchPosition::B => Some(self.b),
            SwitchPosition::Unknown => None,
        }
    }
}

/// A two-position latching optical switch.
#[derive(Debug, Clone)]
pub struct Switch {
    name: String,
    lines: SwitchLines,
    state: SwitchPosition,
}

impl Switch {
    /// A switch in the [`SwitchPosition::Unknown`] state.
    pub fn new(name: impl Into<String>, lines: SwitchLines) -> Self {
        Self {
            name: name.into(),
            lines,
            state: SwitchPosition::Unknown,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lines(&self) -> SwitchLines {
        self.lines
    }

    pub fn state(&self) -> SwitchPosition {
        self.state
    }

    /// Pulse the control line for `target` and commit the new state.
    ///
    /// Blocks for three `settle` periods.
    ///
    /// # Errors
    ///
    /// - [`SwitchError::InvalidState`] for [`SwitchPosition::Unknown`]; no
    ///   line is touched.
    /// - [`SwitchError::Actuation`] when a line write fails; the logical state
    ///   is left unchanged.
    pub fn set_state(
        &mut self,
        gpio: &mut dyn DigitalOutput,
        target: SwitchPosition,
        settle: Duration,
    ) -> Result<(), SwitchError> {
        let Some(pin) = self.lines.for_target(target) else {
            error!(switch = %self.name, %target, "invalid switch target");
            return Err(SwitchError::InvalidState(target));
        };

        for level in [false, true, false] {
            gpio.set_pin(pin, level).map_err(|source| {
                error!(switch = %self.name, pin, error = %source, "switch pulse failed");
                SwitchError::Actuation {
                    name: self.name.clone(),
                    source,
                }
            })?;
            thread::sleep(settle);
        }

        debug!(switch = %self.name, pin, %target, "switch pulsed");
        self.state = target;
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Routes
// ────────────────────────────────────────────────────────────────────────────

/// One switch requirement along a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteStep {
    pub switch: String,
    pub state: SwitchPosition,
}

impl RouteStep {
    pub fn new(switch: impl Into<String>, state: SwitchPosition) -> Self {
        Self {
            switch: switch.into(),
            state,
        }
    }
}

/// `(input, output)` port pair identifying a route.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub input: String,
    pub output: String,
}

impl RouteKey {
    fn matches(&self, input: &str, output: &str) -> bool {
        self.input == input && self.output == output
    }
}

/// A declared route.  Immutable once declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    key: RouteKey,
    steps: Vec<RouteStep>,
}

impl Route {
    pub fn key(&self) -> &RouteKey {
        &self.key
    }

    pub fn steps(&self) -> &[RouteStep] {
        &self.steps
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Router
// ────────────────────────────────────────────────────────────────────────────

/// Owns the switch fabric, the GPIO lines driving it and the declared routes.
///
/// Several routes may be active at once; nothing prevents overlapping routes
/// that share switches from being satisfied simultaneously.
pub struct Router {
    gpio: Box<dyn DigitalOutput>,
    settle: Duration,
    switches: Vec<Switch>,
    routes: Vec<Route>,
}

impl Router {
    pub fn new(gpio: Box<dyn DigitalOutput>, settle: Duration) -> Self {
        Self {
            gpio,
            settle,
            switches: Vec::with_capacity(MAX_SWITCHES),
            routes: Vec::with_capacity(MAX_ROUTES),
        }
    }

    /// Register a switch in the [`SwitchPosition::Unknown`] state.
    ///
    /// # Errors
    ///
    /// [`RouteError::SwitchTableFull`], [`RouteError::InvalidSwitchName`] for
    /// an empty name or one longer than [`MAX_SWITCH_NAME_LEN`] bytes, or
    /// [`RouteError::DuplicateSwitch`].
    pub fn add_switch(&mut self, name: &str, lines: SwitchLines) -> Result<(), RouteError> {
        if self.switches.len() >= MAX_SWITCHES {
            return Err(RouteError::SwitchTableFull);
        }
        if name.is_empty() || name.len() > MAX_SWITCH_NAME_LEN {
            return Err(RouteError::InvalidSwitchName(name.to_string()));
        }
        if self.find_switch(name).is_some() {
            return Err(RouteError::DuplicateSwitch(name.to_string()));
        }
        self.switches.push(Switch::new(name, lines));
        Ok(())
    }

    pub fn find_switch(&self, name: &str) -> Option<&Switch> {
        self.switches.iter().find(|s| s.name == name)
    }

    pub fn switches(&self) -> &[Switch] {
        &self.switches
    }

    /// Actuate one switch by name.
    ///
    /// # Errors
    ///
    /// [`SwitchError::NotFound`] or any error of [`Switch::set_state`].
    pub fn set_switch(&mut self, name: &str, target: SwitchPosition) -> Result<(), SwitchError> {
        let idx = self
            .switch_index(name)
            .ok_or_else(|| SwitchError::NotFound(name.to_string()))?;
        self.switches[idx].set_state(self.gpio.as_mut(), target, self.settle)
    }

    /// Declare a route.  Nothing changes when the declaration is rejected.
    ///
    /// # Errors
    ///
    /// [`RouteError::RouteTableFull`], [`RouteError::InvalidStepCount`],
    /// [`RouteError::InvalidStepState`], [`RouteError::UnknownSwitch`] or
    /// [`RouteError::DuplicateRoute`].
    pub fn define_route(
        &mut self,
        input: &str,
        output: &str,
        steps: Vec<RouteStep>,
    ) -> Result<(), RouteError> {
        if self.routes.len() >= MAX_ROUTES {
            return Err(RouteError::RouteTableFull);
        }
        if steps.is_empty() || steps.len() > MAX_ROUTE_STEPS {
            return Err(RouteError::InvalidStepCount(steps.len()));
        }
        for step in &steps {
            if step.state == SwitchPosition::Unknown {
                return Err(RouteError::InvalidStepState(step.switch.clone()));
            }
            if self.find_switch(&step.switch).is_none() {
                return Err(RouteError::UnknownSwitch(step.switch.clone()));
            }
        }
        if self.get_route(input, output).is_some() {
            return Err(RouteError::DuplicateRoute {
                input: input.to_string(),
                output: output.to_string(),
            });
        }

        self.routes.push(Route {
            key: RouteKey {
                input: input.to_string(),
                output: output.to_string(),
            },
            steps,
        });
        Ok(())
    }

    pub fn get_route(&self, input: &str, output: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.key.matches(input, output))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Drive every step of the route `input -> output`, in declaration order.
    ///
    /// Stops at the first failing step.  Steps already applied stay applied,
    /// so a failure can leave the fabric between routes.
    ///
    /// # Errors
    ///
    /// - [`RouteError::NoSuchRoute`] when no such route is declared.
    /// - [`RouteError::MissingSwitch`] when a step's switch cannot be
    ///   resolved, which points at a configuration bug.
    /// - [`RouteError::StepFailed`] naming the failing step.
    pub fn apply_route(&mut self, input: &str, output: &str) -> Result<(), RouteError> {
        let steps = self
            .get_route(input, output)
            .map(|r| r.steps.clone())
            .ok_or_else(|| RouteError::NoSuchRoute {
                input: input.to_string(),
                output: output.to_string(),
            })?;

        for (index, step) in steps.into_iter().enumerate() {
            let Some(idx) = self.switch_index(&step.switch) else {
                error!(switch = %step.switch, "route references missing switch");
                return Err(RouteError::MissingSwitch(step.switch));
            };
            if let Err(source) =
                self.switches[idx].set_state(self.gpio.as_mut(), step.state, self.settle)
            {
                return Err(RouteError::StepFailed {
                    index,
                    switch: step.switch,
                    target: step.state,
                    source,
                });
            }
            info!(switch = %step.switch, state = %step.state, "set switch");
        }
        Ok(())
    }

    /// Keys of every route whose steps are all satisfied, in declaration
    /// order, at most `limit` of them.
    pub fn active_routes(&self, limit: usize) -> Vec<&RouteKey> {
        self.routes
            .iter()
            .filter(|r| self.is_active(r))
            .take(limit)
            .map(|r| &r.key)
            .collect()
    }

    fn is_active(&self, route: &Route) -> bool {
        route.steps.iter().all(|step| {
            self.find_switch(&step.switch)
                .is_some_and(|sw| sw.state == step.state)
        })
    }

    fn switch_index(&self, name: &str) -> Option<usize> {
        self.switches.iter().position(|s| s.name == name)
    }
}
