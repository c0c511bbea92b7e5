//! Trigger arming, the once-per-cycle on/off decision, and the actuator
//! output seam.
//!
//! Power is integrated between positive-going zero crossings, but the triac
//! physically switches at the following negative-going crossing: the decision
//! is latched part-way up the positive half-wave, late enough that the
//! external zero-crossing device has fired, early enough to reach the triac
//! before its firing window.

use crate::energy_bucket::EnergyBucket;

/// Logical actuator state: is the dump load being fed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorState {
    On,
    Off,
}

/// Electrical level on the trigger line. The trigger is active-low: `On`
/// drives the line `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineLevel {
    Low,
    High,
}

impl ActuatorState {
    pub fn line_level(self) -> LineLevel {
        match self {
            ActuatorState::On => LineLevel::Low,
            ActuatorState::Off => LineLevel::High,
        }
    }

    /// Indicator LED mirrors the logical state, active-high.
    pub fn indicator(self) -> bool {
        self == ActuatorState::On
    }
}

/// Side-effecting sink for the trigger line and indicator. Real deployments
/// drive GPIO here; tests record the sequence instead.
pub trait ActuatorOutput {
    fn write(&mut self, cycle_index: u64, line: LineLevel, indicator: bool);
}

/// Test/simulation sink that keeps every write as a `(cycle, state)` pair for
/// golden-output comparison.
#[derive(Debug, Default)]
pub struct RecordingActuator {
    events: Vec<(u64, ActuatorState)>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[(u64, ActuatorState)] {
        &self.events
    }

    /// The cycle index of the first `On` decision, if any was made.
    pub fn first_on_cycle(&self) -> Option<u64> {
        self.events
            .iter()
            .find(|(_, state)| *state == ActuatorState::On)
            .map(|(cycle, _)| *cycle)
    }

    pub fn last_state(&self) -> Option<ActuatorState> {
        self.events.last().map(|(_, state)| *state)
    }
}

impl ActuatorOutput for RecordingActuator {
    fn write(&mut self, cycle_index: u64, line: LineLevel, _indicator: bool) {
        let state = match line {
            LineLevel::Low => ActuatorState::On,
            LineLevel::High => ActuatorState::Off,
        };
        self.events.push((cycle_index, state));
    }
}

/// Default live sink: nothing but a trace event on state transitions, so the
/// hot path never waits on I/O.
#[derive(Debug, Default)]
pub struct LoggingActuator {
    last: Option<ActuatorState>,
}

impl ActuatorOutput for LoggingActuator {
    fn write(&mut self, cycle_index: u64, line: LineLevel, _indicator: bool) {
        let state = match line {
            LineLevel::Low => ActuatorState::On,
            LineLevel::High => ActuatorState::Off,
        };
        if self.last != Some(state) {
            tracing::info!(cycle = cycle_index, ?state, "trigger transition");
            self.last = Some(state);
        }
    }
}

/// Arms once per cycle boundary and latches exactly one decision per cycle
/// once the rising voltage clears the arming threshold.
#[derive(Debug, Clone)]
pub struct TriggerController {
    arming_threshold_volts: f64,
    voltage_cal: f64,
    arm_pending: bool,
    state: ActuatorState,
}

impl TriggerController {
    pub fn new(arming_threshold_volts: f64, voltage_cal: f64) -> Self {
        Self {
            arming_threshold_volts,
            voltage_cal,
            arm_pending: false,
            state: ActuatorState::Off,
        }
    }

    /// Raised at every cycle boundary; the decision itself is deferred to the
    /// arming point.
    pub fn arm(&mut self) {
        self.arm_pending = true;
    }

    pub fn state(&self) -> ActuatorState {
        self.state
    }

    /// Runs on positive-polarity samples. Once the DC-corrected voltage
    /// clears the arming threshold, decides from the bucket level, writes the
    /// actuator, and disarms until the next boundary. Returns the latched
    /// state when a decision was made on this sample.
    pub fn try_fire(
        &mut self,
        zero_ref_voltage: f64,
        bucket: &EnergyBucket,
        cycle_index: u64,
        output: &mut dyn ActuatorOutput,
    ) -> Option<ActuatorState> {
        if !self.arm_pending {
            return None;
        }
        if zero_ref_voltage * self.voltage_cal <= self.arming_threshold_volts {
            return None;
        }
        self.state = if bucket.above_midpoint() {
            ActuatorState::On
        } else {
            ActuatorState::Off
        };
        output.write(cycle_index, self.state.line_level(), self.state.indicator());
        self.arm_pending = false;
        Some(self.state)
    }
}
