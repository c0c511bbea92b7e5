//! Best-effort observation of cycle settlements. The observer is injected at
//! construction time and called synchronously at each settlement; it must not
//! block, and the default is a no-op.

use crate::trigger::ActuatorState;

/// Snapshot handed to the observer after each cycle-boundary settlement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    /// Boundary count since startup, including settling cycles.
    pub cycle_index: u64,
    /// Mean real power over the settled cycle, in Watts.
    pub real_power: f64,
    /// Energy the cycle contributed, in Joules.
    pub real_energy: f64,
    /// Bucket level after the update (unchanged while settling).
    pub bucket_level: f64,
    /// Samples the settled cycle covered.
    pub sample_count: u32,
    /// True while the startup settling window suppresses bucket updates.
    pub settling: bool,
    /// Actuator state latched in the previous cycle.
    pub actuator: ActuatorState,
}

/// Receives one report per settled cycle.
pub trait SettlementObserver {
    fn on_settlement(&mut self, report: &CycleReport);
}

/// Default observer: does nothing.
#[derive(Debug, Default)]
pub struct NullObserver;

impl SettlementObserver for NullObserver {
    fn on_settlement(&mut self, _report: &CycleReport) {}
}

/// Emits a tracing event every N cycles. N = 0 disables emission entirely.
#[derive(Debug)]
pub struct RateLimitedReporter {
    every_cycles: u32,
}

impl RateLimitedReporter {
    pub fn new(every_cycles: u32) -> Self {
        Self { every_cycles }
    }
}

impl SettlementObserver for RateLimitedReporter {
    fn on_settlement(&mut self, report: &CycleReport) {
        if self.every_cycles == 0 || report.cycle_index % self.every_cycles as u64 != 0 {
            return;
        }
        tracing::info!(
            cycle = report.cycle_index,
            power_w = report.real_power,
            bucket_j = report.bucket_level,
            settling = report.settling,
            actuator = ?report.actuator,
            "cycle settled"
        );
    }
}

/// Test observer that keeps every report.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub reports: Vec<CycleReport>,
}

impl SettlementObserver for RecordingObserver {
    fn on_settlement(&mut self, report: &CycleReport) {
        self.reports.push(*report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(cycle_index: u64) -> CycleReport {
        CycleReport {
            cycle_index,
            real_power: 100.0,
            real_energy: 2.0,
            bucket_level: 10.0,
            sample_count: 40,
            settling: false,
            actuator: ActuatorState::Off,
        }
    }

    #[test]
    fn test_recording_observer_keeps_all_reports() {
        let mut observer = RecordingObserver::default();
        for n in 0..5 {
            observer.on_settlement(&report(n));
        }
        assert_eq!(observer.reports.len(), 5);
        assert_eq!(observer.reports[3].cycle_index, 3);
    }

    #[test]
    fn test_disabled_reporter_is_silent() {
        // Must not panic or divide by the zero period
        let mut reporter = RateLimitedReporter::new(0);
        reporter.on_settlement(&report(0));
        reporter.on_settlement(&report(1));
    }
}
