//! The diverter context: owns every piece of per-sample and per-cycle state
//! and runs the whole pipeline for one sample pair at a time.
//!
//! Processing order per sample: high-pass polarity update → cycle-boundary
//! settlement (DC tracker, energy, bucket, re-arm) → trigger arming check →
//! unconditional power accumulation. Settlement completes before any sample
//! of the new cycle touches the updated state.

use crate::config::DiverterConfig;
use crate::diagnostics::{CycleReport, NullObserver, SettlementObserver};
use crate::energy_bucket::EnergyBucket;
use crate::filters::{DcOffsetTracker, Polarity, PolarityFilter};
use crate::integrator::CycleAccumulator;
use crate::sample_source::SamplePair;
use crate::trigger::{ActuatorOutput, LoggingActuator, TriggerController};

/// Single-threaded surplus-diversion pipeline. Generic over the actuator sink
/// and settlement observer so that simulations can record both.
pub struct Diverter<A: ActuatorOutput, O: SettlementObserver> {
    config: DiverterConfig,
    polarity_filter: PolarityFilter,
    dc_tracker: DcOffsetTracker,
    accumulator: CycleAccumulator,
    bucket: EnergyBucket,
    trigger: TriggerController,
    actuator: A,
    observer: O,
    cycle_index: u64,
    settle_cycles_remaining: u32,
}

impl Diverter<LoggingActuator, NullObserver> {
    /// Builds a diverter with the default output sinks: a tracing-only
    /// actuator line and no settlement observation.
    pub fn with_default_outputs(config: DiverterConfig) -> anyhow::Result<Self> {
        Self::new(config, LoggingActuator::default(), NullObserver)
    }
}

impl<A: ActuatorOutput, O: SettlementObserver> Diverter<A, O> {
    /// Builds a diverter from a validated configuration.
    pub fn new(config: DiverterConfig, actuator: A, observer: O) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self {
            polarity_filter: PolarityFilter::new(config.hp_filter_alpha),
            dc_tracker: DcOffsetTracker::new(config.dc_tracker_gain, config.nominal_adc_midpoint),
            accumulator: CycleAccumulator::new(),
            bucket: EnergyBucket::new(config.bucket_capacity_joules),
            trigger: TriggerController::new(config.arming_threshold_volts, config.voltage_cal),
            actuator,
            observer,
            cycle_index: 0,
            settle_cycles_remaining: config.startup_settle_cycles,
            config,
        })
    }

    /// Processes one sample pair to completion.
    pub fn process_sample(&mut self, pair: SamplePair) -> anyhow::Result<()> {
        if self.polarity_filter.update(pair.voltage) {
            self.settle_cycle_boundary()?;
        }

        if self.polarity_filter.polarity() == Polarity::Positive {
            let zero_ref_voltage = pair.voltage - self.dc_tracker.offset();
            self.trigger.try_fire(
                zero_ref_voltage,
                &self.bucket,
                self.cycle_index,
                &mut self.actuator,
            );
        }

        // Runs on every sample, both polarities, boundary or not
        let offset = self.dc_tracker.offset();
        self.dc_tracker.accumulate(pair.voltage);
        self.accumulator
            .add_sample(pair.voltage - offset, pair.current - offset);
        Ok(())
    }

    /// Drains a source until it is exhausted.
    pub fn run<S: crate::sample_source::SampleSource>(
        &mut self,
        source: &mut S,
    ) -> anyhow::Result<()> {
        while let Some(pair) = source.next_pair() {
            self.process_sample(pair)?;
        }
        Ok(())
    }

    /// Everything that happens exactly once per positive-going zero crossing,
    /// in fixed order: DC-offset update from the completed cycle, energy
    /// settlement, bucket update (suppressed while settling), re-arming, and
    /// accumulator reset.
    fn settle_cycle_boundary(&mut self) -> anyhow::Result<()> {
        self.cycle_index += 1;
        self.dc_tracker.settle_cycle();

        let energy = self
            .accumulator
            .settle_cycle(self.config.power_cal, self.config.cycles_per_second)?;

        let settling = self.settle_cycles_remaining > 0;
        if settling {
            // Filters are still converging; keep the bucket at its initial
            // value rather than feed it garbage
            self.settle_cycles_remaining -= 1;
        } else {
            let margin_joules = self.config.safety_margin_watts / self.config.cycles_per_second;
            self.bucket.apply(energy.real_energy - margin_joules);
        }

        self.trigger.arm();

        self.observer.on_settlement(&CycleReport {
            cycle_index: self.cycle_index,
            real_power: energy.real_power,
            real_energy: energy.real_energy,
            bucket_level: self.bucket.level(),
            sample_count: energy.sample_count,
            settling,
            actuator: self.trigger.state(),
        });
        Ok(())
    }

    pub fn bucket(&self) -> &EnergyBucket {
        &self.bucket
    }

    /// Boundaries seen since startup, settling cycles included.
    pub fn cycles_seen(&self) -> u64 {
        self.cycle_index
    }

    /// True until the startup settling window has elapsed.
    pub fn is_settling(&self) -> bool {
        self.settle_cycles_remaining > 0
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::RecordingObserver;
    use crate::sample_source::SyntheticSource;
    use crate::trigger::RecordingActuator;

    fn run_cycles(
        config: &DiverterConfig,
        surplus_watts: f64,
        seconds: f64,
    ) -> Diverter<RecordingActuator, RecordingObserver> {
        let mut diverter = Diverter::new(
            config.clone(),
            RecordingActuator::new(),
            RecordingObserver::default(),
        )
        .unwrap();
        let mut source =
            SyntheticSource::new(config, surplus_watts).for_duration(config, seconds);
        diverter.run(&mut source).unwrap();
        diverter
    }

    #[test]
    fn test_default_outputs_run_the_pipeline() {
        let config = DiverterConfig::default();
        let mut diverter = Diverter::with_default_outputs(config.clone()).unwrap();
        let mut source = SyntheticSource::new(&config, 100.0).for_duration(&config, 1.0);
        diverter.run(&mut source).unwrap();
        assert!(diverter.cycles_seen() > 40);
    }

    #[test]
    fn test_settlement_order_reports_every_cycle_once() {
        let config = DiverterConfig::default();
        let diverter = run_cycles(&config, 100.0, 1.0);
        let reports = &diverter.observer().reports;
        assert!(!reports.is_empty());
        for (n, report) in reports.iter().enumerate() {
            assert_eq!(report.cycle_index, n as u64 + 1);
        }
    }

    #[test]
    fn test_startup_suppression_holds_bucket_at_zero() {
        let config = DiverterConfig::default();
        // Huge surplus, still no bucket movement inside the settling window
        let diverter = run_cycles(&config, 5000.0, 3.0);
        let reports = &diverter.observer().reports;
        assert!(reports.len() as u32 > config.startup_settle_cycles);
        for report in reports
            .iter()
            .take(config.startup_settle_cycles as usize)
        {
            assert!(report.settling);
            assert_eq!(report.bucket_level, 0.0);
        }
        assert!(!reports[config.startup_settle_cycles as usize].settling);
    }

    #[test]
    fn test_cycle_counting_matches_mains_frequency() {
        let config = DiverterConfig::default();
        let seconds = 4.0;
        let diverter = run_cycles(&config, 100.0, seconds);
        let expected = (seconds * config.cycles_per_second) as i64;
        let seen = diverter.cycles_seen() as i64;
        assert!(
            (seen - expected).abs() <= 1,
            "saw {seen} cycles, expected ~{expected}"
        );
    }

    #[test]
    fn test_sample_counts_per_cycle_are_sane() {
        let config = DiverterConfig::default();
        let diverter = run_cycles(&config, 100.0, 2.0);
        let nominal = config.samples_per_cycle();
        // Skip the first partial cycle and the filter transient
        for report in diverter.observer().reports.iter().skip(5) {
            let count = report.sample_count as f64;
            assert!(
                (count - nominal).abs() <= 2.0,
                "cycle {} covered {} samples",
                report.cycle_index,
                report.sample_count
            );
        }
    }

    #[test]
    fn test_measured_power_tracks_requested_surplus() {
        let config = DiverterConfig::default();
        let diverter = run_cycles(&config, 250.0, 3.0);
        // Post-settling cycles should measure close to the injected surplus
        let late: Vec<_> = diverter
            .observer()
            .reports
            .iter()
            .filter(|r| !r.settling)
            .collect();
        assert!(!late.is_empty());
        for report in late {
            assert!(
                (report.real_power - 250.0).abs() < 5.0,
                "cycle {} measured {} W",
                report.cycle_index,
                report.real_power
            );
        }
    }

    #[test]
    fn test_safety_margin_drains_idle_bucket() {
        let config = DiverterConfig {
            safety_margin_watts: 50.0,
            ..Default::default()
        };
        // Zero surplus: bucket can only be drained, and it starts empty
        let diverter = run_cycles(&config, 0.0, 3.0);
        assert_eq!(diverter.bucket().level(), 0.0);
        assert_eq!(
            diverter.actuator().last_state(),
            Some(crate::trigger::ActuatorState::Off)
        );
    }
}
