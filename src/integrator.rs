use anyhow::bail;

/// Per-cycle accumulator of instantaneous power. Fed unconditionally on every
/// sample pair, drained and reset exactly once per mains cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleAccumulator {
    sum_instantaneous_power: f64,
    sample_count: u32,
}

/// What one completed mains cycle settled to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleEnergy {
    /// Mean real power over the cycle, in Watts.
    pub real_power: f64,
    /// Energy contributed by the cycle, in Joules.
    pub real_energy: f64,
    /// Samples the mean was taken over.
    pub sample_count: u32,
}

impl CycleAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one sample pair's instantaneous power, already DC-corrected.
    pub fn add_sample(&mut self, zero_ref_voltage: f64, zero_ref_current: f64) {
        self.sum_instantaneous_power += zero_ref_voltage * zero_ref_current;
        self.sample_count += 1;
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Converts the accumulated cycle into real power and energy, then resets.
    ///
    /// A cycle with zero samples means the sample rate cannot cover the mains
    /// frequency; that is a fatal configuration error, never a silent
    /// division by zero.
    pub fn settle_cycle(
        &mut self,
        power_cal: f64,
        cycles_per_second: f64,
    ) -> anyhow::Result<CycleEnergy> {
        if self.sample_count == 0 {
            bail!("mains cycle settled with zero samples; sample rate cannot cover the mains frequency");
        }
        let real_power = power_cal * self.sum_instantaneous_power / self.sample_count as f64;
        let settled = CycleEnergy {
            real_power,
            real_energy: real_power / cycles_per_second,
            sample_count: self.sample_count,
        };
        self.sum_instantaneous_power = 0.0;
        self.sample_count = 0;
        Ok(settled)
    }
}
