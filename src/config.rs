use anyhow::{bail, Context};
use serde_derive::Deserialize;
use std::{env, fs, path::Path};

/// Smallest tolerable sample-rate to mains-frequency ratio. Below this a
/// cycle could settle on too few samples for the mean-power estimate (and a
/// pathological setup could even present an empty cycle), so it is rejected
/// up front as a configuration error.
pub const MIN_SAMPLES_PER_CYCLE: f64 = 8.0;

/// All fixed-at-start parameters of the diverter. Nothing here is mutable at
/// runtime; the struct is validated once and then shared by value.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiverterConfig {
    /// Converts a per-cycle mean of raw ADC-unit products into Watts.
    pub power_cal: f64,
    /// Converts DC-corrected ADC units into Volts (arming threshold only).
    pub voltage_cal: f64,
    /// Export bias subtracted from the bucket every cycle, in Watts.
    pub safety_margin_watts: f64,
    /// Upper bound of the energy bucket, in Joules.
    pub bucket_capacity_joules: f64,
    /// Mains frequency (50 or 60 in practice).
    pub cycles_per_second: f64,
    /// Voltage past which the trigger decision is latched on the rising
    /// half-wave. Must leave the external zero-crossing device margin to fire.
    pub arming_threshold_volts: f64,
    /// Cycles to wait after power-up before the bucket is trusted with data;
    /// covers the settling time of both filters.
    pub startup_settle_cycles: u32,
    /// Leak coefficient of the polarity high-pass filter.
    pub hp_filter_alpha: f64,
    /// Per-cycle gain of the DC-offset low-pass tracker.
    pub dc_tracker_gain: f64,
    /// Initial guess for the shared DC offset, in raw ADC units.
    pub nominal_adc_midpoint: f64,
    /// ADC sample-pair rate, used only to validate the samples-per-cycle ratio.
    pub sample_rate_hz: f64,
    /// Emit a settlement report every N cycles; 0 disables reporting.
    pub report_every_cycles: u32,
}

impl Default for DiverterConfig {
    fn default() -> Self {
        Self {
            power_cal: 0.085,
            voltage_cal: 1.44,
            safety_margin_watts: 0.0,
            bucket_capacity_joules: 3600.0,
            cycles_per_second: 50.0,
            arming_threshold_volts: 20.0,
            startup_settle_cycles: 100,
            hp_filter_alpha: 0.996,
            dc_tracker_gain: 0.01,
            nominal_adc_midpoint: 512.0,
            sample_rate_hz: 2000.0,
            report_every_cycles: 50,
        }
    }
}

impl DiverterConfig {
    /// Loads the configuration from the JSON file named by the
    /// `DIVERTER_CONFIG` environment variable, falling back to the built-in
    /// defaults when the variable is unset.
    pub fn from_env() -> anyhow::Result<Self> {
        let config = match env::var("DIVERTER_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates the configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Reading diverter config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Parsing diverter config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects parameter combinations the control loop cannot run on.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bucket_capacity_joules <= 0.0 {
            bail!("bucket_capacity_joules must be positive");
        }
        if self.cycles_per_second <= 0.0 {
            bail!("cycles_per_second must be positive");
        }
        if self.power_cal <= 0.0 || self.voltage_cal <= 0.0 {
            bail!("power_cal and voltage_cal must be positive");
        }
        if !(0.0..1.0).contains(&self.hp_filter_alpha) {
            bail!("hp_filter_alpha must lie in [0, 1)");
        }
        if !(0.0..1.0).contains(&self.dc_tracker_gain) {
            bail!("dc_tracker_gain must lie in [0, 1)");
        }
        if self.safety_margin_watts < 0.0 {
            bail!("safety_margin_watts must not be negative");
        }
        if self.sample_rate_hz / self.cycles_per_second < MIN_SAMPLES_PER_CYCLE {
            bail!(
                "sample_rate_hz {} gives fewer than {} samples per {} Hz mains cycle",
                self.sample_rate_hz,
                MIN_SAMPLES_PER_CYCLE,
                self.cycles_per_second
            );
        }
        Ok(())
    }

    /// Samples per mains cycle implied by the configured rates.
    pub fn samples_per_cycle(&self) -> f64 {
        self.sample_rate_hz / self.cycles_per_second
    }
}
