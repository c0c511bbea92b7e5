//! The two sample-stream filters: a high-pass used purely for polarity and
//! zero-crossing detection, and a low-pass tracker for the shared DC offset
//! that both ADC channels sit on.

/// Sign of the high-pass filtered voltage. Zero counts as positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Positive,
    Negative,
}

/// First-order high-pass filter over the raw voltage stream.
///
/// Recurrence: `filtered[n] = alpha * (filtered[n-1] + raw[n] - raw[n-1])`.
/// Its output exists only to classify each sample's polarity and to spot the
/// positive-going transition that marks a new mains cycle; energy is never
/// computed from it.
#[derive(Debug, Clone)]
pub struct PolarityFilter {
    alpha: f64,
    last_raw: f64,
    filtered: f64,
    polarity: Polarity,
    primed: bool,
}

impl PolarityFilter {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            last_raw: 0.0,
            filtered: 0.0,
            polarity: Polarity::Positive,
            primed: false,
        }
    }

    /// Feeds one raw voltage sample; returns true exactly when this sample
    /// begins a new mains cycle (previous sample negative, this one positive).
    pub fn update(&mut self, raw_voltage: f64) -> bool {
        if !self.primed {
            // First ever sample only seeds the delta history
            self.last_raw = raw_voltage;
            self.primed = true;
            return false;
        }
        self.filtered = self.alpha * (self.filtered + raw_voltage - self.last_raw);
        self.last_raw = raw_voltage;

        let previous = self.polarity;
        self.polarity = if self.filtered >= 0.0 {
            Polarity::Positive
        } else {
            Polarity::Negative
        };
        previous == Polarity::Negative && self.polarity == Polarity::Positive
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }
}

/// Slowly-adapting estimate of the DC bias shared by the voltage and current
/// channels. Per-sample deltas are summed during the cycle; the offset itself
/// moves only once per cycle, at the boundary, from the cycle just completed.
#[derive(Debug, Clone)]
pub struct DcOffsetTracker {
    gain: f64,
    offset: f64,
    cycle_delta_sum: f64,
}

impl DcOffsetTracker {
    pub fn new(gain: f64, initial_offset: f64) -> Self {
        Self {
            gain,
            offset: initial_offset,
            cycle_delta_sum: 0.0,
        }
    }

    /// Current offset estimate, stable for the duration of a cycle.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Accumulates one voltage sample's deviation from the current estimate.
    pub fn accumulate(&mut self, raw_voltage: f64) {
        self.cycle_delta_sum += raw_voltage - self.offset;
    }

    /// Applies the completed cycle's accumulated deltas to the estimate and
    /// clears the sum. Call exactly once per cycle boundary, before the new
    /// cycle's first sample is accumulated.
    pub fn settle_cycle(&mut self) {
        self.offset += self.gain * self.cycle_delta_sum;
        self.cycle_delta_sum = 0.0;
    }
}
