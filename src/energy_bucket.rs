/// The net-metering register at the heart of the diverter: accumulated
/// exportable energy in Joules, hard-bounded to `[0, capacity]`.
#[derive(Debug, Clone)]
pub struct EnergyBucket {
    level: f64,
    capacity: f64,
}

impl EnergyBucket {
    /// Creates an empty bucket with the given capacity in Joules.
    pub fn new(capacity: f64) -> Self {
        Self {
            level: 0.0,
            capacity,
        }
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Applies one cycle's net energy change and clamps. The clamp runs on
    /// every update; it is the bucket's sole numeric bound.
    pub fn apply(&mut self, delta_joules: f64) {
        self.level = (self.level + delta_joules).clamp(0.0, self.capacity);
    }

    /// True when the bucket holds more than half its capacity — the point at
    /// which the diverter switches the dump load on. The comparison is
    /// strictly greater-than.
    pub fn above_midpoint(&self) -> bool {
        self.level > self.capacity / 2.0
    }
}
