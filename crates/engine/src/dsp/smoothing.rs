/// Time constant for gain changes (~5 ms).
pub const GAIN_SMOOTHING_SECS: f32 = 0.005;

/// One-pole smoother toward a target value.
#[derive(Debug, Clone)]
pub struct SmoothedValue {
    current: f32,
    target: f32,
    coeff: f32,
}

impl SmoothedValue {
    /// Starts settled at `value`.
    pub fn new(value: f32, sample_rate: u32, time_constant_secs: f32) -> Self {
        let coeff = if time_constant_secs > 0.0 {
            (-1.0 / (time_constant_secs * sample_rate as f32)).exp()
        } else {
            0.0
        };
        Self {
            current: value,
            target: value,
            coeff,
        }
    }

    pub fn for_gain(value: f32, sample_rate: u32) -> Self {
        Self::new(value, sample_rate, GAIN_SMOOTHING_SECS)
    }

    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// Jump straight to `value`.
    pub fn set_immediate(&mut self, value: f32) {
        self.current = value;
        self.target = value;
    }

    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.current != self.target {
            self.current = self.target + (self.current - self.target) * self.coeff;
            if (self.current - self.target).abs() < 1e-6 {
                self.current = self.target;
            }
        }
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn is_settled(&self) -> bool {
        self.current == self.target
    }
}
