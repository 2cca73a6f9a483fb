use std::f64::consts::PI;

use echo_transport::MAX_CHANNELS;

/// Peaking EQ biquad (RBJ cookbook), Direct Form I.
///
/// Coefficients are computed in f64 and normalized by `a0`. At 0 dB the
/// feed-forward and feedback terms cancel and the filter passes its input
/// through up to rounding.
#[derive(Debug, Clone)]
pub struct PeakingFilter {
    sample_rate: f64,
    frequency: f64,
    q: f64,
    gain_db: f64,

    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,

    // x1, x2, y1, y2 per channel
    state: [[f64; 4]; MAX_CHANNELS],
}

impl PeakingFilter {
    pub fn new(sample_rate: u32, frequency: f64, q: f64, gain_db: f64) -> Self {
        let mut filter = Self {
            sample_rate: sample_rate as f64,
            frequency,
            q,
            gain_db,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            state: [[0.0; 4]; MAX_CHANNELS],
        };
        filter.calculate_coefficients();
        filter
    }

    pub fn set_gain_db(&mut self, gain_db: f64) {
        self.gain_db = gain_db;
        self.calculate_coefficients();
    }

    pub fn gain_db(&self) -> f64 {
        self.gain_db
    }

    fn calculate_coefficients(&mut self) {
        let a = 10f64.powf(self.gain_db / 40.0);
        let omega = 2.0 * PI * self.frequency / self.sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();
        let alpha = sin_omega / (2.0 * self.q);

        let b0 = 1.0 + alpha * a;
        let b1 = -2.0 * cos_omega;
        let b2 = 1.0 - alpha * a;
        let a0 = 1.0 + alpha / a;
        let a1 = -2.0 * cos_omega;
        let a2 = 1.0 - alpha / a;

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
    }

    #[inline]
    pub fn process_sample(&mut self, channel: usize, input: f32) -> f32 {
        let [x1, x2, y1, y2] = &mut self.state[channel];
        let x = input as f64;

        let output = self.b0 * x + self.b1 * *x1 + self.b2 * *x2 - self.a1 * *y1 - self.a2 * *y2;

        *x2 = *x1;
        *x1 = x;
        *y2 = *y1;
        *y1 = output;

        output as f32
    }

    /// Magnitude response in dB at `frequency`.
    pub fn response_db(&self, frequency: f64) -> f64 {
        let w = 2.0 * PI * frequency / self.sample_rate;
        let (cos1, sin1) = (w.cos(), w.sin());
        let (cos2, sin2) = ((2.0 * w).cos(), (2.0 * w).sin());

        let num_re = self.b0 + self.b1 * cos1 + self.b2 * cos2;
        let num_im = -(self.b1 * sin1 + self.b2 * sin2);
        let den_re = 1.0 + self.a1 * cos1 + self.a2 * cos2;
        let den_im = -(self.a1 * sin1 + self.a2 * sin2);

        let magnitude =
            ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt();
        20.0 * magnitude.log10()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(gain_db: f64) -> PeakingFilter {
        PeakingFilter::new(44100, 80.0, 3.0, gain_db)
    }

    #[test]
    fn zero_gain_is_identity() {
        let mut f = filter(0.0);
        for i in 0..2000 {
            let x = ((i as f32) * 0.37).sin() * 0.8;
            assert!((f.process_sample(0, x) - x).abs() < 1e-6);
        }
    }

    #[test]
    fn boost_peaks_at_center() {
        let f = filter(12.0);
        assert!((f.response_db(80.0) - 12.0).abs() < 0.01);
        assert!(f.response_db(2000.0).abs() < 0.5);
    }

    #[test]
    fn cut_is_symmetric() {
        let f = filter(-9.0);
        assert!((f.response_db(80.0) + 9.0).abs() < 0.01);
    }

    #[test]
    fn channels_keep_separate_state() {
        let mut f = filter(6.0);
        f.process_sample(0, 1.0);
        let right = f.process_sample(1, 0.0);
        assert_eq!(right, 0.0);
    }

    #[test]
    fn set_gain_recomputes() {
        let mut f = filter(0.0);
        f.set_gain_db(6.0);
        assert_eq!(f.gain_db(), 6.0);
        assert!((f.response_db(80.0) - 6.0).abs() < 0.01);
    }
}
