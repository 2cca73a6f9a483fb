pub mod biquad;
pub mod convolver;
pub mod impulse;
pub mod smoothing;

pub use biquad::PeakingFilter;
pub use convolver::Convolver;
pub use smoothing::SmoothedValue;
