mod analyser;
mod biquad;
mod gain;
mod panner;

pub use analyser::*;
pub use biquad::*;
pub use gain::*;
pub use panner::*;
