mod buffer_source;
mod oscillator;

pub use buffer_source::*;
pub use oscillator::*;
