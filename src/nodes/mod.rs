//! Built-in audio nodes.
//!
//! Nodes are organized into three categories:
//!
//! ## Sources ([`source`])
//!
//! Generate audio and ignore their inputs:
//! - [`Oscillator`] - Sine, square, sawtooth and triangle waves with frequency/detune automation
//! - [`BufferSource`] - Play a decoded [`AudioBuffer`](crate::AudioBuffer), optionally looping
//!
//! ## Effects ([`effect`])
//!
//! Process their first input:
//! - [`Gain`] - Per-frame automated volume
//! - [`Biquad`] - RBJ cookbook filters
//! - [`Analyser`] - Pass-through with a time-domain capture
//! - [`Panner`] - Distance attenuation and equal-power panning against the listener
//!
//! ## Sinks ([`sink`])
//!
//! - [`Destination`] - Sums every input and clips; owned by the [`Engine`](crate::Engine)
//!
//! Parameters are [`AudioParam`](crate::AudioParam)s reached through each
//! node's accessors or by [`ParamName`](crate::ParamName).

pub mod source;
pub mod effect;
pub mod sink;

// Re-export common types at the top level for convenience
pub use source::{BufferSource, Oscillator, OscillatorType};
pub use effect::{Analyser, Biquad, BiquadCoefficients, BiquadType, Gain, Panner};
pub use sink::Destination;
