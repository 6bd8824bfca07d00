//! Periodic waveform oscillator

use core::f64::consts::TAU;
use core::str::FromStr;

use crate::error::{Error, Result};
use crate::node::{AudioNode, ProcessContext, Pull};
use crate::param::AudioParam;

/// Waveform shapes an [`Oscillator`] can produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OscillatorType {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl OscillatorType {
    /// Sample the waveform at normalized phase `x` in `[0, 1)`.
    #[inline]
    pub fn sample(self, x: f64) -> f32 {
        match self {
            OscillatorType::Sine => (TAU * x).sin() as f32,
            OscillatorType::Square => {
                if x < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            OscillatorType::Sawtooth => (2.0 * x - 1.0) as f32,
            OscillatorType::Triangle => (4.0 * (x - 0.5).abs() - 1.0) as f32,
        }
    }

    /// The Web Audio name of the waveform, as accepted by `FromStr`.
    pub fn as_str(self) -> &'static str {
        match self {
            OscillatorType::Sine => "sine",
            OscillatorType::Square => "square",
            OscillatorType::Sawtooth => "sawtooth",
            OscillatorType::Triangle => "triangle",
        }
    }
}

impl FromStr for OscillatorType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "sine" => OscillatorType::Sine,
            "square" => OscillatorType::Square,
            "sawtooth" => OscillatorType::Sawtooth,
            "triangle" => OscillatorType::Triangle,
            _ => return Err(Error::BadArgument("unknown oscillator type")),
        })
    }
}

/// A scheduled periodic source.
///
/// Silent until [`start`](Self::start) is called and transport time reaches
/// the start time; silent again from the stop time on (a stop time of `0.0`
/// means "never").
pub struct Oscillator {
    kind: OscillatorType,
    frequency: AudioParam,
    /// Cents.
    detune: AudioParam,
    /// Normalized phase in `[0, 1)`.
    phase: f64,
    started: bool,
    start_time: f64,
    stop_time: f64,
}

impl Oscillator {
    /// An unstarted 440 Hz sine.
    pub fn new() -> Self {
        Self {
            kind: OscillatorType::Sine,
            frequency: AudioParam::new(440.0),
            detune: AudioParam::new(0.0),
            phase: 0.0,
            started: false,
            start_time: 0.0,
            stop_time: 0.0,
        }
    }

    #[inline]
    pub fn oscillator_type(&self) -> OscillatorType {
        self.kind
    }

    /// Switch waveform without resetting the phase.
    pub fn set_type(&mut self, kind: OscillatorType) {
        self.kind = kind;
    }

    /// Frequency in Hz.
    #[inline]
    pub fn frequency(&self) -> &AudioParam {
        &self.frequency
    }

    #[inline]
    pub fn frequency_mut(&mut self) -> &mut AudioParam {
        &mut self.frequency
    }

    /// Detune in cents, applied on top of the frequency.
    #[inline]
    pub fn detune(&self) -> &AudioParam {
        &self.detune
    }

    #[inline]
    pub fn detune_mut(&mut self) -> &mut AudioParam {
        &mut self.detune
    }

    /// Begin producing output at `when` seconds.
    pub fn start(&mut self, when: f64) {
        self.started = true;
        self.start_time = when.max(0.0);
    }

    /// Stop producing output at `when` seconds.
    pub fn stop(&mut self, when: f64) {
        self.stop_time = when.max(0.0);
    }

    #[inline]
    pub fn is_started(&self) -> bool {
        self.started
    }

    #[inline]
    fn is_active(&self, t: f64) -> bool {
        self.started && t >= self.start_time && (self.stop_time == 0.0 || t < self.stop_time)
    }
}

impl Default for Oscillator {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioNode for Oscillator {
    fn process(&mut self, ctx: &ProcessContext<'_>, _input: Option<&[f32]>, output: &mut [f32]) {
        let sample_rate = ctx.sample_rate as f64;

        for (f, frame) in output.chunks_exact_mut(ctx.channels).enumerate() {
            let t = ctx.time_at(f);
            if !self.is_active(t) {
                frame.iter_mut().for_each(|s| *s = 0.0);
                continue;
            }

            let hz = self.frequency.value_at(t) as f64;
            let cents = self.detune.value_at(t) as f64;
            let effective_hz = (hz * (cents / 1200.0).exp2()).max(0.0);

            let sample = self.kind.sample(self.phase);
            frame.iter_mut().for_each(|s| *s = sample);

            self.phase += effective_hz / sample_rate;
            if !self.phase.is_finite() {
                self.phase = 0.0;
            }
            self.phase -= self.phase.floor();
        }
    }

    #[inline]
    fn pull(&self) -> Pull {
        Pull::Nothing
    }
}
