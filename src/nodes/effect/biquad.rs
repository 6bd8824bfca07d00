//! Second-order IIR filter
//!
//! Coefficients follow the RBJ Audio-EQ-Cookbook and are recomputed once per
//! render quantum from the parameters at the block start. Each channel runs a
//! transposed direct-form-II section whose state carries across quanta and
//! across coefficient changes.

use core::f64::consts::TAU;
use core::str::FromStr;

use alloc::vec::Vec;

use crate::error::{Error, Result};
use crate::node::{AudioNode, ProcessContext};
use crate::param::AudioParam;

/// Filter responses a [`Biquad`] can take.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BiquadType {
    #[default]
    Lowpass,
    Highpass,
    Bandpass,
    Lowshelf,
    Highshelf,
    Peaking,
    Notch,
    Allpass,
}

impl BiquadType {
    /// The Web Audio name of the response, as accepted by `FromStr`.
    pub fn as_str(self) -> &'static str {
        match self {
            BiquadType::Lowpass => "lowpass",
            BiquadType::Highpass => "highpass",
            BiquadType::Bandpass => "bandpass",
            BiquadType::Lowshelf => "lowshelf",
            BiquadType::Highshelf => "highshelf",
            BiquadType::Peaking => "peaking",
            BiquadType::Notch => "notch",
            BiquadType::Allpass => "allpass",
        }
    }
}

impl FromStr for BiquadType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "lowpass" => BiquadType::Lowpass,
            "highpass" => BiquadType::Highpass,
            "bandpass" => BiquadType::Bandpass,
            "lowshelf" => BiquadType::Lowshelf,
            "highshelf" => BiquadType::Highshelf,
            "peaking" => BiquadType::Peaking,
            "notch" => BiquadType::Notch,
            "allpass" => BiquadType::Allpass,
            _ => return Err(Error::BadArgument("unknown filter type")),
        })
    }
}

/// Normalized coefficients: `y = b0·x + b1·x⁻¹ + b2·x⁻² − a1·y⁻¹ − a2·y⁻²`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BiquadCoefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoefficients {
    /// Pass-through.
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Design a section for `kind` at `sample_rate`.
    ///
    /// `frequency` is clamped to `[10, 0.45·sample_rate]` and `q` to
    /// `[0.0001, 1000]`. `gain_db` only affects the shelf and peaking shapes.
    /// At sample rates too low for that range the upper bound wins.
    pub fn design(kind: BiquadType, sample_rate: f64, frequency: f64, q: f64, gain_db: f64) -> Self {
        let f0 = frequency.max(10.0).min(0.45 * sample_rate);
        let q = q.clamp(0.0001, 1000.0);
        let a = 10f64.powf(gain_db / 40.0);
        let w0 = TAU * f0 / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);

        let (b0, b1, b2, a0, a1, a2) = match kind {
            BiquadType::Lowpass => (
                (1.0 - cos_w0) / 2.0,
                1.0 - cos_w0,
                (1.0 - cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            BiquadType::Highpass => (
                (1.0 + cos_w0) / 2.0,
                -(1.0 + cos_w0),
                (1.0 + cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            // constant skirt gain, peak gain = Q
            BiquadType::Bandpass => (
                sin_w0 / 2.0,
                0.0,
                -sin_w0 / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            BiquadType::Notch => (
                1.0,
                -2.0 * cos_w0,
                1.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            BiquadType::Allpass => (
                1.0 - alpha,
                -2.0 * cos_w0,
                1.0 + alpha,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            BiquadType::Peaking => (
                1.0 + alpha * a,
                -2.0 * cos_w0,
                1.0 - alpha * a,
                1.0 + alpha / a,
                -2.0 * cos_w0,
                1.0 - alpha / a,
            ),
            BiquadType::Lowshelf => {
                let k = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 + k),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 - k),
                    (a + 1.0) + (a - 1.0) * cos_w0 + k,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                    (a + 1.0) + (a - 1.0) * cos_w0 - k,
                )
            }
            BiquadType::Highshelf => {
                let k = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 + k),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 - k),
                    (a + 1.0) - (a - 1.0) * cos_w0 + k,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                    (a + 1.0) - (a - 1.0) * cos_w0 - k,
                )
            }
        };

        let c = Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        };
        if [c.b0, c.b1, c.b2, c.a1, c.a2].iter().all(|v| v.is_finite()) {
            c
        } else {
            Self::IDENTITY
        }
    }
}

/// Per-channel delay line of a transposed direct-form-II section.
#[derive(Clone, Copy, Debug, Default)]
struct Section {
    z1: f64,
    z2: f64,
}

impl Section {
    #[inline]
    fn tick(&mut self, c: &BiquadCoefficients, x: f64) -> f64 {
        let y = c.b0 * x + self.z1;
        self.z1 = c.b1 * x - c.a1 * y + self.z2;
        self.z2 = c.b2 * x - c.a2 * y;
        y
    }
}

/// Filters its first input.
pub struct Biquad {
    kind: BiquadType,
    frequency: AudioParam,
    q: AudioParam,
    /// Decibels; used by the shelf and peaking shapes.
    gain: AudioParam,
    coefficients: BiquadCoefficients,
    sections: Vec<Section>,
}

impl Biquad {
    /// A 350 Hz lowpass with `Q = 1` and `0 dB` gain.
    pub fn new() -> Self {
        Self {
            kind: BiquadType::Lowpass,
            frequency: AudioParam::new(350.0),
            q: AudioParam::new(1.0),
            gain: AudioParam::new(0.0),
            coefficients: BiquadCoefficients::IDENTITY,
            sections: Vec::new(),
        }
    }

    #[inline]
    pub fn filter_type(&self) -> BiquadType {
        self.kind
    }

    /// Change the response. Takes effect from the next quantum; the filter
    /// state is kept.
    pub fn set_type(&mut self, kind: BiquadType) {
        self.kind = kind;
    }

    /// Cutoff or center frequency in Hz.
    #[inline]
    pub fn frequency(&self) -> &AudioParam {
        &self.frequency
    }

    #[inline]
    pub fn frequency_mut(&mut self) -> &mut AudioParam {
        &mut self.frequency
    }

    /// Quality factor. Sets the bandwidth of the band shapes.
    #[inline]
    pub fn q(&self) -> &AudioParam {
        &self.q
    }

    #[inline]
    pub fn q_mut(&mut self) -> &mut AudioParam {
        &mut self.q
    }

    /// Shelf or peak gain in decibels.
    #[inline]
    pub fn gain(&self) -> &AudioParam {
        &self.gain
    }

    #[inline]
    pub fn gain_mut(&mut self) -> &mut AudioParam {
        &mut self.gain
    }

    /// Coefficients used for the most recent quantum.
    #[inline]
    pub fn coefficients(&self) -> BiquadCoefficients {
        self.coefficients
    }
}

impl Default for Biquad {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioNode for Biquad {
    fn process(&mut self, ctx: &ProcessContext<'_>, input: Option<&[f32]>, output: &mut [f32]) {
        let input = match input {
            Some(input) => input,
            None => {
                output.iter_mut().for_each(|s| *s = 0.0);
                return;
            }
        };

        let t0 = ctx.block_start;
        self.coefficients = BiquadCoefficients::design(
            self.kind,
            ctx.sample_rate as f64,
            self.frequency.value_at(t0) as f64,
            self.q.value_at(t0) as f64,
            self.gain.value_at(t0) as f64,
        );

        if self.sections.len() < ctx.channels {
            self.sections.resize(ctx.channels, Section::default());
        }

        let c = self.coefficients;
        let frames = output
            .chunks_exact_mut(ctx.channels)
            .zip(input.chunks_exact(ctx.channels));

        for (out, inp) in frames {
            for ((o, &x), section) in out.iter_mut().zip(inp).zip(self.sections.iter_mut()) {
                *o = section.tick(&c, x as f64) as f32;
            }
        }
    }
}
