//! Distance-attenuated equal-power stereo panner

use core::f64::consts::FRAC_PI_4;

use crate::node::{AudioNode, ProcessContext};
use crate::param::AudioParam;

/// Distance over which the pan position sweeps from center to hard left/right.
const PAN_WIDTH: f64 = 5.0;

/// Places its (downmixed) first input in the stereo field relative to the
/// engine's listener.
///
/// Per frame: `a = 1 / (1 + distance)`, `pan = clamp(dx / 5, -1, 1)`, and the
/// equal-power gains `cos θ · a` and `sin θ · a` with `θ = (pan + 1)·π/4`.
/// Only channels 0 and 1 are written; further channels are silent. With a
/// mono output only the attenuation applies.
pub struct Panner {
    position: [AudioParam; 3],
}

impl Panner {
    pub fn new() -> Self {
        Self {
            position: [AudioParam::new(0.0), AudioParam::new(0.0), AudioParam::new(0.0)],
        }
    }

    /// `[x, y, z]`
    #[inline]
    pub fn position(&self) -> &[AudioParam; 3] {
        &self.position
    }

    #[inline]
    pub fn position_mut(&mut self) -> &mut [AudioParam; 3] {
        &mut self.position
    }
}

impl Default for Panner {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioNode for Panner {
    fn process(&mut self, ctx: &ProcessContext<'_>, input: Option<&[f32]>, output: &mut [f32]) {
        output.iter_mut().for_each(|s| *s = 0.0);
        let input = match input {
            Some(input) => input,
            None => return,
        };

        let listener = &ctx.listener.position;
        let frames = output
            .chunks_exact_mut(ctx.channels)
            .zip(input.chunks_exact(ctx.channels));

        for (f, (out, inp)) in frames.enumerate() {
            let t = ctx.time_at(f);
            let mut d2 = 0.0;
            let mut dx = 0.0;
            for (axis, (src, lst)) in self.position.iter().zip(listener).enumerate() {
                let d = src.value_at(t) as f64 - lst.value_at(t) as f64;
                if axis == 0 {
                    dx = d;
                }
                d2 += d * d;
            }

            let attenuation = 1.0 / (1.0 + d2.sqrt());
            let pan = (dx / PAN_WIDTH).clamp(-1.0, 1.0);
            let theta = (pan + 1.0) * FRAC_PI_4;

            let mono = if inp.len() >= 2 {
                0.5 * (inp[0] + inp[1])
            } else {
                inp[0]
            };

            if out.len() >= 2 {
                out[0] = mono * (theta.cos() * attenuation) as f32;
                out[1] = mono * (theta.sin() * attenuation) as f32;
            } else {
                out[0] = mono * attenuation as f32;
            }
        }
    }
}
