//! Gain/volume control effect

use crate::node::{AudioNode, ProcessContext};
use crate::param::AudioParam;

/// Largest gain factor applied; automation beyond it is clamped.
pub const MAX_GAIN: f32 = 16.0;

/// Scales its first input by the `gain` parameter, sampled every frame.
pub struct Gain {
    gain: AudioParam,
}

impl Gain {
    pub fn new() -> Self {
        Self {
            gain: AudioParam::new(1.0),
        }
    }

    #[inline]
    pub fn gain(&self) -> &AudioParam {
        &self.gain
    }

    #[inline]
    pub fn gain_mut(&mut self) -> &mut AudioParam {
        &mut self.gain
    }
}

impl Default for Gain {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioNode for Gain {
    fn process(&mut self, ctx: &ProcessContext<'_>, input: Option<&[f32]>, output: &mut [f32]) {
        let input = match input {
            Some(input) => input,
            None => {
                output.iter_mut().for_each(|s| *s = 0.0);
                return;
            }
        };

        let frames = output
            .chunks_exact_mut(ctx.channels)
            .zip(input.chunks_exact(ctx.channels));

        for (f, (out, inp)) in frames.enumerate() {
            let g = self.gain.value_at(ctx.time_at(f)).clamp(0.0, MAX_GAIN);
            for (o, &i) in out.iter_mut().zip(inp) {
                *o = i * g;
            }
        }
    }
}
