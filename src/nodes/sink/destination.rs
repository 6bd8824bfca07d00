//! Graph destination

use crate::node::{AudioNode, ProcessContext, Pull};

/// The engine's terminal node: sums every input and clips to `[-1, 1]`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Destination;

impl AudioNode for Destination {
    fn process(&mut self, _ctx: &ProcessContext<'_>, input: Option<&[f32]>, output: &mut [f32]) {
        match input {
            Some(mix) => {
                for (o, &i) in output.iter_mut().zip(mix) {
                    *o = if i.is_nan() { 0.0 } else { i.clamp(-1.0, 1.0) };
                }
            }
            None => output.iter_mut().for_each(|s| *s = 0.0),
        }
    }

    #[inline]
    fn pull(&self) -> Pull {
        Pull::All
    }
}
