//! Owned blocks of interleaved PCM.

use crate::error::{Error, Result};

/// Largest channel count an [`AudioBuffer`] may carry.
pub const MAX_CHANNELS: usize = 8;

/// Interleaved `f32` audio with a fixed geometry.
///
/// Created zero-filled by [`AudioBuffer::new`] or filled by
/// [`decode_wav`](crate::wav::decode_wav). The engine only ever reads it;
/// [`BufferSource`](crate::nodes::BufferSource) nodes share it through an `Arc`.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    channels: usize,
    sample_rate: u32,
    frames: usize,
}

impl AudioBuffer {
    /// Create a silent buffer of `channels × frames` samples.
    pub fn new(channels: usize, sample_rate: u32, frames: usize) -> Result<Self> {
        Self::check_geometry(channels, sample_rate)?;
        let len = channels
            .checked_mul(frames)
            .ok_or(Error::BadArgument("buffer too large"))?;

        let mut samples = Vec::new();
        samples.try_reserve_exact(len)?;
        samples.resize(len, 0.0);

        Ok(Self {
            samples,
            channels,
            sample_rate,
            frames,
        })
    }

    /// Wrap interleaved samples. Trailing samples that don't fill a whole frame are dropped.
    pub fn from_interleaved(mut samples: Vec<f32>, channels: usize, sample_rate: u32) -> Result<Self> {
        Self::check_geometry(channels, sample_rate)?;
        let frames = samples.len() / channels;
        samples.truncate(frames * channels);

        Ok(Self {
            samples,
            channels,
            sample_rate,
            frames,
        })
    }

    fn check_geometry(channels: usize, sample_rate: u32) -> Result<()> {
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(Error::BadArgument("channel count must be between 1 and 8"));
        }
        if sample_rate == 0 {
            return Err(Error::BadArgument("sample rate must be non-zero"));
        }
        Ok(())
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Length in seconds.
    #[inline]
    pub fn duration(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }

    #[inline]
    pub fn interleaved(&self) -> &[f32] {
        &self.samples
    }

    #[inline]
    pub(crate) fn interleaved_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    /// Sample at `frame` of channel `channel`, or `0.0` when out of range.
    #[inline]
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        if frame >= self.frames || channel >= self.channels {
            return 0.0;
        }
        self.samples[frame * self.channels + channel]
    }

    /// A deinterleaved copy of one channel.
    pub fn channel_data(&self, channel: usize) -> Option<Vec<f32>> {
        if channel >= self.channels {
            return None;
        }
        Some(
            self.samples
                .iter()
                .skip(channel)
                .step_by(self.channels)
                .copied()
                .collect(),
        )
    }

    /// Overwrite the start of a channel with `data`; extra input is ignored.
    pub fn copy_to_channel(&mut self, channel: usize, data: &[f32]) -> Result<()> {
        if channel >= self.channels {
            return Err(Error::BadArgument("channel index out of range"));
        }
        let channels = self.channels;
        for (dst, src) in self.samples[channel..]
            .iter_mut()
            .step_by(channels)
            .zip(data)
        {
            *dst = *src;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_is_silent() {
        let b = AudioBuffer::new(2, 48000, 10).unwrap();
        assert_eq!(b.interleaved().len(), 20);
        assert!(b.interleaved().iter().all(|&s| s == 0.0));
        assert_eq!(b.duration(), 10.0 / 48000.0);
    }

    #[test]
    fn rejects_bad_geometry() {
        assert!(matches!(AudioBuffer::new(0, 48000, 1), Err(Error::BadArgument(_))));
        assert!(matches!(AudioBuffer::new(9, 48000, 1), Err(Error::BadArgument(_))));
        assert!(matches!(AudioBuffer::new(1, 0, 1), Err(Error::BadArgument(_))));
        assert!(AudioBuffer::new(1, 44100, 0).is_ok());
    }

    #[test]
    fn channel_data_deinterleaves() {
        let b = AudioBuffer::from_interleaved(vec![1.0, -1.0, 2.0, -2.0, 3.0, -3.0, 9.0], 2, 8000)
            .unwrap();
        assert_eq!(b.frames(), 3);
        assert_eq!(b.channel_data(0).unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(b.channel_data(1).unwrap(), vec![-1.0, -2.0, -3.0]);
        assert!(b.channel_data(2).is_none());
    }

    #[test]
    fn copy_to_channel_writes_one_channel() {
        let mut b = AudioBuffer::new(2, 8000, 3).unwrap();
        b.copy_to_channel(1, &[0.5, 0.25, 0.125, 99.0]).unwrap();
        assert_eq!(b.interleaved(), &[0.0, 0.5, 0.0, 0.25, 0.0, 0.125]);
        assert_eq!(b.sample(2, 1), 0.125);
        assert_eq!(b.sample(3, 1), 0.0);
    }
}
