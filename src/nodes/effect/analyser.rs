//! Pass-through analyser

use alloc::vec::Vec;

use crate::node::{AudioNode, ProcessContext};

pub const DEFAULT_FFT_SIZE: usize = 2048;

/// Smallest and largest accepted analysis windows.
pub const MIN_FFT_SIZE: usize = 32;
pub const MAX_FFT_SIZE: usize = 32768;

/// Passes its first input through unchanged while capturing the most recent
/// `fft_size` samples of channel 0.
///
/// The frequency-domain view is reserved: it has the right length
/// (`fft_size / 2`) but is always zero.
pub struct Analyser {
    fft_size: usize,
    /// Last `fft_size` samples of channel 0, oldest first.
    history: Vec<f32>,
    time_domain: Vec<u8>,
    frequency_domain: Vec<u8>,
}

impl Analyser {
    /// An analyser with a 2048-sample window of silence.
    pub fn new() -> Self {
        let mut analyser = Self {
            fft_size: 0,
            history: Vec::new(),
            time_domain: Vec::new(),
            frequency_domain: Vec::new(),
        };
        analyser.set_fft_size(DEFAULT_FFT_SIZE);
        analyser
    }

    #[inline]
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Set the analysis window.
    ///
    /// Anything but a power of two within
    /// [`MIN_FFT_SIZE`]`..=`[`MAX_FFT_SIZE`] falls back to 2048.
    pub fn set_fft_size(&mut self, size: usize) {
        let valid = size.is_power_of_two() && (MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&size);
        let size = if valid { size } else { DEFAULT_FFT_SIZE };
        if size == self.fft_size {
            return;
        }

        // Keep the newest samples when resizing.
        let mut history = vec![0.0; size];
        let keep = size.min(self.history.len());
        history[size - keep..].copy_from_slice(&self.history[self.history.len() - keep..]);

        self.fft_size = size;
        self.history = history;
        self.time_domain = vec![0; size];
        self.frequency_domain = vec![0; size / 2];
        self.update_time_domain();
    }

    /// Length of the frequency-domain view.
    #[inline]
    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Time-domain bytes, `128` meaning silence.
    #[inline]
    pub fn time_domain_bytes(&self) -> &[u8] {
        &self.time_domain
    }

    /// Always zero-filled.
    #[inline]
    pub fn frequency_bytes(&self) -> &[u8] {
        &self.frequency_domain
    }

    /// Copy time-domain bytes into `dst`, as many as fit.
    pub fn get_byte_time_domain_data(&self, dst: &mut [u8]) {
        let n = dst.len().min(self.time_domain.len());
        dst[..n].copy_from_slice(&self.time_domain[..n]);
    }

    /// Copy frequency bytes into `dst`, as many as fit.
    pub fn get_byte_frequency_data(&self, dst: &mut [u8]) {
        let n = dst.len().min(self.frequency_domain.len());
        dst[..n].copy_from_slice(&self.frequency_domain[..n]);
    }

    /// Copy the captured samples themselves into `dst`, as many as fit.
    pub fn get_float_time_domain_data(&self, dst: &mut [f32]) {
        let n = dst.len().min(self.history.len());
        dst[..n].copy_from_slice(&self.history[..n]);
    }

    fn push_history(&mut self, samples: impl ExactSizeIterator<Item = f32>) {
        let n = samples.len();
        let size = self.history.len();
        if n >= size {
            for (dst, src) in self.history.iter_mut().zip(samples.skip(n - size)) {
                *dst = src;
            }
        } else {
            self.history.copy_within(n.., 0);
            for (dst, src) in self.history[size - n..].iter_mut().zip(samples) {
                *dst = src;
            }
        }
    }

    fn update_time_domain(&mut self) {
        for (byte, &v) in self.time_domain.iter_mut().zip(&self.history) {
            *byte = ((v * 0.5 + 0.5) * 255.0).round().clamp(0.0, 255.0) as u8;
        }
    }
}

impl Default for Analyser {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioNode for Analyser {
    fn process(&mut self, ctx: &ProcessContext<'_>, input: Option<&[f32]>, output: &mut [f32]) {
        match input {
            Some(input) => output.copy_from_slice(&input[..output.len()]),
            None => output.iter_mut().for_each(|s| *s = 0.0),
        }

        let channel0 = output.iter().step_by(ctx.channels).copied();
        self.push_history(channel0);
        self.update_time_domain();
        self.frequency_domain.iter_mut().for_each(|b| *b = 0);
    }
}
