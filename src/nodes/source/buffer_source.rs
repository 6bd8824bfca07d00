//! Audio buffer player

use alloc::sync::Arc;

use crate::buffer::AudioBuffer;
use crate::node::{AudioNode, ProcessContext, Pull};
use crate::param::AudioParam;

/// Plays a shared [`AudioBuffer`] with linear interpolation.
///
/// The source position of a frame at time `t` is
/// `(offset + (t - start) * rate) * buffer_rate`, so the buffer's own sample
/// rate is honored regardless of the engine rate. Output channel `c` reads
/// source channel `min(c, buffer_channels - 1)`.
pub struct BufferSource {
    playback_rate: AudioParam,
    buffer: Option<Arc<AudioBuffer>>,
    looping: bool,
    loop_start: f64,
    loop_end: f64,
    started: bool,
    start_time: f64,
    stop_time: f64,
    offset: f64,
    duration: f64,
}

impl BufferSource {
    /// An unbound, unstarted source with a playback rate of one.
    pub fn new() -> Self {
        Self {
            playback_rate: AudioParam::new(1.0),
            buffer: None,
            looping: false,
            loop_start: 0.0,
            loop_end: 0.0,
            started: false,
            start_time: 0.0,
            stop_time: 0.0,
            offset: 0.0,
            duration: 0.0,
        }
    }

    /// Speed multiplier; negative values are treated as zero.
    #[inline]
    pub fn playback_rate(&self) -> &AudioParam {
        &self.playback_rate
    }

    #[inline]
    pub fn playback_rate_mut(&mut self) -> &mut AudioParam {
        &mut self.playback_rate
    }

    #[inline]
    pub fn buffer(&self) -> Option<&Arc<AudioBuffer>> {
        self.buffer.as_ref()
    }

    /// Bind (or with `None`, unbind) the buffer to play.
    pub fn set_buffer(&mut self, buffer: Option<Arc<AudioBuffer>>) {
        self.buffer = buffer;
    }

    #[inline]
    pub fn looping(&self) -> bool {
        self.looping
    }

    /// Loop region in seconds. An end at or before the start loops to the end of the buffer.
    #[inline]
    pub fn loop_region(&self) -> (f64, f64) {
        (self.loop_start, self.loop_end)
    }

    /// Wrap around the loop region instead of stopping at the end of the buffer.
    pub fn set_loop(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Set the loop region in seconds. Negative bounds become zero.
    pub fn set_loop_region(&mut self, start: f64, end: f64) {
        self.loop_start = start.max(0.0);
        self.loop_end = end.max(0.0);
    }

    /// Start playing at `when`, from `offset` seconds into the buffer, for at
    /// most `duration` seconds of transport time.
    pub fn start(&mut self, when: f64, offset: Option<f64>, duration: Option<f64>) {
        self.started = true;
        self.start_time = when.max(0.0);
        self.offset = offset.unwrap_or(0.0).max(0.0);
        self.duration = duration.unwrap_or(0.0).max(0.0);
    }

    /// Go silent from `when` on. `0.0` means never.
    pub fn stop(&mut self, when: f64) {
        self.stop_time = when.max(0.0);
    }

    #[inline]
    pub fn is_started(&self) -> bool {
        self.started
    }

    #[inline]
    fn is_active(&self, t: f64) -> bool {
        t >= self.start_time
            && (self.stop_time == 0.0 || t < self.stop_time)
            && (self.duration <= 0.0 || t - self.start_time < self.duration)
    }
}

impl Default for BufferSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioNode for BufferSource {
    fn process(&mut self, ctx: &ProcessContext<'_>, _input: Option<&[f32]>, output: &mut [f32]) {
        let buffer = match &self.buffer {
            Some(b) if self.started && b.frames() > 0 => b,
            _ => {
                output.iter_mut().for_each(|s| *s = 0.0);
                return;
            }
        };

        let src_rate = buffer.sample_rate() as f64;
        let src_frames = buffer.frames();
        let src_channels = buffer.channels();
        let last = src_frames as f64;

        // Loop window in source frames.
        let loop_start = (self.loop_start * src_rate).clamp(0.0, last);
        let mut loop_end = self.loop_end * src_rate;
        if loop_end <= loop_start || loop_end > last {
            loop_end = last;
        }
        let (loop_start, loop_end) = if loop_end - loop_start > 0.0 {
            (loop_start, loop_end)
        } else {
            (0.0, last)
        };

        for (f, frame) in output.chunks_exact_mut(ctx.channels).enumerate() {
            let t = ctx.time_at(f);
            if !self.is_active(t) {
                frame.iter_mut().for_each(|s| *s = 0.0);
                continue;
            }

            let rate = (self.playback_rate.value_at(t) as f64).max(0.0);
            let mut pos = (self.offset + (t - self.start_time) * rate) * src_rate;

            if self.looping && pos >= loop_end {
                pos = loop_start + (pos - loop_start) % (loop_end - loop_start);
            }
            if !(0.0..last).contains(&pos) {
                frame.iter_mut().for_each(|s| *s = 0.0);
                continue;
            }

            let i0 = pos as usize;
            let frac = (pos - i0 as f64) as f32;
            let mut i1 = i0 + 1;
            if self.looping && i1 as f64 >= loop_end {
                i1 = loop_start as usize;
            } else if i1 >= src_frames {
                // hold the last frame
                i1 = src_frames - 1;
            }

            for (c, out) in frame.iter_mut().enumerate() {
                let ch = c.min(src_channels - 1);
                let s0 = buffer.sample(i0, ch);
                let s1 = buffer.sample(i1, ch);
                *out = s0 + (s1 - s0) * frac;
            }
        }
    }

    #[inline]
    fn pull(&self) -> Pull {
        Pull::Nothing
    }
}
