//! Audio output backends.
//!
//! The engine renders into whatever [`AudioDevice`] it was given. Three
//! backends ship with the crate:
//!
//! - [`MemoryDevice`] records every pushed quantum (or, when discarding,
//!   only counts them); used for offline rendering and tests.
//! - [`RtrbDevice`] pushes interleaved samples into an `rtrb` ring buffer
//!   drained by another thread.
//! - `CpalDevice` (feature `cpal_sink`) plays through the system's default
//!   output device.
//!
//! # Example: Render Offline
//!
//! ```no_run
//! use tonwerk::{Engine, devices::MemoryDevice};
//!
//! let device = MemoryDevice::new(480);
//! let mut engine = Engine::new(48000).with_device(device.clone());
//! engine.resume().unwrap();
//! engine.tick();
//! assert_eq!(device.recorded().len(), 480 * 2);
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use rtrb::Producer;

use crate::error::{Error, Result};

#[cfg(feature = "cpal_sink")]
pub use self::cpal_device::CpalDevice;

/// Parameters a device actually opened with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceConfig {
    pub sample_rate: u32,
    pub channels: usize,
}

/// An audio sink driven by [`Engine::tick`](crate::Engine::tick).
///
/// The engine opens the device with its preferred configuration and adopts
/// whatever the device reports back. On every tick it asks for
/// [`expected_frames`](Self::expected_frames), renders that many frames and
/// hands them to [`push`](Self::push) as interleaved samples.
pub trait AudioDevice {
    /// Start the device, preferring the given configuration. Returns the
    /// configuration it actually runs at.
    fn open(&mut self, sample_rate: u32, channels: usize) -> Result<DeviceConfig>;

    fn is_open(&self) -> bool;

    /// Whether the device can still take audio. An invalid device turns every tick into a no-op.
    fn is_valid(&self) -> bool {
        self.is_open()
    }

    /// Frames the device wants for the next tick. Zero skips the tick.
    fn expected_frames(&self) -> usize;

    /// Rate reported by the last successful `open`.
    fn sample_rate(&self) -> u32;

    /// Channel count reported by the last successful `open`.
    fn channels(&self) -> usize;

    /// Take `frames × channels` interleaved samples.
    fn push(&mut self, samples: &[f32]);

    /// Stop the device. It may be opened again.
    fn close(&mut self);
}

#[derive(Debug)]
struct MemoryState {
    config: DeviceConfig,
    forced_rate: Option<u32>,
    block_frames: usize,
    open: bool,
    valid: bool,
    available: bool,
    recording: bool,
    recorded: Vec<f32>,
    pushes: usize,
}

/// An in-memory device that records everything the engine pushes.
///
/// Clones share the same state, so a test can hand one clone to the engine
/// and inspect the recording through another.
#[derive(Clone, Debug)]
pub struct MemoryDevice {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDevice {
    /// A device that asks for `block_frames` frames per tick.
    pub fn new(block_frames: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                config: DeviceConfig {
                    sample_rate: 0,
                    channels: 0,
                },
                forced_rate: None,
                block_frames,
                open: false,
                valid: true,
                available: true,
                recording: true,
                recorded: Vec::new(),
                pushes: 0,
            })),
        }
    }

    /// Report `sample_rate` when opened, whatever the engine asked for.
    pub fn with_sample_rate(self, sample_rate: u32) -> Self {
        self.lock().forced_rate = Some(sample_rate);
        self
    }

    /// A device that counts pushes but throws the samples away.
    ///
    /// This is what [`Engine::new`](crate::Engine::new) renders into until
    /// a real device is configured.
    pub fn discarding(block_frames: usize) -> Self {
        let device = Self::new(block_frames);
        device.lock().recording = false;
        device
    }

    /// A device that refuses to open.
    pub fn unavailable(block_frames: usize) -> Self {
        let device = Self::new(block_frames);
        device.lock().available = false;
        device
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A poisoned lock only means a test panicked mid-push; the data is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Change how many frames the next ticks ask for.
    pub fn set_block_frames(&self, frames: usize) {
        self.lock().block_frames = frames;
    }

    /// Mark the device as lost (or recovered).
    pub fn set_valid(&self, valid: bool) {
        self.lock().valid = valid;
    }

    /// Every sample pushed so far, interleaved. Always empty for a
    /// [`discarding`](Self::discarding) device.
    pub fn recorded(&self) -> Vec<f32> {
        self.lock().recorded.clone()
    }

    /// Drain the recording.
    pub fn take_recorded(&self) -> Vec<f32> {
        core::mem::take(&mut self.lock().recorded)
    }

    /// Number of quanta pushed so far.
    pub fn pushes(&self) -> usize {
        self.lock().pushes
    }
}

impl AudioDevice for MemoryDevice {
    fn open(&mut self, sample_rate: u32, channels: usize) -> Result<DeviceConfig> {
        let mut state = self.lock();
        if !state.available {
            return Err(Error::DeviceUnavailable("memory device refused to open".into()));
        }
        state.config = DeviceConfig {
            sample_rate: state.forced_rate.unwrap_or(sample_rate),
            channels,
        };
        state.open = true;
        Ok(state.config)
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }

    fn is_valid(&self) -> bool {
        let state = self.lock();
        state.open && state.valid
    }

    fn expected_frames(&self) -> usize {
        self.lock().block_frames
    }

    fn sample_rate(&self) -> u32 {
        self.lock().config.sample_rate
    }

    fn channels(&self) -> usize {
        self.lock().config.channels
    }

    fn push(&mut self, samples: &[f32]) {
        let mut state = self.lock();
        if state.recording {
            state.recorded.extend_from_slice(samples);
        }
        state.pushes += 1;
    }

    fn close(&mut self) {
        self.lock().open = false;
    }
}

/// Pushes rendered audio into an `rtrb` ring buffer.
///
/// Each tick asks for as many whole frames as fit in the ring, capped at
/// `block_frames`, so a consumer thread paces the engine.
pub struct RtrbDevice {
    producer: Producer<f32>,
    block_frames: usize,
    config: Option<DeviceConfig>,
}

impl RtrbDevice {
    /// Feed `producer`, asking for at most `block_frames` frames per tick.
    ///
    /// ```
    /// use rtrb::RingBuffer;
    /// use tonwerk::{Engine, devices::RtrbDevice};
    ///
    /// let (producer, mut consumer) = RingBuffer::<f32>::new(4096);
    /// let mut engine = Engine::new(48000).with_device(RtrbDevice::new(producer, 512));
    /// engine.resume().unwrap();
    /// engine.tick();
    /// assert_eq!(consumer.slots(), 1024);
    /// ```
    pub fn new(producer: Producer<f32>, block_frames: usize) -> Self {
        Self {
            producer,
            block_frames,
            config: None,
        }
    }

    /// Free space in the ring, in samples.
    #[inline]
    pub fn available(&self) -> usize {
        self.producer.slots()
    }
}

impl AudioDevice for RtrbDevice {
    fn open(&mut self, sample_rate: u32, channels: usize) -> Result<DeviceConfig> {
        let config = DeviceConfig {
            sample_rate,
            channels,
        };
        self.config = Some(config);
        Ok(config)
    }

    fn is_open(&self) -> bool {
        self.config.is_some()
    }

    fn is_valid(&self) -> bool {
        self.config.is_some() && !self.producer.is_abandoned()
    }

    fn expected_frames(&self) -> usize {
        match self.config {
            Some(config) if config.channels > 0 => {
                (self.producer.slots() / config.channels).min(self.block_frames)
            }
            _ => 0,
        }
    }

    fn sample_rate(&self) -> u32 {
        self.config.map_or(0, |c| c.sample_rate)
    }

    fn channels(&self) -> usize {
        self.config.map_or(0, |c| c.channels)
    }

    fn push(&mut self, samples: &[f32]) {
        // Skip the block rather than write part of it.
        if self.producer.slots() < samples.len() {
            return;
        }
        for &s in samples {
            let _ = self.producer.push(s);
        }
    }

    fn close(&mut self) {
        self.config = None;
    }
}

#[cfg(feature = "cpal_sink")]
mod cpal_device {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{mpsc, Arc};
    use std::thread::JoinHandle;

    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::{SampleFormat, SampleRate, SupportedStreamConfig};
    use rtrb::{Consumer, Producer, RingBuffer};
    use tracing::{info, warn};

    use super::{AudioDevice, DeviceConfig};
    use crate::error::{Error, Result};

    /// Frames handed to the ring per tick at most.
    const BLOCK_FRAMES: usize = 512;

    /// Plays audio through a CPAL output device.
    ///
    /// The CPAL stream runs on its own thread and drains a ring buffer the
    /// engine fills on every tick. Stream errors mark the device invalid.
    pub struct CpalDevice {
        device: cpal::Device,
        name: String,
        producer: Option<Producer<f32>>,
        config: Option<DeviceConfig>,
        valid: Arc<AtomicBool>,
        shutdown: Arc<AtomicBool>,
        thread: Option<JoinHandle<()>>,
    }

    impl CpalDevice {
        /// The system's default output device, or `None` if there is none.
        pub fn default_output() -> Option<Self> {
            let host = cpal::default_host();
            let device = host.default_output_device()?;
            Some(Self::from_device(device))
        }

        /// Every output device the default host can enumerate.
        pub fn list_outputs() -> Vec<Self> {
            let host = cpal::default_host();
            host.output_devices()
                .map(|devices| devices.map(Self::from_device).collect())
                .unwrap_or_default()
        }

        fn from_device(device: cpal::Device) -> Self {
            let name = device.name().unwrap_or_else(|_| "Unknown".into());
            Self {
                device,
                name,
                producer: None,
                config: None,
                valid: Arc::new(AtomicBool::new(false)),
                shutdown: Arc::new(AtomicBool::new(false)),
                thread: None,
            }
        }

        pub fn name(&self) -> &str {
            &self.name
        }

        /// Exact match on channels and rate if the device supports it, else its default.
        fn negotiate(&self, sample_rate: u32, channels: usize) -> Result<SupportedStreamConfig> {
            let exact = self.device.supported_output_configs().ok().and_then(|mut configs| {
                configs.find(|c| {
                    c.channels() as usize == channels
                        && c.min_sample_rate().0 <= sample_rate
                        && sample_rate <= c.max_sample_rate().0
                })
            });
            match exact {
                Some(range) => Ok(range.with_sample_rate(SampleRate(sample_rate))),
                None => self
                    .device
                    .default_output_config()
                    .map_err(|e| Error::DeviceUnavailable(e.to_string())),
            }
        }
    }

    impl AudioDevice for CpalDevice {
        fn open(&mut self, sample_rate: u32, channels: usize) -> Result<DeviceConfig> {
            if let Some(config) = self.config {
                return Ok(config);
            }

            let supported = self.negotiate(sample_rate, channels)?;
            let sample_format = supported.sample_format();
            let stream_config = supported.config();
            let config = DeviceConfig {
                sample_rate: stream_config.sample_rate.0,
                channels: stream_config.channels as usize,
            };

            // ~100ms of audio to absorb scheduling jitter
            let ring = ((config.sample_rate as usize / 10) * config.channels)
                .next_power_of_two()
                .max(8192);
            let (producer, consumer) = RingBuffer::<f32>::new(ring);

            self.shutdown.store(false, Ordering::Release);
            self.valid.store(true, Ordering::Release);

            let (ready_tx, ready_rx) = mpsc::channel();
            let device = self.device.clone();
            let valid = self.valid.clone();
            let shutdown = self.shutdown.clone();

            // The stream is not Send on every platform, so it lives and dies on its own thread.
            let thread = std::thread::spawn(move || {
                let stream = match build_stream(&device, sample_format, &stream_config, consumer, valid)
                    .map_err(|e| e.to_string())
                    .and_then(|stream| stream.play().map(|_| stream).map_err(|e| e.to_string()))
                {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                while !shutdown.load(Ordering::Acquire) {
                    std::thread::park();
                }
                drop(stream);
            });

            match ready_rx.recv() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    let _ = thread.join();
                    self.valid.store(false, Ordering::Release);
                    return Err(Error::DeviceUnavailable(e));
                }
                Err(_) => {
                    self.valid.store(false, Ordering::Release);
                    return Err(Error::DeviceUnavailable("stream thread exited".into()));
                }
            }

            info!(device = %self.name, ?sample_format, ?config, "output stream started");
            self.producer = Some(producer);
            self.config = Some(config);
            self.thread = Some(thread);
            Ok(config)
        }

        fn is_open(&self) -> bool {
            self.config.is_some()
        }

        fn is_valid(&self) -> bool {
            self.config.is_some() && self.valid.load(Ordering::Acquire)
        }

        fn expected_frames(&self) -> usize {
            match (&self.producer, self.config) {
                (Some(producer), Some(config)) if config.channels > 0 => {
                    (producer.slots() / config.channels).min(BLOCK_FRAMES)
                }
                _ => 0,
            }
        }

        fn sample_rate(&self) -> u32 {
            self.config.map_or(0, |c| c.sample_rate)
        }

        fn channels(&self) -> usize {
            self.config.map_or(0, |c| c.channels)
        }

        fn push(&mut self, samples: &[f32]) {
            let producer = match &mut self.producer {
                Some(p) => p,
                None => return,
            };
            if producer.slots() < samples.len() {
                return;
            }
            for &s in samples {
                let _ = producer.push(s);
            }
        }

        fn close(&mut self) {
            self.shutdown.store(true, Ordering::Release);
            if let Some(thread) = self.thread.take() {
                thread.thread().unpark();
                let _ = thread.join();
            }
            self.producer = None;
            self.config = None;
            self.valid.store(false, Ordering::Release);
        }
    }

    impl Drop for CpalDevice {
        fn drop(&mut self) {
            self.close();
        }
    }

    fn build_stream(
        device: &cpal::Device,
        sample_format: SampleFormat,
        stream_config: &cpal::StreamConfig,
        mut consumer: Consumer<f32>,
        valid: Arc<AtomicBool>,
    ) -> core::result::Result<cpal::Stream, cpal::BuildStreamError> {
        let on_error = move |err: cpal::StreamError| {
            warn!(?err, "output stream error");
            valid.store(false, Ordering::Release);
        };

        match sample_format {
            SampleFormat::F32 => device.build_output_stream(
                stream_config,
                move |data: &mut [f32], _| {
                    for sample in data.iter_mut() {
                        *sample = consumer.pop().unwrap_or(0.0);
                    }
                },
                on_error,
                None,
            ),
            SampleFormat::I16 => device.build_output_stream(
                stream_config,
                move |data: &mut [i16], _| {
                    for sample in data.iter_mut() {
                        let s = consumer.pop().unwrap_or(0.0);
                        *sample = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                    }
                },
                on_error,
                None,
            ),
            SampleFormat::U16 => device.build_output_stream(
                stream_config,
                move |data: &mut [u16], _| {
                    for sample in data.iter_mut() {
                        let s = consumer.pop().unwrap_or(0.0);
                        *sample = ((s.clamp(-1.0, 1.0) + 1.0) * 0.5 * u16::MAX as f32) as u16;
                    }
                },
                on_error,
                None,
            ),
            _ => Err(cpal::BuildStreamError::StreamConfigNotSupported),
        }
    }
}
