//! Script-facing adapter surface.
//!
//! [`ScriptHost`] is what a script binding layer talks to. It owns the one
//! engine instance (created on first use, dropped on
//! [`shutdown`](ScriptHost::shutdown)) and the buffers scripts hold handles
//! to. Enumerations are accepted as their Web Audio strings, and asking a
//! node for state it does not have is an [`Error::BadArgument`] rather than
//! `None`.

use alloc::sync::Arc;

use hashbrown::HashMap;
use tracing::debug;

use crate::buffer::AudioBuffer;
use crate::engine::{Component, Engine, ListenerAxis, DEFAULT_SAMPLE_RATE};
use crate::error::{Error, Result};
use crate::node::{Node, NodeId, NodeKind, ParamName};
use crate::nodes::{BiquadType, OscillatorType};
use crate::param::AudioParam;
use crate::wav::decode_wav;

/// Script-visible reference to an [`AudioBuffer`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BufferHandle(u32);

/// Addresses a parameter either on a node or on the engine's listener.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ParamRef {
    Node(NodeId, ParamName),
    Listener(ListenerAxis, Component),
}

const NO_ENGINE: Error = Error::BadArgument("no audio engine");
const WRONG_KIND: Error = Error::BadArgument("node is of the wrong kind");
const UNKNOWN_BUFFER: Error = Error::BadArgument("unknown buffer");

/// Owns the engine and the buffer table a script binding layer works with.
///
/// ```
/// use tonwerk::{ParamName, ParamRef, ScriptHost};
///
/// let mut host = ScriptHost::default();
/// let osc = host.create("oscillator").unwrap();
/// let gain = host.create("gain").unwrap();
/// host.set_oscillator_type(osc, "triangle").unwrap();
/// host.set_value(ParamRef::Node(gain, ParamName::Gain), 0.5).unwrap();
///
/// let dest = host.destination();
/// host.connect(osc, gain).unwrap();
/// host.connect(gain, dest).unwrap();
///
/// // fft sizes only apply to analysers
/// assert!(host.set_fft_size(gain, 1024).is_err());
/// ```
pub struct ScriptHost {
    make_engine: Box<dyn FnMut() -> Engine>,
    engine: Option<Engine>,
    buffers: HashMap<BufferHandle, Arc<AudioBuffer>>,
    next_buffer: u32,
}

impl ScriptHost {
    /// A host whose engine is built by `make_engine` on first use.
    pub fn new(make_engine: impl FnMut() -> Engine + 'static) -> Self {
        Self {
            make_engine: Box::new(make_engine),
            engine: None,
            buffers: HashMap::new(),
            next_buffer: 1,
        }
    }

    /// The engine, created on first use.
    pub fn get(&mut self) -> &mut Engine {
        let make_engine = &mut self.make_engine;
        self.engine.get_or_insert_with(|| {
            debug!("creating audio engine");
            make_engine()
        })
    }

    /// Whether an engine exists right now. Never creates one.
    #[inline]
    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    fn existing(&mut self) -> Result<&mut Engine> {
        self.engine.as_mut().ok_or(NO_ENGINE)
    }

    /// Drop the engine and every node in it. Buffers stay valid.
    pub fn shutdown(&mut self) {
        if let Some(engine) = self.engine.take() {
            engine.shutdown();
        }
    }

    /// Called by the device backend once per quantum.
    pub fn tick(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.tick();
        }
    }

    // ------------------------------------------------------------------
    // Engine
    // ------------------------------------------------------------------

    pub fn sample_rate(&mut self) -> u32 {
        self.get().sample_rate()
    }

    pub fn current_time(&mut self) -> f64 {
        self.get().current_time()
    }

    pub fn resume(&mut self) -> Result<()> {
        self.get().resume()
    }

    /// Fails if no engine has been created yet.
    pub fn suspend(&mut self) -> Result<()> {
        self.existing()?.suspend();
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        self.existing()?.close();
        Ok(())
    }

    pub fn destination(&mut self) -> NodeId {
        self.get().destination()
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Create a node from its kind name (`"gain"`, `"oscillator"`, ...).
    pub fn create(&mut self, kind: &str) -> Result<NodeId> {
        let kind: NodeKind = kind.parse()?;
        if kind == NodeKind::Destination {
            return Err(Error::BadArgument("the destination cannot be created"));
        }
        Ok(self.get().create_node(kind))
    }

    pub fn retain(&mut self, id: NodeId) -> Result<()> {
        self.get().retain(id)
    }

    /// Drop a script reference. Releasing the destination's own reference fails.
    pub fn release(&mut self, id: NodeId) -> Result<()> {
        self.get().release(id)
    }

    pub fn connect(&mut self, src: NodeId, dst: NodeId) -> Result<()> {
        self.get().connect(src, dst)
    }

    pub fn disconnect(&mut self, src: NodeId, dst: NodeId) -> Result<()> {
        self.get().disconnect(src, dst)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.get()
            .node_mut(id)
            .ok_or(Error::BadArgument("unknown node"))
    }

    fn node(&mut self, id: NodeId) -> Result<&Node> {
        self.node_mut(id).map(|n| &*n)
    }

    /// `"sine"`, `"square"`, `"sawtooth"` or `"triangle"`.
    pub fn oscillator_type(&mut self, id: NodeId) -> Result<&'static str> {
        let osc = self.node(id)?.as_oscillator().ok_or(WRONG_KIND)?;
        Ok(osc.oscillator_type().as_str())
    }

    pub fn set_oscillator_type(&mut self, id: NodeId, kind: &str) -> Result<()> {
        let kind: OscillatorType = kind.parse()?;
        self.node_mut(id)?
            .as_oscillator_mut()
            .ok_or(WRONG_KIND)?
            .set_type(kind);
        Ok(())
    }

    pub fn filter_type(&mut self, id: NodeId) -> Result<&'static str> {
        let biquad = self.node(id)?.as_biquad().ok_or(WRONG_KIND)?;
        Ok(biquad.filter_type().as_str())
    }

    pub fn set_filter_type(&mut self, id: NodeId, kind: &str) -> Result<()> {
        let kind: BiquadType = kind.parse()?;
        self.node_mut(id)?
            .as_biquad_mut()
            .ok_or(WRONG_KIND)?
            .set_type(kind);
        Ok(())
    }

    pub fn fft_size(&mut self, id: NodeId) -> Result<usize> {
        Ok(self.node(id)?.as_analyser().ok_or(WRONG_KIND)?.fft_size())
    }

    /// Sizes that are not a power of two in `32..=32768` select 2048.
    pub fn set_fft_size(&mut self, id: NodeId, size: usize) -> Result<()> {
        self.node_mut(id)?
            .as_analyser_mut()
            .ok_or(WRONG_KIND)?
            .set_fft_size(size);
        Ok(())
    }

    pub fn frequency_bin_count(&mut self, id: NodeId) -> Result<usize> {
        Ok(self
            .node(id)?
            .as_analyser()
            .ok_or(WRONG_KIND)?
            .frequency_bin_count())
    }

    pub fn get_byte_time_domain_data(&mut self, id: NodeId, dst: &mut [u8]) -> Result<()> {
        self.node(id)?
            .as_analyser()
            .ok_or(WRONG_KIND)?
            .get_byte_time_domain_data(dst);
        Ok(())
    }

    pub fn get_byte_frequency_data(&mut self, id: NodeId, dst: &mut [u8]) -> Result<()> {
        self.node(id)?
            .as_analyser()
            .ok_or(WRONG_KIND)?
            .get_byte_frequency_data(dst);
        Ok(())
    }

    pub fn get_float_time_domain_data(&mut self, id: NodeId, dst: &mut [f32]) -> Result<()> {
        self.node(id)?
            .as_analyser()
            .ok_or(WRONG_KIND)?
            .get_float_time_domain_data(dst);
        Ok(())
    }

    /// Bind a buffer to a buffer source; the node shares it from then on.
    pub fn set_buffer(&mut self, id: NodeId, buffer: Option<BufferHandle>) -> Result<()> {
        let buffer = match buffer {
            Some(handle) => Some(self.buffers.get(&handle).cloned().ok_or(UNKNOWN_BUFFER)?),
            None => None,
        };
        self.node_mut(id)?
            .as_buffer_source_mut()
            .ok_or(WRONG_KIND)?
            .set_buffer(buffer);
        Ok(())
    }

    pub fn set_loop(&mut self, id: NodeId, looping: bool) -> Result<()> {
        self.node_mut(id)?
            .as_buffer_source_mut()
            .ok_or(WRONG_KIND)?
            .set_loop(looping);
        Ok(())
    }

    pub fn set_loop_region(&mut self, id: NodeId, start: f64, end: f64) -> Result<()> {
        self.node_mut(id)?
            .as_buffer_source_mut()
            .ok_or(WRONG_KIND)?
            .set_loop_region(start, end);
        Ok(())
    }

    /// Start an oscillator or buffer source. `offset` and `duration` only
    /// apply to buffer sources.
    pub fn start(
        &mut self,
        id: NodeId,
        when: f64,
        offset: Option<f64>,
        duration: Option<f64>,
    ) -> Result<()> {
        let node = self.node_mut(id)?;
        if let Some(osc) = node.as_oscillator_mut() {
            osc.start(when);
            return Ok(());
        }
        node.as_buffer_source_mut()
            .ok_or(WRONG_KIND)?
            .start(when, offset, duration);
        Ok(())
    }

    pub fn stop(&mut self, id: NodeId, when: f64) -> Result<()> {
        let node = self.node_mut(id)?;
        if let Some(osc) = node.as_oscillator_mut() {
            osc.stop(when);
            return Ok(());
        }
        node.as_buffer_source_mut().ok_or(WRONG_KIND)?.stop(when);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Params
    // ------------------------------------------------------------------

    /// Resolve a parameter reference for reading or scheduling.
    pub fn param(&mut self, param: ParamRef) -> Result<&mut AudioParam> {
        match param {
            ParamRef::Node(id, name) => self.node_mut(id)?.param_mut(name).ok_or(WRONG_KIND),
            ParamRef::Listener(axis, component) => Ok(self.get().listener_param(axis, component)),
        }
    }

    pub fn value_at(&mut self, param: ParamRef, time: f64) -> Result<f32> {
        Ok(self.param(param)?.value_at(time))
    }

    pub fn default_value(&mut self, param: ParamRef) -> Result<f32> {
        Ok(self.param(param)?.default_value())
    }

    pub fn set_value(&mut self, param: ParamRef, value: f32) -> Result<()> {
        self.param(param)?.set_value(value);
        Ok(())
    }

    pub fn set_value_at_time(&mut self, param: ParamRef, value: f32, time: f64) -> Result<()> {
        self.param(param)?.set_value_at_time(value, time);
        Ok(())
    }

    pub fn linear_ramp_to_value_at_time(&mut self, param: ParamRef, value: f32, time: f64) -> Result<()> {
        self.param(param)?.linear_ramp_to_value_at_time(value, time);
        Ok(())
    }

    pub fn exponential_ramp_to_value_at_time(
        &mut self,
        param: ParamRef,
        value: f32,
        time: f64,
    ) -> Result<()> {
        self.param(param)?.exponential_ramp_to_value_at_time(value, time);
        Ok(())
    }

    pub fn set_target_at_time(
        &mut self,
        param: ParamRef,
        target: f32,
        start_time: f64,
        time_constant: f64,
    ) -> Result<()> {
        self.param(param)?
            .set_target_at_time(target, start_time, time_constant);
        Ok(())
    }

    pub fn cancel_scheduled_values(&mut self, param: ParamRef, time: f64) -> Result<()> {
        self.param(param)?.cancel_scheduled_values(time);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Buffers
    // ------------------------------------------------------------------

    fn insert_buffer(&mut self, buffer: AudioBuffer) -> BufferHandle {
        let handle = BufferHandle(self.next_buffer);
        self.next_buffer = self.next_buffer.wrapping_add(1);
        self.buffers.insert(handle, Arc::new(buffer));
        handle
    }

    /// A silent buffer. Fails for 0 or more than 8 channels, a zero sample
    /// rate, or when the samples cannot be allocated.
    pub fn create_buffer(&mut self, channels: usize, sample_rate: u32, frames: usize) -> Result<BufferHandle> {
        let buffer = AudioBuffer::new(channels, sample_rate, frames)?;
        Ok(self.insert_buffer(buffer))
    }

    /// Drop the script's reference. Sources the buffer is bound to keep playing it.
    pub fn destroy_buffer(&mut self, handle: BufferHandle) -> Result<()> {
        self.buffers
            .remove(&handle)
            .map(|_| ())
            .ok_or(UNKNOWN_BUFFER)
    }

    pub fn buffer(&self, handle: BufferHandle) -> Result<&AudioBuffer> {
        self.buffers
            .get(&handle)
            .map(|b| &**b)
            .ok_or(UNKNOWN_BUFFER)
    }

    pub fn channel_data(&self, handle: BufferHandle, channel: usize) -> Result<Vec<f32>> {
        self.buffer(handle)?
            .channel_data(channel)
            .ok_or(Error::BadArgument("channel index out of range"))
    }

    /// Write script data into a channel. Sources already bound to the buffer
    /// keep the contents they were bound with.
    pub fn copy_to_channel(&mut self, handle: BufferHandle, channel: usize, data: &[f32]) -> Result<()> {
        let buffer = self.buffers.get_mut(&handle).ok_or(UNKNOWN_BUFFER)?;
        Arc::make_mut(buffer).copy_to_channel(channel, data)
    }

    /// Decode a WAV file into a new buffer.
    pub fn decode_wav(&mut self, bytes: &[u8]) -> Result<BufferHandle> {
        let buffer = decode_wav(bytes)?;
        Ok(self.insert_buffer(buffer))
    }
}

impl Default for ScriptHost {
    fn default() -> Self {
        Self::new(|| Engine::new(DEFAULT_SAMPLE_RATE))
    }
}
