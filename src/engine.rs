//! The audio engine: graph owner, transport and device lifecycle

use std::collections::TryReserveError;

use tracing::{info, trace, warn};

use crate::device::{AudioDevice, MemoryDevice};
use crate::error::{Error, Result};
use crate::graph::AudioGraph;
use crate::node::{Node, NodeId, NodeKind, ParamName, ProcessContext};
use crate::nodes::{Analyser, Biquad, BufferSource, Gain, Oscillator, Panner};
use crate::param::AudioParam;
use crate::render;

/// Sample rate used until a device reports its own.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Channel count used until a device reports its own.
pub const DEFAULT_CHANNELS: usize = 2;

/// Frames the fallback device asks for when no device is configured.
const DEFAULT_BLOCK_FRAMES: usize = 512;

/// One of the listener's three vectors.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ListenerAxis {
    Position,
    Forward,
    Up,
}

/// A coordinate of a listener vector.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Component {
    X,
    Y,
    Z,
}

impl Component {
    #[inline]
    fn index(self) -> usize {
        match self {
            Component::X => 0,
            Component::Y => 1,
            Component::Z => 2,
        }
    }
}

/// The point of view panners render relative to.
///
/// Nine parameters: position (default origin), forward (default `-z`) and up
/// (default `+y`). Only the position affects rendering.
#[derive(Clone, Debug)]
pub struct Listener {
    pub position: [AudioParam; 3],
    pub forward: [AudioParam; 3],
    pub up: [AudioParam; 3],
}

impl Listener {
    /// A listener at the origin facing `-z` with `+y` up.
    pub fn new() -> Self {
        let vector = |x, y, z| [AudioParam::new(x), AudioParam::new(y), AudioParam::new(z)];
        Self {
            position: vector(0.0, 0.0, 0.0),
            forward: vector(0.0, 0.0, -1.0),
            up: vector(0.0, 1.0, 0.0),
        }
    }

    /// One of the nine listener parameters.
    pub fn param(&self, axis: ListenerAxis, component: Component) -> &AudioParam {
        let vector = match axis {
            ListenerAxis::Position => &self.position,
            ListenerAxis::Forward => &self.forward,
            ListenerAxis::Up => &self.up,
        };
        &vector[component.index()]
    }

    pub fn param_mut(&mut self, axis: ListenerAxis, component: Component) -> &mut AudioParam {
        let vector = match axis {
            ListenerAxis::Position => &mut self.position,
            ListenerAxis::Forward => &mut self.forward,
            ListenerAxis::Up => &mut self.up,
        };
        &mut vector[component.index()]
    }
}

impl Default for Listener {
    fn default() -> Self {
        Self::new()
    }
}

/// The audio engine - owns the node graph, the listener and the output device.
///
/// Build the graph with [`create_node`](Self::create_node) and
/// [`connect`](Self::connect), call [`resume`](Self::resume), then drive
/// rendering by calling [`tick`](Self::tick) at the device's pace. Each tick
/// renders one quantum from the destination backwards and pushes it to the
/// device.
///
/// ```no_run
/// use tonwerk::{Engine, NodeKind, ParamName, devices::MemoryDevice};
///
/// let device = MemoryDevice::new(480);
/// let mut engine = Engine::new(48000).with_device(device.clone());
///
/// let osc = engine.create_node(NodeKind::Oscillator);
/// let gain = engine.create_node(NodeKind::Gain);
/// engine.param_mut(gain, ParamName::Gain).unwrap().set_value(0.5);
/// engine.oscillator_mut(osc).unwrap().start(0.0);
///
/// engine.connect(osc, gain).unwrap();
/// engine.connect(gain, engine.destination()).unwrap();
///
/// engine.resume().unwrap();
/// engine.tick();
/// ```
///
/// # Lifecycle
///
/// A new engine is suspended. `resume` opens the device (once) and adopts
/// the sample rate and channel count it reports. `suspend` stops ticking
/// without closing the device. `close` releases the device for good; a
/// closed engine cannot be resumed.
pub struct Engine {
    graph: AudioGraph,
    destination: NodeId,
    listener: Listener,
    device: Box<dyn AudioDevice>,

    sample_rate: u32,
    channels: usize,
    current_time: f64,
    generation: u64,
    mix: Vec<f32>,

    running: bool,
    closed: bool,
}

impl Engine {
    /// A suspended engine whose output is discarded.
    ///
    /// Ticks still render and advance transport time. Replace the device
    /// with [`with_device`](Self::with_device) to hear or record anything.
    pub fn new(sample_rate: u32) -> Self {
        let mut graph = AudioGraph::new();
        let destination = graph.add(NodeKind::Destination);
        graph.pin(destination);

        Self {
            graph,
            destination,
            listener: Listener::new(),
            device: Box::new(MemoryDevice::discarding(DEFAULT_BLOCK_FRAMES)),
            sample_rate,
            channels: DEFAULT_CHANNELS,
            current_time: 0.0,
            generation: 0,
            mix: Vec::new(),
            running: false,
            closed: false,
        }
    }

    /// Ask the device for `channels` output channels (at least one).
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels.max(1);
        self
    }

    /// Render into `device` instead of discarding the output.
    pub fn with_device(mut self, device: impl AudioDevice + 'static) -> Self {
        self.device = Box::new(device);
        self
    }

    /// The rendering rate. Adopted from the device on the first `resume`.
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Transport time in seconds.
    #[inline]
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Render generation; bumped once per tick.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The node whose output goes to the device. It lives as long as the engine.
    #[inline]
    pub fn destination(&self) -> NodeId {
        self.destination
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    #[inline]
    pub fn listener(&self) -> &Listener {
        &self.listener
    }

    #[inline]
    pub fn listener_mut(&mut self) -> &mut Listener {
        &mut self.listener
    }

    /// Shorthand for `listener_mut().param_mut(..)`.
    pub fn listener_param(&mut self, axis: ListenerAxis, component: Component) -> &mut AudioParam {
        self.listener.param_mut(axis, component)
    }

    #[inline]
    pub fn graph(&self) -> &AudioGraph {
        &self.graph
    }

    /// Number of live nodes, the destination included.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.graph.len()
    }

    /// Script references plus consumers holding `id`, or `None` once it is destroyed.
    pub fn refcount(&self, id: NodeId) -> Option<u32> {
        self.graph.node(id).map(Node::refcount)
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.graph.contains(id)
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Create a node with a refcount of one, held by the caller.
    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        self.graph.add(kind)
    }

    /// Take another script reference on `id`.
    pub fn retain(&mut self, id: NodeId) -> Result<()> {
        self.graph.retain(id)
    }

    /// Drop a reference. The destination keeps one reference owned by the
    /// engine that cannot be released.
    pub fn release(&mut self, id: NodeId) -> Result<()> {
        if id == self.destination && self.graph.node(id).map_or(0, Node::refcount) <= 1 {
            return Err(Error::BadArgument("the destination is owned by the engine"));
        }
        self.graph.release(id)
    }

    /// Feed the output of `src` into `dst`. The connection holds a reference
    /// on `src` until it is disconnected or `dst` is destroyed.
    ///
    /// Connecting twice is a no-op, as is connecting into a node that already
    /// has [`MAX_INPUTS`](crate::graph::MAX_INPUTS) inputs.
    pub fn connect(&mut self, src: NodeId, dst: NodeId) -> Result<()> {
        self.graph.connect(src, dst)
    }

    /// Undo `connect(src, dst)`. May destroy `src` and whatever only it held.
    pub fn disconnect(&mut self, src: NodeId, dst: NodeId) -> Result<()> {
        self.graph.disconnect(src, dst)
    }

    /// Disconnect `src` from every node it feeds.
    pub fn disconnect_all(&mut self, src: NodeId) -> Result<()> {
        self.graph.disconnect_all(src)
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.graph.node(id)
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.graph.node_mut(id)
    }

    /// `None` if the node is gone or has no parameter of that name.
    pub fn param_mut(&mut self, id: NodeId, name: ParamName) -> Option<&mut AudioParam> {
        self.graph.node_mut(id)?.param_mut(name)
    }

    /// The node's gain state, or `None` for any other kind.
    pub fn gain_mut(&mut self, id: NodeId) -> Option<&mut Gain> {
        self.graph.node_mut(id)?.as_gain_mut()
    }

    pub fn oscillator_mut(&mut self, id: NodeId) -> Option<&mut Oscillator> {
        self.graph.node_mut(id)?.as_oscillator_mut()
    }

    pub fn buffer_source_mut(&mut self, id: NodeId) -> Option<&mut BufferSource> {
        self.graph.node_mut(id)?.as_buffer_source_mut()
    }

    pub fn biquad_mut(&mut self, id: NodeId) -> Option<&mut Biquad> {
        self.graph.node_mut(id)?.as_biquad_mut()
    }

    pub fn analyser(&self, id: NodeId) -> Option<&Analyser> {
        self.graph.node(id)?.as_analyser()
    }

    pub fn analyser_mut(&mut self, id: NodeId) -> Option<&mut Analyser> {
        self.graph.node_mut(id)?.as_analyser_mut()
    }

    pub fn panner_mut(&mut self, id: NodeId) -> Option<&mut Panner> {
        self.graph.node_mut(id)?.as_panner_mut()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Open the device if needed, adopt its configuration and start ticking.
    pub fn resume(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        if !self.device.is_open() {
            let config = self.device.open(self.sample_rate, self.channels)?;
            if config.sample_rate == 0 || config.channels == 0 {
                self.device.close();
                return Err(Error::DeviceUnavailable(format!(
                    "device reported {} Hz, {} channels",
                    config.sample_rate, config.channels
                )));
            }
            self.sample_rate = config.sample_rate;
            self.channels = config.channels;
        }
        self.running = true;
        info!(sample_rate = self.sample_rate, channels = self.channels, "engine resumed");
        Ok(())
    }

    /// Stop ticking. The device stays open.
    pub fn suspend(&mut self) {
        self.running = false;
        info!(current_time = self.current_time, "engine suspended");
    }

    /// Close the device. Irreversible.
    pub fn close(&mut self) {
        if self.device.is_open() {
            self.device.close();
        }
        self.running = false;
        self.closed = true;
        info!(current_time = self.current_time, "engine closed");
    }

    /// Close the engine and drop every node it owns.
    pub fn shutdown(mut self) {
        self.close();
        info!(nodes = self.graph.len(), "engine shut down");
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    /// Render one quantum and push it to the device.
    ///
    /// Does nothing while suspended, once closed, or when the device is
    /// invalid or asks for no frames. If scratch storage cannot be grown the
    /// quantum is dropped and transport time does not advance.
    pub fn tick(&mut self) {
        if !self.running || self.closed {
            return;
        }
        if !self.device.is_valid() {
            warn!("audio device invalid, tick skipped");
            return;
        }
        let frames = self.device.expected_frames();
        if frames == 0 {
            return;
        }

        let len = match frames.checked_mul(self.channels) {
            Some(len) => len,
            None => {
                warn!(frames, "quantum too large, tick skipped");
                return;
            }
        };
        if let Err(err) = self.prepare_mix(len) {
            warn!(?err, frames, "mix allocation failed, tick skipped");
            return;
        }

        self.generation += 1;
        trace!(generation = self.generation, frames, "tick");

        let ctx = ProcessContext {
            sample_rate: self.sample_rate,
            channels: self.channels,
            frames,
            block_start: self.current_time,
            generation: self.generation,
            listener: &self.listener,
        };
        if let Err(err) = render::render(&mut self.graph, &ctx, self.destination, &mut self.mix) {
            warn!(%err, generation = self.generation, "render failed, tick skipped");
            return;
        }

        self.device.push(&self.mix[..len]);
        self.current_time += frames as f64 / self.sample_rate as f64;
    }

    fn prepare_mix(&mut self, len: usize) -> core::result::Result<(), TryReserveError> {
        if self.mix.len() < len {
            self.mix.try_reserve_exact(len - self.mix.len())?;
            self.mix.resize(len, 0.0);
        }
        self.mix[..len].iter_mut().for_each(|s| *s = 0.0);
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.device.is_open() {
            self.device.close();
        }
    }
}
