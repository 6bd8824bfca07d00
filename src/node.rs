//! Core node trait, node kinds and the per-node render bookkeeping.

use core::str::FromStr;

use petgraph::stable_graph::NodeIndex;

use crate::engine::Listener;
use crate::error::{Error, Result};
use crate::nodes::{Analyser, Biquad, BufferSource, Destination, Gain, Oscillator, Panner};
use crate::param::AudioParam;

/// Information available while a node renders one quantum.
///
/// Passed to every [`AudioNode::process`] call.
#[derive(Clone, Copy, Debug)]
pub struct ProcessContext<'a> {
    /// Engine sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count of every buffer in this quantum.
    pub channels: usize,
    /// Frames in this quantum.
    pub frames: usize,
    /// Transport time of the first frame, in seconds.
    pub block_start: f64,
    /// Render generation of this quantum.
    pub generation: u64,
    pub listener: &'a Listener,
}

impl ProcessContext<'_> {
    /// Transport time of `frame` within this quantum.
    #[inline]
    pub fn time_at(&self, frame: usize) -> f64 {
        self.block_start + frame as f64 / self.sample_rate as f64
    }

    /// Interleaved sample count of one quantum.
    #[inline]
    pub fn len(&self) -> usize {
        self.frames * self.channels
    }
}

/// Which of its inputs a node pulls before it processes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pull {
    /// Sources: inputs are ignored.
    Nothing,
    /// Effects: only the first connected input is rendered.
    First,
    /// Sinks: every input is rendered and summed.
    All,
}

/// The processing half of a node.
///
/// The renderer pulls the node's inputs according to [`pull`](Self::pull),
/// then hands the result to [`process`](Self::process). `input` is `None`
/// when nothing is connected; otherwise it holds `ctx.len()` interleaved
/// samples. `output` always holds `ctx.len()` samples and must be fully
/// written.
pub trait AudioNode {
    fn process(&mut self, ctx: &ProcessContext<'_>, input: Option<&[f32]>, output: &mut [f32]);

    fn pull(&self) -> Pull {
        Pull::First
    }
}

/// Handle to a node in an [`Engine`](crate::Engine).
///
/// Ids of destroyed nodes may be handed out again to later nodes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(pub(crate) NodeIndex);

impl NodeId {
    #[inline]
    pub fn index(&self) -> usize {
        self.0.index()
    }
}

/// The closed set of node kinds.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum NodeKind {
    Destination,
    Gain,
    Oscillator,
    BufferSource,
    Biquad,
    Analyser,
    Panner,
}

impl FromStr for NodeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "destination" => NodeKind::Destination,
            "gain" => NodeKind::Gain,
            "oscillator" => NodeKind::Oscillator,
            "buffer-source" | "bufferSource" => NodeKind::BufferSource,
            "biquad" | "biquadFilter" => NodeKind::Biquad,
            "analyser" => NodeKind::Analyser,
            "panner" => NodeKind::Panner,
            _ => return Err(Error::BadArgument("unknown node kind")),
        })
    }
}

/// Names of the automatable parameters across all node kinds.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ParamName {
    /// `Gain.gain`
    Gain,
    /// `Oscillator.frequency`, `Biquad.frequency`
    Frequency,
    /// `Oscillator.detune`
    Detune,
    /// `BufferSource.playbackRate`
    PlaybackRate,
    /// `Biquad.Q`
    Q,
    /// `Biquad.gain`
    FilterGain,
    PositionX,
    PositionY,
    PositionZ,
}

/// Per-kind node state.
pub enum NodeState {
    Destination(Destination),
    Gain(Gain),
    Oscillator(Oscillator),
    BufferSource(BufferSource),
    Biquad(Biquad),
    Analyser(Analyser),
    Panner(Panner),
}

impl NodeState {
    pub fn new(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Destination => NodeState::Destination(Destination),
            NodeKind::Gain => NodeState::Gain(Gain::new()),
            NodeKind::Oscillator => NodeState::Oscillator(Oscillator::new()),
            NodeKind::BufferSource => NodeState::BufferSource(BufferSource::new()),
            NodeKind::Biquad => NodeState::Biquad(Biquad::new()),
            NodeKind::Analyser => NodeState::Analyser(Analyser::new()),
            NodeKind::Panner => NodeState::Panner(Panner::new()),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodeState::Destination(_) => NodeKind::Destination,
            NodeState::Gain(_) => NodeKind::Gain,
            NodeState::Oscillator(_) => NodeKind::Oscillator,
            NodeState::BufferSource(_) => NodeKind::BufferSource,
            NodeState::Biquad(_) => NodeKind::Biquad,
            NodeState::Analyser(_) => NodeKind::Analyser,
            NodeState::Panner(_) => NodeKind::Panner,
        }
    }

    pub fn param(&self, name: ParamName) -> Option<&AudioParam> {
        match (self, name) {
            (NodeState::Gain(n), ParamName::Gain) => Some(n.gain()),
            (NodeState::Oscillator(n), ParamName::Frequency) => Some(n.frequency()),
            (NodeState::Oscillator(n), ParamName::Detune) => Some(n.detune()),
            (NodeState::BufferSource(n), ParamName::PlaybackRate) => Some(n.playback_rate()),
            (NodeState::Biquad(n), ParamName::Frequency) => Some(n.frequency()),
            (NodeState::Biquad(n), ParamName::Q) => Some(n.q()),
            (NodeState::Biquad(n), ParamName::FilterGain) => Some(n.gain()),
            (NodeState::Panner(n), ParamName::PositionX) => Some(&n.position()[0]),
            (NodeState::Panner(n), ParamName::PositionY) => Some(&n.position()[1]),
            (NodeState::Panner(n), ParamName::PositionZ) => Some(&n.position()[2]),
            _ => None,
        }
    }

    pub fn param_mut(&mut self, name: ParamName) -> Option<&mut AudioParam> {
        match (self, name) {
            (NodeState::Gain(n), ParamName::Gain) => Some(n.gain_mut()),
            (NodeState::Oscillator(n), ParamName::Frequency) => Some(n.frequency_mut()),
            (NodeState::Oscillator(n), ParamName::Detune) => Some(n.detune_mut()),
            (NodeState::BufferSource(n), ParamName::PlaybackRate) => Some(n.playback_rate_mut()),
            (NodeState::Biquad(n), ParamName::Frequency) => Some(n.frequency_mut()),
            (NodeState::Biquad(n), ParamName::Q) => Some(n.q_mut()),
            (NodeState::Biquad(n), ParamName::FilterGain) => Some(n.gain_mut()),
            (NodeState::Panner(n), ParamName::PositionX) => Some(&mut n.position_mut()[0]),
            (NodeState::Panner(n), ParamName::PositionY) => Some(&mut n.position_mut()[1]),
            (NodeState::Panner(n), ParamName::PositionZ) => Some(&mut n.position_mut()[2]),
            _ => None,
        }
    }
}

impl AudioNode for NodeState {
    fn process(&mut self, ctx: &ProcessContext<'_>, input: Option<&[f32]>, output: &mut [f32]) {
        match self {
            NodeState::Destination(n) => n.process(ctx, input, output),
            NodeState::Gain(n) => n.process(ctx, input, output),
            NodeState::Oscillator(n) => n.process(ctx, input, output),
            NodeState::BufferSource(n) => n.process(ctx, input, output),
            NodeState::Biquad(n) => n.process(ctx, input, output),
            NodeState::Analyser(n) => n.process(ctx, input, output),
            NodeState::Panner(n) => n.process(ctx, input, output),
        }
    }

    fn pull(&self) -> Pull {
        match self {
            NodeState::Destination(n) => n.pull(),
            NodeState::Gain(n) => n.pull(),
            NodeState::Oscillator(n) => n.pull(),
            NodeState::BufferSource(n) => n.pull(),
            NodeState::Biquad(n) => n.pull(),
            NodeState::Analyser(n) => n.pull(),
            NodeState::Panner(n) => n.pull(),
        }
    }
}

macro_rules! kind_accessors {
    ($($variant:ident: $ty:ty => $get:ident, $get_mut:ident;)*) => {
        $(
            #[inline]
            pub fn $get(&self) -> Option<&$ty> {
                match &self.state {
                    NodeState::$variant(n) => Some(n),
                    _ => None,
                }
            }

            #[inline]
            pub fn $get_mut(&mut self) -> Option<&mut $ty> {
                match &mut self.state {
                    NodeState::$variant(n) => Some(n),
                    _ => None,
                }
            }
        )*
    };
}

/// A node as stored in the graph: its state plus the renderer's bookkeeping.
pub struct Node {
    pub(crate) state: NodeState,
    pub(crate) refcount: u32,
    /// Output of the last quantum this node rendered. Grown on demand, never shrunk.
    pub(crate) scratch: Vec<f32>,
    /// Pulled (and, for sinks, summed) input of the current quantum.
    pub(crate) pulled: Vec<f32>,
    pub(crate) last_rendered: u64,
    pub(crate) renders: u64,
}

impl Node {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            state: NodeState::new(kind),
            refcount: 1,
            scratch: Vec::new(),
            pulled: Vec::new(),
            last_rendered: 0,
            renders: 0,
        }
    }

    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.state.kind()
    }

    #[inline]
    pub fn refcount(&self) -> u32 {
        self.refcount
    }

    /// Generation of the last quantum this node rendered (0 if never).
    #[inline]
    pub fn last_rendered_generation(&self) -> u64 {
        self.last_rendered
    }

    /// How many times this node has been processed in total.
    #[inline]
    pub fn render_count(&self) -> u64 {
        self.renders
    }

    #[inline]
    pub fn state(&self) -> &NodeState {
        &self.state
    }

    #[inline]
    pub fn param(&self, name: ParamName) -> Option<&AudioParam> {
        self.state.param(name)
    }

    #[inline]
    pub fn param_mut(&mut self, name: ParamName) -> Option<&mut AudioParam> {
        self.state.param_mut(name)
    }

    kind_accessors! {
        Gain: Gain => as_gain, as_gain_mut;
        Oscillator: Oscillator => as_oscillator, as_oscillator_mut;
        BufferSource: BufferSource => as_buffer_source, as_buffer_source_mut;
        Biquad: Biquad => as_biquad, as_biquad_mut;
        Analyser: Analyser => as_analyser, as_analyser_mut;
        Panner: Panner => as_panner, as_panner_mut;
    }
}

/// Grow `buf` to at least `len` samples without ever shrinking it.
pub(crate) fn ensure_len(buf: &mut Vec<f32>, len: usize) -> Result<()> {
    if buf.len() < len {
        buf.try_reserve_exact(len - buf.len())?;
        buf.resize(len, 0.0);
    }
    Ok(())
}
