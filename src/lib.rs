//! # Tonwerk
//!
//! A Web Audio style audio graph engine: nodes with sample-accurate
//! parameter automation, a memoized pull renderer, and pluggable output
//! devices.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tonwerk::{Engine, NodeKind, ParamName, devices::MemoryDevice};
//!
//! let device = MemoryDevice::new(480);
//! let mut engine = Engine::new(48000).with_device(device.clone());
//!
//! let osc = engine.create_node(NodeKind::Oscillator);
//! let gain = engine.create_node(NodeKind::Gain);
//! engine.oscillator_mut(osc).unwrap().start(0.0);
//!
//! // fade in over one second
//! let g = engine.param_mut(gain, ParamName::Gain).unwrap();
//! g.set_value_at_time(0.0, 0.0);
//! g.linear_ramp_to_value_at_time(1.0, 1.0);
//!
//! engine.connect(osc, gain).unwrap();
//! engine.connect(gain, engine.destination()).unwrap();
//!
//! engine.resume().unwrap();
//! for _ in 0..100 {
//!     engine.tick();
//! }
//! ```
//!
//! ## Lifetimes
//!
//! Nodes are reference counted. [`Engine::create_node`] hands the caller one
//! reference; every connection holds another on its source. A node is
//! destroyed once both are gone, and takes its inputs' references with it.
//!
//! ## Feature Flags
//!
//! - `cpal_sink` - real audio output through [`cpal`](https://docs.rs/cpal)

extern crate alloc;

pub mod buffer;
pub mod device;
pub mod engine;
pub mod error;
pub mod graph;
pub mod host;
pub mod node;
pub mod nodes;
pub mod param;
mod render;
pub mod wav;

pub use buffer::AudioBuffer;
pub use engine::{Component, Engine, Listener, ListenerAxis};
pub use error::{DecodeError, Error, Result};
pub use host::{BufferHandle, ParamRef, ScriptHost};
pub use node::{AudioNode, NodeId, NodeKind, ParamName, ProcessContext, Pull};
pub use param::{AudioParam, AutomationEvent, EventKind};
pub use wav::{decode_wav, encode_wav, WavEncoding};

/// Output backends.
pub mod devices {
    #[cfg(feature = "cpal_sink")]
    pub use crate::device::CpalDevice;
    pub use crate::device::{AudioDevice, DeviceConfig, MemoryDevice, RtrbDevice};
}
