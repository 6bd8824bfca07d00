//! Error types surfaced by the engine.

use std::collections::TryReserveError;

use thiserror::Error;

/// Errors returned by engine, graph, buffer and codec operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A stale or unknown node, a node of the wrong kind, or an out-of-range enum value.
    #[error("bad argument: {0}")]
    BadArgument(&'static str),

    /// Scratch, mix or buffer storage could not be allocated.
    #[error("out of memory")]
    OutOfMemory(#[from] TryReserveError),

    /// The audio device could not be opened or is no longer valid.
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// WAV bytes are malformed or use an unsupported encoding.
    #[error("failed to decode audio data: {0}")]
    DecodeFailed(#[from] DecodeError),

    /// Writing a WAV file failed.
    #[error("failed to encode audio data")]
    EncodeFailed(#[from] hound::Error),

    /// The engine was closed; it cannot be resumed again.
    #[error("audio engine is closed")]
    Closed,
}

/// Reasons a WAV byte stream is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("missing RIFF header")]
    NotRiff,

    #[error("RIFF container is not WAVE")]
    NotWave,

    #[error("no fmt chunk")]
    MissingFormat,

    #[error("no data chunk")]
    MissingData,

    #[error("fmt chunk is too short ({0} bytes)")]
    MalformedFormat(u32),

    #[error("unsupported format tag {0:#06x}")]
    UnsupportedFormat(u16),

    #[error("unsupported bit depth {bits} for format tag {format:#06x}")]
    UnsupportedBitDepth { format: u16, bits: u16 },

    #[error("invalid geometry: {channels} channels at {sample_rate} Hz, {frames} frames")]
    InvalidGeometry {
        channels: u16,
        sample_rate: u32,
        frames: usize,
    },

    #[error("data chunk is truncated ({declared} bytes declared, {available} available)")]
    Truncated { declared: u32, available: usize },
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
