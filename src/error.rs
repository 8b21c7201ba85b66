use thiserror::Error;

/// Framing errors of the fragmentation header
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("truncated header: {needed} bytes needed, {available} available")]
    Truncated { needed: usize, available: usize },
    #[error("invalid fragment {frag_seq} of {frag_count}")]
    InvalidFragment { frag_seq: u16, frag_count: u16 },
    #[error("burst {burst_seq}: merged {merged} B but header declares {declared} B")]
    SizeMismatch {
        burst_seq: u32,
        merged: u64,
        declared: u32,
    },
}

/// Errors raised while configuring generators or importing their resources
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid mixture: {0}")]
    InvalidMixture(String),
    #[error("{app} does not support {frame_rate} FPS (supported: {supported:?})")]
    UnsupportedFrameRate {
        app: String,
        frame_rate: f64,
        supported: Vec<f64>,
    },
    #[error("invalid data rate \"{0}\"")]
    InvalidDataRate(String),
    #[error("trace line {line}: {reason}")]
    Trace { line: u64, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Wire(#[from] WireError),
}

pub type Result<T> = std::result::Result<T, Error>;
