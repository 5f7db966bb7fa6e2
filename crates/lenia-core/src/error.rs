use thiserror::Error;

/// Errors raised while configuring or running a simulation.
///
/// Classification outcomes (`died`, `lived`, `unstable`, `timed_out`) are
/// not errors; they are reported through [`crate::RunResult`].
#[derive(Debug, Error)]
pub enum LeniaError {
    /// A parameter is out of range; detected before the first generation.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The requested configuration would not fit in memory.
    #[error("resource exhaustion: {0}")]
    ResourceExhaustion(String),

    /// The frame sink rejected a frame or failed to flush.
    #[error("frame sink failed at generation {generation}: {source}")]
    SinkFailure {
        generation: u32,
        #[source]
        source: SinkError,
    },
}

/// Failure reported by a [`crate::FrameSink`] implementation.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encode(String),

    /// The sink can no longer accept frames (worker gone, channel closed).
    #[error("sink closed: {0}")]
    Closed(String),
}

pub type LeniaResult<T> = Result<T, LeniaError>;
