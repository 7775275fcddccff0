use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// The engine task has shut down; commands can no longer be applied.
    #[error("Playback engine is no longer running")]
    EngineClosed,

    /// Live radio is not seekable.
    #[error("Seeking is not available in radio mode")]
    SeekUnavailableInRadio,

    /// The platform audio device reported a failure.
    #[error("Audio sink error: {0}")]
    Sink(String),
}

pub type Result<T> = std::result::Result<T, PlaybackError>;
