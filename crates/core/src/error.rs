/// Result alias that carries the custom [`PreviewError`] type.
pub type Result<T> = std::result::Result<T, PreviewError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    /// The beatmap mode has no renderer registered for it. Raised before the
    /// render loop starts.
    #[error("beatmap mode {mode} has no renderer")]
    UnsupportedMode { mode: u8 },
    /// A slider starts before every timing point, so its beat length is unknown.
    #[error("hit object #{index} at {time}ms has no applicable timing point")]
    NoApplicableTimingPoint { index: usize, time: f64 },
    /// A beatmap without hit objects has no total duration to play against.
    #[error("beatmap contains no hit objects")]
    EmptyBeatmap,
    #[error("hit object #{index} ends at {end_time}ms before it starts at {time}ms")]
    EndsBeforeStart {
        index: usize,
        time: f64,
        end_time: f64,
    },
    /// Resuming audio playback failed. Recoverable: the session logs it and
    /// keeps ticking.
    #[error("failed to resume playback: {0}")]
    PlaybackResume(String),
    /// The session has torn down and no longer accepts events.
    #[error("preview session is closed")]
    SessionClosed,
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

impl PreviewError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Returns `true` for errors that must abort preview setup.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::PlaybackResume(_) | Self::SessionClosed)
    }
}

impl From<&str> for PreviewError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for PreviewError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
