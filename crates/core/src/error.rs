#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlaybackError {
    #[error("could not start segment {index} at {start:.2}s: {reason}")]
    BackendStart {
        index: usize,
        start: f64,
        reason: String,
    },

    #[error("playback of segment {index} stopped: {reason}")]
    PlaybackLost { index: usize, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
