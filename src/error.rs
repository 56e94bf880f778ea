use thiserror::Error;

/// Failure of a single pending-count poll.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("endpoint answered with HTTP {0}")]
    Status(u16),

    #[error("undecodable response: {0}")]
    Decode(String),

    #[error("endpoint rejected the check: {0}")]
    Rejected(String),

    #[error("response is missing {0}")]
    Incomplete(&'static str),
}

impl PollError {
    /// Transport-level failures are retried on a delayed timer. A response the
    /// endpoint produced on purpose (`success: false`, missing fields) is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status(_) | Self::Decode(_))
    }
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The output refused to play until it has been unlocked.
    #[error("playback locked: {0}")]
    Locked(String),

    #[error("sound unavailable: {0}")]
    Unavailable(String),
}
