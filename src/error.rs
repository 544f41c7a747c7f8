use std::{io, path::PathBuf};

/// Errors produced while framing messages on the native-messaging pipe.
///
/// [`FrameError::TooLarge`] and [`FrameError::Malformed`] are recoverable: the
/// offending frame has been consumed (or is being skipped) and the stream stays
/// aligned on the next length prefix. [`FrameError::Io`] is not.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("message of {len} bytes exceeds the {max} byte limit")]
    TooLarge { len: usize, max: usize },

    #[error("{0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl FrameError {
    /// True for errors that leave the stream usable.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, FrameError::Io(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Errors that end the host process.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("stdio failure: {0}")]
    Io(#[from] io::Error),

    #[error("framing failure: {0}")]
    Frame(FrameError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<FrameError> for HostError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Io(e) => HostError::Io(e),
            other => HostError::Frame(other),
        }
    }
}

impl HostError {
    /// The browser closed one of our pipes. This is the normal way a host ends.
    pub fn is_disconnect(&self) -> bool {
        match self {
            HostError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
            ),
            _ => false,
        }
    }
}
