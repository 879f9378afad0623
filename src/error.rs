use std::{error, fmt};

// -------------------------------------------------------------------------------------------------

/// Provides an enumeration of all possible errors reported by stompcore.
#[derive(Debug)]
pub enum Error {
    /// An effect only supports mono or stereo I/O but got initialized with
    /// some other channel count.
    ChannelLayoutError(usize),
    /// An unknown parameter id, an out-of-range value or a wrongly typed
    /// parameter or message payload.
    ParameterError(String),
    /// A control message could not be delivered to the audio thread.
    SendError(String),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChannelLayoutError(channel_count) => {
                write!(f, "Unsupported channel count: {channel_count}")
            }
            Self::ParameterError(str) => write!(f, "Invalid parameter: {str}"),
            Self::SendError(str) => write!(f, "Failed to send channel message: {str}"),
        }
    }
}

impl<T> From<crossbeam_channel::SendError<T>> for Error {
    fn from(err: crossbeam_channel::SendError<T>) -> Self {
        Error::SendError(err.to_string())
    }
}

impl<T> From<crossbeam_channel::TrySendError<T>> for Error {
    fn from(err: crossbeam_channel::TrySendError<T>) -> Self {
        Error::SendError(err.to_string())
    }
}
