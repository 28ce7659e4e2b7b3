use paxboard_shared::Channel;
use std::time::Duration;
use thiserror::Error;

/// A sampler tick that failed unexpectedly. Missing hardware is not an error;
/// samplers report it as an empty list or a `null` field instead.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("{channel}: failed to run {program}: {source}")]
    Spawn {
        channel: Channel,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{channel}: unparsable output: {message}")]
    Parse { channel: Channel, message: String },

    #[error("{channel}: request failed: {source}")]
    Request {
        channel: Channel,
        #[source]
        source: reqwest::Error,
    },

    #[error("{channel}: sampler did not complete within {timeout:?}")]
    Timeout { channel: Channel, timeout: Duration },

    #[error("{channel}: sampler task failed: {message}")]
    Task { channel: Channel, message: String },
}

impl SampleError {
    pub fn channel(&self) -> Channel {
        match self {
            SampleError::Spawn { channel, .. }
            | SampleError::Parse { channel, .. }
            | SampleError::Request { channel, .. }
            | SampleError::Timeout { channel, .. }
            | SampleError::Task { channel, .. } => *channel,
        }
    }

    pub fn parse(channel: Channel, message: impl Into<String>) -> Self {
        SampleError::Parse {
            channel,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum HubError {
    #[error("channel {0} is not registered")]
    UnknownChannel(Channel),

    #[error(transparent)]
    Sample(#[from] SampleError),

    #[error("failed to encode sample: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("channel {0} is already registered")]
    Duplicate(Channel),

    #[error("channel {0} needs a non-zero poll interval")]
    ZeroInterval(Channel),
}
