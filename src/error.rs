use std::io;
use std::path::PathBuf;
use std::str::Utf8Error;
use thiserror::Error;
use serde_json;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine path to config file")]
    NoConfigPath,

    #[error("Failed to encode/decode config as utf-8: {source}")]
    Utf8Error { #[from] source: Utf8Error },

    #[error("Failed to read/write config file: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Failed to parse/build config file: {source}")]
    JsonError { #[from] source: serde_json::Error },
}

impl ConfigError {
    pub fn is_file_not_found_error(&self) -> bool {
        match self {
            ConfigError::IOError { source } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/**
 * A line from the helper that does not match the protocol grammar.
 * Never fatal: the bridge and the session keep running.
 */
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Malformed line from helper: {raw_line:?}")]
pub struct ProtocolError {
    pub raw_line: String,
}

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Failed to start helper {path:?}: {source}")]
    SpawnFailed { path: PathBuf, source: io::Error },

    #[error("Failed to write to helper stdin: {source}")]
    WriteFailed { source: io::Error },

    #[error("Helper {0} pipe was not captured")]
    MissingPipe(&'static str),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("The device is not connected")]
    DeviceNotConnected,

    #[error("No bridge is running although one was expected")]
    AdapterNotAvailable,

    #[error("Failed to start helper {path:?}: {source}")]
    SpawnFailed { path: PathBuf, source: io::Error },

    #[error("Failed to send command to helper: {source}")]
    WriteFailed { source: io::Error },

    #[error("Device access is not supported on platform {platform}")]
    PlatformUnsupported { platform: String },

    #[error("The device session has shut down")]
    SessionClosed,
}

impl From<BridgeError> for SessionError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::SpawnFailed { path, source } => SessionError::SpawnFailed { path, source },
            BridgeError::WriteFailed { source } => SessionError::WriteFailed { source },
            BridgeError::MissingPipe(_) => SessionError::AdapterNotAvailable,
        }
    }
}
