use std::{io, process::ExitStatus};

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// A connection string, compose file, Dockerfile or config document
    /// could not be parsed.
    #[error("invalid format: {0}")]
    Format(String),

    /// A database driver or service slug we do not know how to handle.
    #[error("unsupported configuration: {0}")]
    Unsupported(String),

    /// The Docker daemon could not be reached at all.
    #[error("docker daemon unavailable: {0}")]
    DaemonUnavailable(String),

    /// The daemon answered but refused a request.
    #[error("docker daemon error: {0}")]
    Daemon(String),

    #[error("command `{command}` failed: {status}")]
    CommandFailed { command: String, status: ExitStatus },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("terminal output failed: {0}")]
    Terminal(#[from] crossterm::ErrorKind),
}

impl Error {
    pub fn format<S: Into<String>>(message: S) -> Error {
        Error::Format(message.into())
    }

    pub fn unsupported<S: Into<String>>(message: S) -> Error {
        Error::Unsupported(message.into())
    }
}
