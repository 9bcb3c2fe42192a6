//! Error types for xslt-bridge
//!
//! Configuration errors carry fixed messages that callers match on, so their
//! text must not change. Engine failures are flattened to the message of
//! their innermost cause.

use std::error::Error as StdError;
use std::io;

use thiserror::Error;

/// Invalid configuration, detected before any resource is opened
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Properties 'xsltPath' and 'xslt' must not be used together.")]
    XsltConflict,

    #[error("Properties 'sourcePath' and 'source' must not be used together.")]
    SourceConflict,

    #[error("Unsupported format for property 'xslt'. Has to be 'string' or 'Buffer'.")]
    UnsupportedXslt,

    #[error("Property 'sourcePath' or 'source' has to be given.")]
    SourceMissing,

    #[error("Property 'result' has to be given.")]
    ResultMissing,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// A file, stream or buffer could not be opened, read, written or closed
    #[error("{0}")]
    Resource(#[from] io::Error),

    /// The engine failed to build, configure or run a transformer
    #[error("{message}")]
    Engine {
        message: String,
        #[source]
        source: xslt_engine_traits::Error,
    },

    /// Scheduling failure: a step panicked or the task graph is malformed
    #[error("{0}")]
    Runtime(String),
}

impl From<xslt_engine_traits::Error> for Error {
    fn from(err: xslt_engine_traits::Error) -> Self {
        match err {
            xslt_engine_traits::Error::Io(io) => Error::Resource(io),
            other => Error::Engine {
                message: root_message(&other),
                source: other,
            },
        }
    }
}

impl From<crate::graph::GraphError> for Error {
    fn from(err: crate::graph::GraphError) -> Self {
        Error::Runtime(err.to_string())
    }
}

impl Error {
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }
}

/// Message of the innermost error in the `source()` chain of `err`.
pub fn root_message(err: &(dyn StdError + 'static)) -> String {
    let mut current = err;
    while let Some(cause) = current.source() {
        current = cause;
    }
    current.to_string()
}

pub type Result<T> = std::result::Result<T, Error>;
