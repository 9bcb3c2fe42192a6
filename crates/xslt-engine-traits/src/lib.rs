//! Core trait abstractions for XSLT transform engines.
//!
//! This crate defines the capability an engine must provide to be driven by
//! the transformation orchestrator: a factory that compiles stylesheets, a
//! transformer that accepts parameters and output properties, and the stream
//! handles both read from and write to.

pub mod error;
pub mod io;
pub mod xslt;

pub use error::{Error, Result};
pub use io::{InputHandle, OutputHandle, SourceHandle, StreamResult, StreamSource};
pub use xslt::{EngineEnvironment, Transformer, TransformerFactory, XsltEngine};
