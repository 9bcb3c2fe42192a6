//! XSLT engine abstraction traits
//!
//! The shape follows the classic factory / transformer split: an engine
//! creates a fresh factory per call, the factory compiles a stylesheet into a
//! transformer, and the transformer is parameterized and then run once.

use std::path::PathBuf;

use crate::error::Result;
use crate::io::{StreamResult, StreamSource};

/// Process-wide engine settings captured when a factory is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineEnvironment {
    /// Search paths for stylesheet modules and engine libraries
    pub library_paths: Vec<PathBuf>,
    /// Engine startup options
    pub options: Vec<String>,
}

/// Trait for XSLT transformation engines.
///
/// This trait abstracts over different XSLT implementation strategies,
/// allowing different engines to be used interchangeably.
pub trait XsltEngine: Send + Sync {
    /// The factory type this engine creates
    type Factory: TransformerFactory + 'static;

    /// Create a new factory. Factories are never shared between transforms.
    fn new_factory(&self, env: &EngineEnvironment) -> Result<Self::Factory>;

    /// Get the name of this engine
    fn engine_name(&self) -> &'static str;

    /// Get the XSLT version supported by this engine
    fn xslt_version(&self) -> &'static str;
}

/// Creates transformers from stylesheets.
pub trait TransformerFactory: Send {
    /// The transformer type this factory creates
    type Transformer: Transformer + 'static;

    /// Compile the stylesheet read from `stylesheet`
    fn new_transformer(&self, stylesheet: &mut StreamSource) -> Result<Self::Transformer>;

    /// Create a transformer that copies the source document unchanged
    fn new_identity_transformer(&self) -> Result<Self::Transformer>;
}

/// A compiled, parameterizable transformation.
pub trait Transformer: Send {
    /// Bind a top-level stylesheet parameter
    fn set_parameter(&mut self, name: &str, value: &str) -> Result<()>;

    /// Override an output serialization property
    fn set_output_property(&mut self, name: &str, value: &str) -> Result<()>;

    /// Current value of an output property, if it is set
    fn output_property(&self, name: &str) -> Option<String>;

    /// Transform `source` and write the serialized result to `result`
    fn transform(&mut self, source: &mut StreamSource, result: &mut StreamResult) -> Result<()>;
}
