//! XSLT 1.0 engine for the transformation bridge
//!
//! Transforms run on xrust. Stylesheets are checked with roxmltree first so
//! global parameters can be bound and `xsl:output` honored; the declaration,
//! doctype and indentation of the result are written here.

pub mod engine;
pub mod output;
pub mod stylesheet;

// Re-export main types
pub use engine::{XrustEngine, XrustFactory, XrustTransformer};
pub use output::{OutputMethod, OutputProperties};
pub use stylesheet::Stylesheet;
