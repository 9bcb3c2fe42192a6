//! xslt-bridge: configuration-driven XSLT transformations
//!
//! A transform is described by a [`Config`]: a stylesheet (optional; the
//! identity transform is used without one), a source document and a result
//! target, each given as a file path, a string or a byte buffer, plus
//! stylesheet parameters and output properties.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use xslt_bridge::{transform_sync, Config, TypeMarker};
//!
//! let config = Config::new()
//!     .with_xslt_path("discount.xsl")
//!     .with_source_path("order.xml")
//!     .with_result_type(TypeMarker::String)
//!     .with_param("discount", "1972/01/01");
//! let output = transform_sync(&config)?;
//! println!("{}", output.as_text().unwrap_or_default());
//! ```
//!
//! The same call is available as a future ([`transform_async`]) and with a
//! completion callback ([`transform`]).

pub mod config;
pub mod error;
pub mod graph;
pub mod pipeline;
pub mod resource;
pub mod setup;
pub mod validate;

use std::sync::Arc;

use xrust_adapter::XrustEngine;
use xslt_engine_traits::XsltEngine;

// Re-export core types
pub use config::{Config, TypeMarker, Value};
pub use error::{ConfigError, Error, Result};
pub use pipeline::{Output, Step};
pub use resource::{ResourceProvider, StdResources};
pub use setup::{add_library, add_options};

use crate::graph::{run_concurrent, run_sequential};
use crate::pipeline::Pipeline;
use crate::validate::validate;

/// Runs transforms with one engine and one set of resource adapters.
///
/// Each call builds its own factory, transformer, sources and sink; nothing
/// is shared between calls except the setup lists.
pub struct XsltBridge<E = XrustEngine, R = StdResources> {
    engine: Arc<E>,
    resources: Arc<R>,
}

impl<E, R> Clone for XsltBridge<E, R> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            resources: Arc::clone(&self.resources),
        }
    }
}

impl Default for XsltBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl XsltBridge {
    pub fn new() -> Self {
        Self::with_parts(XrustEngine::new(), StdResources)
    }
}

impl<E, R> XsltBridge<E, R>
where
    E: XsltEngine + 'static,
    R: ResourceProvider + 'static,
{
    pub fn with_parts(engine: E, resources: R) -> Self {
        Self {
            engine: Arc::new(engine),
            resources: Arc::new(resources),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn pipeline(&self, config: &Config) -> Result<Pipeline<E, R>> {
        let plan = validate(config)?;
        Ok(Pipeline::new(
            Arc::clone(&self.engine),
            Arc::clone(&self.resources),
            setup::environment(),
            plan,
            config.param_values(),
            config.prop_values(),
        ))
    }

    /// Run a transform on the calling thread, one step after another.
    pub fn transform_sync(&self, config: &Config) -> Result<Output> {
        let pipeline = self.pipeline(config)?;
        let graph = pipeline.graph();
        let outcome = run_sequential(&graph, |step| pipeline.run_step(step));
        pipeline.finish(outcome)
    }

    /// Run a transform with independent steps running concurrently on the
    /// blocking pool of the current Tokio runtime.
    pub async fn transform_async(&self, config: &Config) -> Result<Output> {
        let pipeline = Arc::new(self.pipeline(config)?);
        let graph = pipeline.graph();
        let outcome = run_concurrent(&graph, |step| {
            let pipeline = Arc::clone(&pipeline);
            async move {
                match tokio::task::spawn_blocking(move || pipeline.run_step(step)).await {
                    Ok(outcome) => outcome,
                    Err(e) => Err(Error::Runtime(format!(
                        "step '{}' did not complete: {}",
                        step, e
                    ))),
                }
            }
        })
        .await;

        // Closing a file sink flushes it, so cleanup blocks like the steps do
        let cleanup = Arc::clone(&pipeline);
        match tokio::task::spawn_blocking(move || cleanup.finish(outcome)).await {
            Ok(output) => output,
            Err(e) => Err(Error::Runtime(format!("cleanup did not complete: {}", e))),
        }
    }

    /// Start a transform and hand its outcome to `callback`.
    ///
    /// The callback is required: errors are never dropped silently. Without
    /// a running Tokio runtime the callback receives the error immediately
    /// and `None` is returned.
    pub fn transform<F>(&self, config: Config, callback: F) -> Option<tokio::task::JoinHandle<()>>
    where
        F: FnOnce(Result<Output>) + Send + 'static,
    {
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let bridge = self.clone();
                Some(runtime.spawn(async move {
                    let outcome = bridge.transform_async(&config).await;
                    callback(outcome);
                }))
            }
            Err(e) => {
                callback(Err(Error::Runtime(format!("transform needs a Tokio runtime: {}", e))));
                None
            }
        }
    }
}

/// [`XsltBridge::transform_sync`] with the default engine
pub fn transform_sync(config: &Config) -> Result<Output> {
    XsltBridge::new().transform_sync(config)
}

/// [`XsltBridge::transform_async`] with the default engine
pub async fn transform_async(config: &Config) -> Result<Output> {
    XsltBridge::new().transform_async(config).await
}

/// [`XsltBridge::transform`] with the default engine
pub fn transform<F>(config: Config, callback: F) -> Option<tokio::task::JoinHandle<()>>
where
    F: FnOnce(Result<Output>) + Send + 'static,
{
    XsltBridge::new().transform(config, callback)
}
