//! XsltEngine implementation backed by xrust

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use xrust::item::Item as XrustItem;
use xrust::item::Node;
use xrust::transform::context::StaticContextBuilder;
use xrust::trees::smite::RNode;
use xrust::xdmerror::{Error as XrustError, ErrorKind};
use xslt_engine_traits::{
    EngineEnvironment, Error, Result, StreamResult, StreamSource, Transformer, TransformerFactory,
    XsltEngine,
};

use crate::output::{serialize, OutputProperties};
use crate::stylesheet::{parse_document, Stylesheet};

/// XSLT 1.0 engine
#[derive(Debug, Clone, Copy, Default)]
pub struct XrustEngine;

impl XrustEngine {
    pub fn new() -> Self {
        Self
    }
}

impl XsltEngine for XrustEngine {
    type Factory = XrustFactory;

    fn new_factory(&self, env: &EngineEnvironment) -> Result<XrustFactory> {
        for option in &env.options {
            log::warn!("xrust takes no startup options; ignoring '{}'", option);
        }
        Ok(XrustFactory {
            library_paths: env.library_paths.clone(),
        })
    }

    fn engine_name(&self) -> &'static str {
        "xrust"
    }

    fn xslt_version(&self) -> &'static str {
        "1.0"
    }
}

/// Checks stylesheets and creates [`XrustTransformer`]s
#[derive(Debug, Clone)]
pub struct XrustFactory {
    library_paths: Vec<PathBuf>,
}

impl XrustFactory {
    pub fn library_paths(&self) -> &[PathBuf] {
        &self.library_paths
    }
}

impl TransformerFactory for XrustFactory {
    type Transformer = XrustTransformer;

    fn new_transformer(&self, stylesheet: &mut StreamSource) -> Result<XrustTransformer> {
        let text = stylesheet.read_to_string()?;
        let base = stylesheet.system_id().and_then(Path::parent).map(Path::to_path_buf);
        let prepared = Stylesheet::prepare(text, base.as_deref(), &self.library_paths)?;
        // xrust trees are not Send: compile here only to report errors early
        prepared.compile(&HashMap::new())?;
        Ok(XrustTransformer::new(prepared))
    }

    fn new_identity_transformer(&self) -> Result<XrustTransformer> {
        Ok(XrustTransformer::new(Stylesheet::identity()?))
    }
}

/// A checked stylesheet with its parameters and output settings
#[derive(Debug, Clone)]
pub struct XrustTransformer {
    stylesheet: Arc<Stylesheet>,
    parameters: HashMap<String, String>,
    output: OutputProperties,
}

impl XrustTransformer {
    fn new(stylesheet: Stylesheet) -> Self {
        let output = stylesheet.output().clone();
        Self {
            stylesheet: Arc::new(stylesheet),
            parameters: HashMap::new(),
            output,
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// Run the stylesheet over `source`, returning the result as markup and
    /// as its string value
    fn run(&self, source: RNode) -> Result<(String, String)> {
        let mut context = self.stylesheet.compile(&self.parameters)?;
        context.context(vec![XrustItem::Node(source)], 0);
        let result = RNode::new_document();
        context.result_document(result.clone());

        let mut static_context = StaticContextBuilder::new()
            .message(|message| {
                log::info!("xsl:message: {}", message);
                Ok(())
            })
            .fetcher(|_| Err(XrustError::new(ErrorKind::NotImplemented, "not implemented")))
            .parser(|_| Err(XrustError::new(ErrorKind::NotImplemented, "not implemented")))
            .build();
        context
            .evaluate(&mut static_context)
            .map_err(|e| Error::xslt_transform(e.to_string()))?;

        Ok((result.to_xml(), result.to_string()))
    }
}

impl Transformer for XrustTransformer {
    fn set_parameter(&mut self, name: &str, value: &str) -> Result<()> {
        if !self.stylesheet.declares(name) {
            log::debug!("parameter '{}' is not declared by the stylesheet", name);
        }
        self.parameters.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn set_output_property(&mut self, name: &str, value: &str) -> Result<()> {
        self.output.set(name, value)
    }

    fn output_property(&self, name: &str) -> Option<String> {
        self.output.get(name)
    }

    fn transform(&mut self, source: &mut StreamSource, result: &mut StreamResult) -> Result<()> {
        let text = source.read_to_string()?;
        let document = parse_document(&text).map_err(|e| match source.system_id() {
            Some(path) => Error::xml_parse(format!("{}: {}", path.display(), e)),
            None => Error::xml_parse(e.to_string()),
        })?;

        let (markup, string_value) = self.run(document)?;
        let bytes = serialize(&markup, &string_value, &self.output)?;
        let writer = result.writer();
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }
}
