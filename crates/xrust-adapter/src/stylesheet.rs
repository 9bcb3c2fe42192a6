//! Stylesheet preparation and compilation
//!
//! A stylesheet is checked with roxmltree before xrust sees it. The check
//! records the `xsl:output` declaration and the location of each top-level
//! `xsl:param`, so bound parameter values can be written into the text as
//! global variables when the stylesheet is compiled for a run.

use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

use quick_xml::escape::escape;
use url::Url;
use xrust::parser::xml::parse as parse_xml;
use xrust::transform::context::Context;
use xrust::trees::smite::RNode;
use xrust::Node as _;
use xrust::xdmerror::{Error as XrustError, ErrorKind};
use xrust::xslt::from_document;
use xslt_engine_traits::{Error, Result};

use crate::output::OutputProperties;

pub const XSLT_NAMESPACE: &str = "http://www.w3.org/1999/XSL/Transform";

const IDENTITY: &str = concat!(
    r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">"#,
    r#"<xsl:template match="/"><xsl:copy-of select="."/></xsl:template>"#,
    "</xsl:stylesheet>"
);

/// A top-level `xsl:param` and where it sits in the stylesheet text
#[derive(Debug, Clone, PartialEq, Eq)]
struct GlobalParam {
    name: String,
    range: Range<usize>,
    /// Qualified element name as written, e.g. `xsl:param`
    tag: String,
}

/// A well-formed stylesheet ready to be compiled with bound parameters
#[derive(Debug, Clone)]
pub struct Stylesheet {
    text: String,
    base: PathBuf,
    library_paths: Vec<PathBuf>,
    params: Vec<GlobalParam>,
    output: OutputProperties,
}

fn is_xslt(node: roxmltree::Node, name: &str) -> bool {
    node.is_element()
        && node.tag_name().namespace() == Some(XSLT_NAMESPACE)
        && node.tag_name().name() == name
}

impl Stylesheet {
    /// Check `text` and collect its output declaration and global parameters.
    ///
    /// Relative `xsl:include`/`xsl:import` hrefs resolve against `base`
    /// (the current directory when `None`), then by file name against each
    /// of `library_paths`.
    pub fn prepare(text: String, base: Option<&Path>, library_paths: &[PathBuf]) -> Result<Self> {
        let (params, output) = {
            let doc = roxmltree::Document::parse(&text)
                .map_err(|e| Error::xml_parse(e.to_string()))?;
            let root = doc.root_element();
            if !(is_xslt(root, "stylesheet") || is_xslt(root, "transform")) {
                return Err(Error::xslt_compile(format!(
                    "root element '{}' is not xsl:stylesheet or xsl:transform",
                    root.tag_name().name()
                )));
            }

            let mut output = OutputProperties::default();
            for declaration in root.children().filter(|c| is_xslt(*c, "output")) {
                for attr in declaration.attributes() {
                    output.set(attr.name(), attr.value())?;
                }
            }

            let mut params = Vec::new();
            for param in root.children().filter(|c| is_xslt(*c, "param")) {
                let name = param
                    .attribute("name")
                    .ok_or_else(|| Error::xslt_compile("xsl:param requires a name attribute"))?;
                let range = param.range();
                let tag = text[range.start + 1..range.end]
                    .split(|c: char| c.is_whitespace() || c == '/' || c == '>')
                    .next()
                    .unwrap_or_default()
                    .to_string();
                params.push(GlobalParam {
                    name: name.to_string(),
                    range,
                    tag,
                });
            }
            (params, output)
        };

        let base = match base {
            Some(base) => base.to_path_buf(),
            None => std::env::current_dir()?,
        };
        Ok(Self {
            text,
            base,
            library_paths: library_paths.to_vec(),
            params,
            output,
        })
    }

    /// The stylesheet used when none is given: copies the source unchanged
    pub fn identity() -> Result<Self> {
        Self::prepare(IDENTITY.to_string(), None, &[])
    }

    pub fn output(&self) -> &OutputProperties {
        &self.output
    }

    pub fn declares(&self, name: &str) -> bool {
        self.params.iter().any(|p| p.name == name)
    }

    /// Stylesheet text with every global parameter turned into a global
    /// variable; bound parameters take the value from `bindings`.
    pub fn render(&self, bindings: &HashMap<String, String>) -> String {
        let mut out = String::with_capacity(self.text.len());
        let mut last = 0;
        for param in &self.params {
            out.push_str(&self.text[last..param.range.start]);
            let prefix = param.tag.strip_suffix("param").unwrap_or_default();
            let variable = format!("{}variable", prefix);
            match bindings.get(&param.name) {
                Some(value) => {
                    out.push_str(&format!(
                        "<{} name=\"{}\" select=\"{}\"/>",
                        variable,
                        escape(param.name.as_str()),
                        escape(string_literal(value).as_str())
                    ));
                }
                None => {
                    let element = &self.text[param.range.clone()];
                    let renamed = format!("<{}{}", variable, &element[param.tag.len() + 1..]);
                    match renamed.rfind("</").filter(|_| !element.ends_with("/>")) {
                        Some(end) => out.push_str(&format!("{}</{}>", &renamed[..end], variable)),
                        None => out.push_str(&renamed),
                    }
                }
            }
            last = param.range.end;
        }
        out.push_str(&self.text[last..]);
        out
    }

    /// Compile the rendered stylesheet with xrust
    pub fn compile(&self, bindings: &HashMap<String, String>) -> Result<Context<RNode>> {
        let style = parse_document(&self.render(bindings))
            .map_err(|e| Error::xml_parse(e.to_string()))?;
        let base = self
            .base
            .canonicalize()
            .ok()
            .and_then(|dir| Url::from_directory_path(dir).ok());
        let library_paths = self.library_paths.clone();
        from_document(style, base, parse_document, move |url| fetch(url, &library_paths))
            .map_err(|e| Error::xslt_compile(e.to_string()))
    }
}

/// Parse XML text into a fresh xrust document
pub fn parse_document(text: &str) -> std::result::Result<RNode, XrustError> {
    let doc = RNode::new_document();
    parse_xml(doc.clone(), text, None)?;
    Ok(doc)
}

/// Read an included or imported module
fn fetch(url: &Url, library_paths: &[PathBuf]) -> std::result::Result<String, XrustError> {
    let not_found = || {
        XrustError::new(
            ErrorKind::Unknown,
            &format!("stylesheet module not found: {}", url),
        )
    };
    let path = url.to_file_path().map_err(|_| not_found())?;
    if path.is_file() {
        log::debug!("loading stylesheet module {}", path.display());
        return std::fs::read_to_string(&path).map_err(|e| read_error(&path, e));
    }
    let file_name = path.file_name().ok_or_else(not_found)?;
    for library in library_paths {
        let candidate = library.join(file_name);
        if candidate.is_file() {
            log::debug!("loading stylesheet module {}", candidate.display());
            return std::fs::read_to_string(&candidate).map_err(|e| read_error(&candidate, e));
        }
    }
    Err(not_found())
}

fn read_error(path: &Path, e: std::io::Error) -> XrustError {
    XrustError::new(ErrorKind::Unknown, &format!("{}: {}", path.display(), e))
}

/// XPath 1.0 string literal for `value`
fn string_literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{}'", value)
    } else if !value.contains('"') {
        format!("\"{}\"", value)
    } else {
        let parts: Vec<String> = value.split('\'').map(|part| format!("'{}'", part)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}
