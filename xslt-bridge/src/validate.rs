//! Configuration validation
//!
//! Checks a [`Config`] and classifies each of its inputs into the
//! representation the pipeline will use. Nothing is opened here.

use std::path::PathBuf;

use crate::config::{Config, TypeMarker, Value};
use crate::error::ConfigError;

/// Raw input for a stylesheet or a source document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    File(PathBuf),
    Text(String),
    Buffer(Vec<u8>),
}

/// Where the serialized result goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultTarget {
    File(PathBuf),
    Text,
    Buffer,
}

/// A validated configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// `None` runs the identity transform
    pub stylesheet: Option<Input>,
    pub source: Input,
    pub result: ResultTarget,
}

/// Validate `config`, checking the rules in a fixed order so that the first
/// violated one is reported.
pub fn validate(config: &Config) -> Result<Plan, ConfigError> {
    if config.xslt_path.is_some() && config.xslt.is_some() {
        return Err(ConfigError::XsltConflict);
    }
    if config.source_path.is_some() && config.source.is_some() {
        return Err(ConfigError::SourceConflict);
    }

    let stylesheet = if config.xslt_path.is_some() || config.xslt.is_some() {
        let stylesheet = input(config.xslt_path.as_deref(), config.xslt.as_ref());
        Some(stylesheet.ok_or(ConfigError::UnsupportedXslt)?)
    } else {
        None
    };

    let source = input(config.source_path.as_deref(), config.source.as_ref())
        .ok_or(ConfigError::SourceMissing)?;

    let result = match &config.result {
        Some(Value::Text(path)) => ResultTarget::File(PathBuf::from(path)),
        Some(Value::Type(TypeMarker::String)) => ResultTarget::Text,
        Some(Value::Type(TypeMarker::Buffer)) => ResultTarget::Buffer,
        _ => return Err(ConfigError::ResultMissing),
    };

    Ok(Plan {
        stylesheet,
        source,
        result,
    })
}

/// An empty path is not a usable file input.
fn input(path: Option<&str>, value: Option<&Value>) -> Option<Input> {
    match (path, value) {
        (Some(path), _) if !path.is_empty() => Some(Input::File(PathBuf::from(path))),
        (_, Some(Value::Text(text))) => Some(Input::Text(text.clone())),
        (_, Some(Value::Buffer(bytes))) => Some(Input::Buffer(bytes.clone())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config::new()
            .with_source("<order/>")
            .with_result_type(TypeMarker::String)
    }

    #[test]
    fn conflicts_are_reported_before_anything_else() {
        let config = Config::new()
            .with_xslt_path("a.xsl")
            .with_xslt("<x/>")
            .with_source_path("a.xml")
            .with_source("<a/>");
        assert_eq!(validate(&config), Err(ConfigError::XsltConflict));

        let config = Config::new().with_source_path("a.xml").with_source("<a/>");
        assert_eq!(validate(&config), Err(ConfigError::SourceConflict));
    }

    #[test]
    fn stylesheet_variants() {
        let plan = validate(&base().with_xslt_path("discount.xsl")).unwrap();
        assert_eq!(plan.stylesheet, Some(Input::File("discount.xsl".into())));

        let plan = validate(&base().with_xslt("<xsl:stylesheet/>")).unwrap();
        assert_eq!(plan.stylesheet, Some(Input::Text("<xsl:stylesheet/>".into())));

        let plan = validate(&base().with_xslt(b"<x/>".to_vec())).unwrap();
        assert_eq!(plan.stylesheet, Some(Input::Buffer(b"<x/>".to_vec())));

        assert_eq!(validate(&base()).unwrap().stylesheet, None);
    }

    #[test]
    fn unusable_stylesheet_values_are_rejected() {
        let config = base().with_xslt(TypeMarker::String);
        assert_eq!(validate(&config), Err(ConfigError::UnsupportedXslt));

        let config = base().with_xslt_path("");
        assert_eq!(validate(&config), Err(ConfigError::UnsupportedXslt));
    }

    #[test]
    fn source_is_required() {
        let config = Config::new().with_result_type(TypeMarker::String);
        assert_eq!(validate(&config), Err(ConfigError::SourceMissing));

        let config = Config::new().with_source_path("").with_result_type(TypeMarker::String);
        assert_eq!(validate(&config), Err(ConfigError::SourceMissing));

        let config = Config::new()
            .with_source(Value::Other(serde_json::json!(7)))
            .with_result_type(TypeMarker::String);
        assert_eq!(validate(&config), Err(ConfigError::SourceMissing));
    }

    #[test]
    fn result_variants() {
        let config = Config::new().with_source("<a/>");
        assert_eq!(validate(&config), Err(ConfigError::ResultMissing));

        let plan = validate(&config.clone().with_result_path("out.xml")).unwrap();
        assert_eq!(plan.result, ResultTarget::File("out.xml".into()));

        let plan = validate(&config.clone().with_result_type(TypeMarker::Buffer)).unwrap();
        assert_eq!(plan.result, ResultTarget::Buffer);

        let bytes = config.with_result_type(TypeMarker::String).with_source(b"<a/>".to_vec());
        assert_eq!(validate(&bytes).unwrap().source, Input::Buffer(b"<a/>".to_vec()));
    }

    #[test]
    fn source_rule_precedes_result_rule() {
        assert_eq!(validate(&Config::new()), Err(ConfigError::SourceMissing));
    }
}
