//! xslt-transform: run one XSLT transformation from the command line

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use xslt_bridge::{add_library, add_options, transform_sync, Config, Output, TypeMarker};

#[derive(Parser, Debug)]
#[command(name = "xslt-transform")]
#[command(author, version, about = "Apply an XSLT 1.0 stylesheet to an XML document")]
struct Args {
    /// Stylesheet file; without one the document is copied unchanged
    #[arg(long)]
    xslt: Option<PathBuf>,

    /// Source document
    #[arg(long)]
    source: Option<PathBuf>,

    /// Result file (default: standard output)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Stylesheet parameter as name=value
    #[arg(long = "param", value_parser = parse_pair)]
    params: Vec<(String, String)>,

    /// Output property as name=value
    #[arg(long = "prop", value_parser = parse_pair)]
    props: Vec<(String, String)>,

    /// Directory searched for included and imported stylesheets
    #[arg(long = "library")]
    libraries: Vec<PathBuf>,

    /// Engine startup option, passed through to the engine unchanged
    #[arg(long = "option")]
    options: Vec<String>,

    /// JSON job file; command line flags take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn parse_pair(text: &str) -> std::result::Result<(String, String), String> {
    match text.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected name=value, got '{}'", text)),
    }
}

fn build_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read job file {}", path.display()))?;
            Config::from_json(&text)
                .with_context(|| format!("Invalid job file {}", path.display()))?
        }
        None => Config::new(),
    };

    if let Some(xslt) = &args.xslt {
        config.xslt = None;
        config = config.with_xslt_path(xslt);
    }
    if let Some(source) = &args.source {
        config.source = None;
        config = config.with_source_path(source);
    }
    match &args.output {
        Some(output) => config = config.with_result_path(output),
        None if config.result.is_none() => config = config.with_result_type(TypeMarker::Buffer),
        None => {}
    }
    for (name, value) in &args.params {
        config = config.with_param(name.as_str(), value.as_str());
    }
    for (name, value) in &args.props {
        config = config.with_prop(name.as_str(), value.as_str());
    }
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    for library in &args.libraries {
        add_library(library);
    }
    add_options(args.options.iter().cloned());

    let config = build_config(&args)?;
    log::debug!("running transform: {:?}", config);

    let output = match transform_sync(&config) {
        Ok(output) => output,
        Err(e) => bail!("Transformation failed: {}", e),
    };

    let mut stdout = std::io::stdout().lock();
    match output {
        Output::Written => {}
        Output::Text(text) => stdout.write_all(text.as_bytes())?,
        Output::Buffer(bytes) => stdout.write_all(&bytes)?,
    }
    stdout.flush().context("Failed to write the result")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_split_on_the_first_equals_sign() {
        assert_eq!(parse_pair("discount=a=b"), Ok(("discount".into(), "a=b".into())));
        assert!(parse_pair("discount").is_err());
        assert!(parse_pair("=x").is_err());
    }

    #[test]
    fn flags_override_the_job_file() {
        let dir = tempfile::tempdir().unwrap();
        let job = dir.path().join("job.json");
        let text = r#"{"xslt": "<x/>", "source": "<a/>", "params": {"discount": "none"}}"#;
        fs::write(&job, text).unwrap();

        let args = Args::parse_from([
            "xslt-transform",
            "--config",
            job.to_str().unwrap(),
            "--xslt",
            "discount.xsl",
            "--param",
            "discount=1972/01/01",
        ]);
        let config = build_config(&args).unwrap();
        assert_eq!(config.xslt, None);
        assert_eq!(config.xslt_path.as_deref(), Some("discount.xsl"));
        assert_eq!(config.source, Some("<a/>".into()));
        assert_eq!(config.result, Some(TypeMarker::Buffer.into()));
        assert_eq!(config.params.unwrap()["discount"], "1972/01/01");
    }
}
