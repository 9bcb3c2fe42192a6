//! Output properties and the final serialization pass

use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use xslt_engine_traits::{Error, Result};

/// Serialization method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMethod {
    Xml,
    Html,
    Text,
}

impl OutputMethod {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "xml" => Some(OutputMethod::Xml),
            "html" => Some(OutputMethod::Html),
            "text" => Some(OutputMethod::Text),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            OutputMethod::Xml => "xml",
            OutputMethod::Html => "html",
            OutputMethod::Text => "text",
        }
    }
}

/// Properties controlling how the result document is written.
///
/// They start from the stylesheet's `xsl:output` declaration and can be
/// overridden per transformer. `media-type` and `cdata-section-elements`
/// are kept for [`OutputProperties::get`] only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputProperties {
    /// `None` picks html when the root element is `html`, xml otherwise
    pub method: Option<OutputMethod>,
    pub version: Option<String>,
    pub encoding: Option<String>,
    pub omit_xml_declaration: bool,
    pub standalone: Option<bool>,
    pub indent: bool,
    pub media_type: Option<String>,
    pub doctype_public: Option<String>,
    pub doctype_system: Option<String>,
    pub cdata_section_elements: Vec<String>,
}

impl OutputProperties {
    /// Set a property by its `xsl:output` attribute name.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        let invalid = || Error::InvalidOutputProperty {
            name: name.to_string(),
            value: value.to_string(),
        };
        match name {
            "method" => self.method = Some(OutputMethod::parse(value).ok_or_else(invalid)?),
            "version" => self.version = Some(value.to_string()),
            "encoding" => {
                if !value.eq_ignore_ascii_case("UTF-8") && !value.eq_ignore_ascii_case("UTF8") {
                    return Err(invalid());
                }
                self.encoding = Some(value.to_string());
            }
            "omit-xml-declaration" => {
                self.omit_xml_declaration = yes_no(value).ok_or_else(invalid)?
            }
            "standalone" => self.standalone = Some(yes_no(value).ok_or_else(invalid)?),
            "indent" => self.indent = yes_no(value).ok_or_else(invalid)?,
            "media-type" => self.media_type = Some(value.to_string()),
            "doctype-public" => self.doctype_public = Some(value.to_string()),
            "doctype-system" => self.doctype_system = Some(value.to_string()),
            "cdata-section-elements" => {
                self.cdata_section_elements
                    .extend(value.split_whitespace().map(str::to_string));
            }
            _ => return Err(Error::UnknownOutputProperty(name.to_string())),
        }
        Ok(())
    }

    /// Current value of a property by name
    pub fn get(&self, name: &str) -> Option<String> {
        let flag = |b: bool| if b { "yes" } else { "no" }.to_string();
        match name {
            "method" => self.method.map(|m| m.as_str().to_string()),
            "version" => self.version.clone(),
            "encoding" => self.encoding.clone(),
            "omit-xml-declaration" => Some(flag(self.omit_xml_declaration)),
            "standalone" => self.standalone.map(flag),
            "indent" => Some(flag(self.indent)),
            "media-type" => self.media_type.clone(),
            "doctype-public" => self.doctype_public.clone(),
            "doctype-system" => self.doctype_system.clone(),
            "cdata-section-elements" if !self.cdata_section_elements.is_empty() => {
                Some(self.cdata_section_elements.join(" "))
            }
            _ => None,
        }
    }

    fn resolved_method(&self, root: Option<&str>) -> OutputMethod {
        match (self.method, root) {
            (Some(method), _) => method,
            (None, Some(root)) if root.eq_ignore_ascii_case("html") => OutputMethod::Html,
            _ => OutputMethod::Xml,
        }
    }
}

fn yes_no(value: &str) -> Option<bool> {
    match value {
        "yes" => Some(true),
        "no" => Some(false),
        _ => None,
    }
}

/// Name of the first element in serialized markup
fn root_name(markup: &str) -> Option<&str> {
    let mut rest = markup;
    while let Some(start) = rest.find('<') {
        rest = &rest[start + 1..];
        if rest.starts_with(|c: char| matches!(c, '?' | '!' | '/')) {
            continue;
        }
        let end = rest
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .unwrap_or(rest.len());
        return Some(&rest[..end]);
    }
    None
}

/// Produce the final bytes for a result document.
///
/// `markup` is the document serialized as XML, `text` its string value.
pub fn serialize(markup: &str, text: &str, props: &OutputProperties) -> Result<Vec<u8>> {
    let root = root_name(markup);
    let method = props.resolved_method(root);
    log::debug!("serializing result document with method {}", method.as_str());

    if method == OutputMethod::Text {
        return Ok(text.as_bytes().to_vec());
    }

    let mut out = String::new();
    if method == OutputMethod::Xml && !props.omit_xml_declaration {
        out.push_str(&format!(
            "<?xml version=\"{}\" encoding=\"UTF-8\"",
            props.version.as_deref().unwrap_or("1.0")
        ));
        if let Some(standalone) = props.standalone {
            out.push_str(if standalone {
                " standalone=\"yes\""
            } else {
                " standalone=\"no\""
            });
        }
        out.push_str("?>");
    }
    if let Some(root) = root {
        match (&props.doctype_public, &props.doctype_system) {
            (Some(public), Some(system)) => {
                out.push_str(&format!("<!DOCTYPE {} PUBLIC \"{}\" \"{}\">", root, public, system))
            }
            (None, Some(system)) => {
                out.push_str(&format!("<!DOCTYPE {} SYSTEM \"{}\">", root, system))
            }
            (Some(public), None) if method == OutputMethod::Html => {
                out.push_str(&format!("<!DOCTYPE {} PUBLIC \"{}\">", root, public))
            }
            _ => {}
        }
    }

    let mut bytes = out.into_bytes();
    if props.indent {
        bytes.extend(indent(markup)?);
    } else {
        bytes.extend_from_slice(markup.as_bytes());
    }
    Ok(bytes)
}

/// Re-emit `markup` with one element per line
fn indent(markup: &str) -> Result<Vec<u8>> {
    let mut reader = Reader::from_str(markup);
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Text(text)) if text.iter().all(u8::is_ascii_whitespace) => {}
            Ok(event) => writer.write_event(event)?,
            Err(e) => {
                return Err(Error::Other(format!("result document is not well-formed: {}", e)))
            }
        }
    }
    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER: &str = "<order><total>36.9</total>15% discount &amp; more</order>";

    fn render(props: &OutputProperties) -> String {
        String::from_utf8(serialize(ORDER, "36.915% discount & more", props).unwrap()).unwrap()
    }

    #[test]
    fn xml_output_starts_with_the_declaration() {
        assert_eq!(
            render(&OutputProperties::default()),
            format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>{}", ORDER)
        );
    }

    #[test]
    fn omit_declaration_and_text_method() {
        let mut props = OutputProperties::default();
        props.set("omit-xml-declaration", "yes").unwrap();
        assert_eq!(render(&props), ORDER);

        props.set("method", "text").unwrap();
        assert_eq!(render(&props), "36.915% discount & more");
    }

    #[test]
    fn html_root_drops_the_declaration() {
        let out = serialize("<html><p>x</p></html>", "x", &OutputProperties::default()).unwrap();
        assert_eq!(out, b"<html><p>x</p></html>");
    }

    #[test]
    fn doctype_names_the_root_element() {
        let mut props = OutputProperties::default();
        props.set("doctype-system", "order.dtd").unwrap();
        props.set("omit-xml-declaration", "yes").unwrap();
        assert_eq!(
            render(&props),
            format!("<!DOCTYPE order SYSTEM \"order.dtd\">{}", ORDER)
        );
    }

    #[test]
    fn indent_puts_elements_on_their_own_lines() {
        let mut props = OutputProperties::default();
        props.set("indent", "yes").unwrap();
        props.set("omit-xml-declaration", "yes").unwrap();
        let out = String::from_utf8(serialize("<a><b/><c/></a>", "", &props).unwrap()).unwrap();
        assert_eq!(out.lines().count(), 4);
        assert!(out.lines().any(|line| line == "  <b/>"));
    }

    #[test]
    fn property_names_and_values_are_checked() {
        let mut props = OutputProperties::default();
        assert!(matches!(
            props.set("colour", "red"),
            Err(Error::UnknownOutputProperty(name)) if name == "colour"
        ));
        assert!(matches!(
            props.set("indent", "maybe"),
            Err(Error::InvalidOutputProperty { .. })
        ));
        assert!(props.set("encoding", "ISO-8859-1").is_err());

        props.set("indent", "yes").unwrap();
        props.set("method", "xml").unwrap();
        assert_eq!(props.get("indent").as_deref(), Some("yes"));
        assert_eq!(props.get("method").as_deref(), Some("xml"));
        assert_eq!(props.get("media-type"), None);
    }
}
