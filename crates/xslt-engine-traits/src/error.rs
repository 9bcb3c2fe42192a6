//! Error types for transform engine operations

/// Result type for transform engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all transform engine operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// XML parsing failed
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// XSLT compilation failed
    #[error("XSLT compilation error: {0}")]
    XsltCompile(String),

    /// XSLT transformation failed
    #[error("XSLT transformation error: {0}")]
    XsltTransform(String),

    /// Output property name is not recognized
    #[error("Unknown output property: {0}")]
    UnknownOutputProperty(String),

    /// Output property value is not accepted
    #[error("Unsupported value '{value}' for output property '{name}'")]
    InvalidOutputProperty { name: String, value: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A bridging layer reporting a deeper cause
    #[error("{message}")]
    Wrapped {
        message: String,
        #[source]
        cause: Box<Error>,
    },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a new XML parsing error
    pub fn xml_parse<S: Into<String>>(msg: S) -> Self {
        Error::XmlParse(msg.into())
    }

    /// Create a new XSLT compilation error
    pub fn xslt_compile<S: Into<String>>(msg: S) -> Self {
        Error::XsltCompile(msg.into())
    }

    /// Create a new XSLT transformation error
    pub fn xslt_transform<S: Into<String>>(msg: S) -> Self {
        Error::XsltTransform(msg.into())
    }

    /// Wrap `cause` in a bridging error carrying `message`
    pub fn wrap<S: Into<String>>(message: S, cause: Error) -> Self {
        Error::Wrapped {
            message: message.into(),
            cause: Box::new(cause),
        }
    }

    /// The directly wrapped cause, if this is a bridging error
    pub fn cause(&self) -> Option<&Error> {
        match self {
            Error::Wrapped { cause, .. } => Some(cause),
            _ => None,
        }
    }

    /// The innermost engine error, skipping every bridging layer
    pub fn root_cause(&self) -> &Error {
        let mut current = self;
        while let Error::Wrapped { cause, .. } = current {
            current = cause;
        }
        current
    }

    /// Human-readable message of this error alone
    pub fn localized_message(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_cause_skips_all_wrappers() {
        let err = Error::wrap(
            "bridge failure",
            Error::wrap("inner bridge", Error::xslt_compile("bad template")),
        );

        assert_eq!(err.localized_message(), "bridge failure");
        assert!(err.cause().is_some());
        assert_eq!(
            err.root_cause().localized_message(),
            "XSLT compilation error: bad template"
        );
    }

    #[test]
    fn unwrapped_error_is_its_own_root() {
        let err = Error::UnknownOutputProperty("colour".into());
        assert!(err.cause().is_none());
        assert_eq!(err.root_cause().to_string(), "Unknown output property: colour");
    }
}
