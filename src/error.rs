//! NZB toolkit error types

use thiserror::Error;

/// Errors raised while reading, rendering or mirroring NZB documents
///
/// Integrity problems found by [`crate::validation::check`] are not errors;
/// they are reported as data in a [`crate::validation::ValidationReport`].
#[derive(Error, Debug)]
pub enum NzbError {
    /// IO error while reading the input stream or writing output
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unrecoverable tokenizer failure
    #[error("XML error: {0}")]
    Xml(String),

    /// The caller-supplied article transform failed
    #[error("Transform failed: {0}")]
    Transform(String),

    /// A template referenced a placeholder with no value
    #[error("Unknown template placeholder: {{{0}}}")]
    UnknownPlaceholder(String),

    /// A template could not be rendered
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// File name pattern did not compile
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

impl NzbError {
    /// Wrap any displayable failure as a transform error
    pub fn transform(reason: impl std::fmt::Display) -> Self {
        Self::Transform(reason.to_string())
    }
}

impl From<quick_xml::Error> for NzbError {
    fn from(err: quick_xml::Error) -> Self {
        match err {
            quick_xml::Error::Io(io) => {
                NzbError::Io(std::io::Error::new(io.kind(), io.to_string()))
            }
            other => NzbError::Xml(other.to_string()),
        }
    }
}

/// Result type alias using NzbError
pub type Result<T> = std::result::Result<T, NzbError>;
