use thiserror::Error;

/// The structured error type every fallible conversion returns.
///
/// Mirrors the teacher's `ProviderError` shape: a closed `kind` tag for
/// callers to classify on, a human-readable message, and an optional
/// chained cause.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct ConversionError {
    pub kind: ConversionErrorKind,
    pub message: String,
    #[source]
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConversionErrorKind {
    #[error("parse_error")]
    ParseError,
    #[error("missing_field")]
    MissingField,
    #[error("unsupported")]
    Unsupported,
    #[error("marshal_error")]
    MarshalError,
    #[error("no_choices")]
    NoChoices,
    #[error("stream_parse_error")]
    StreamParseError,
}

impl ConversionError {
    pub fn new(kind: ConversionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(
        kind: ConversionErrorKind,
        message: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(ConversionErrorKind::ParseError, message)
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(
            ConversionErrorKind::MissingField,
            format!("missing required field: {field}"),
        )
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ConversionErrorKind::Unsupported, message)
    }

    pub fn marshal_error(message: impl Into<String>) -> Self {
        Self::new(ConversionErrorKind::MarshalError, message)
    }

    pub fn no_choices(message: impl Into<String>) -> Self {
        Self::new(ConversionErrorKind::NoChoices, message)
    }

    pub fn stream_parse_error(message: impl Into<String>) -> Self {
        Self::new(ConversionErrorKind::StreamParseError, message)
    }

    pub fn from_serde(err: serde_json::Error) -> Self {
        Self::with_cause(ConversionErrorKind::ParseError, "invalid JSON", err)
    }
}

impl From<serde_json::Error> for ConversionError {
    fn from(err: serde_json::Error) -> Self {
        ConversionError::from_serde(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_message() {
        let err = ConversionError::missing_field("model");
        assert_eq!(err.to_string(), "missing_field: missing required field: model");
    }

    #[test]
    fn from_serde_preserves_source() {
        let parsed: Result<serde_json::Value, _> = serde_json::from_str("not json");
        let err = ConversionError::from(parsed.unwrap_err());
        assert_eq!(err.kind, ConversionErrorKind::ParseError);
        assert!(std::error::Error::source(&err).is_some());
    }
}
