use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read source: {0}")]
    SourceIo(#[from] std::io::Error),
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("lex error at byte {position}: {message}")]
    LexError { position: usize, message: String },
    #[error("parse error at byte {position}: {message}")]
    ParseError { position: usize, message: String },
    #[error("bundle error: {0}")]
    BundleError(String),
}

impl CoreError {
    /// Byte offset the error points at, for lex and parse errors.
    pub fn position(&self) -> Option<usize> {
        match self {
            CoreError::LexError { position, .. } | CoreError::ParseError { position, .. } => {
                Some(*position)
            }
            _ => None,
        }
    }

    pub(crate) fn parse(position: usize, message: impl Into<String>) -> Self {
        CoreError::ParseError {
            position,
            message: message.into(),
        }
    }
}
