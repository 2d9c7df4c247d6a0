use std::path::Path;
use thiserror::Error;

pub type Result<T, E = SlicerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SlicerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("encoder failed ({status}): {diagnostics}")]
    ExternalTool { status: String, diagnostics: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Settings(#[from] storage::StorageError),
    #[error(transparent)]
    Clipboard(#[from] providers::ClipboardError),
}

impl SlicerError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn io_at(action: &str, path: &Path, source: std::io::Error) -> Self {
        Self::io(format!("{action} {}", path.display()), source)
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
