use thiserror::Error;

/// Fatal errors. Any of these aborts a run before a `RunResult` exists;
/// failing expectations are outcomes, not errors.
#[derive(Debug, Error)]
pub enum MorphTestError {
    #[error("{file}: {message}")]
    CorpusFormat { file: String, message: String },

    #[error("section {requested} does not exist (corpus has {available} sections)")]
    SectionNotFound { requested: usize, available: usize },

    #[error("lookup failed: {0}")]
    LookupEngine(String),
}

impl MorphTestError {
    pub fn corpus(file: impl Into<String>, message: impl Into<String>) -> Self {
        MorphTestError::CorpusFormat {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn lookup(message: impl Into<String>) -> Self {
        MorphTestError::LookupEngine(message.into())
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            MorphTestError::SectionNotFound { .. } => 2,
            MorphTestError::CorpusFormat { .. } | MorphTestError::LookupEngine(_) => 3,
        }
    }
}
