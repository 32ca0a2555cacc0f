use thiserror::Error;

/// Stagefile error types
#[derive(Error, Debug)]
pub enum StagefileError {
    /// Malformed Dockerfile text
    #[error("parsing dockerfile data: line {line}: {message}")]
    Syntax { line: usize, message: String },

    /// Well-formed text that does not describe a valid instruction
    #[error("parsing instructions tree: line {line}: {message}")]
    Instruction { line: usize, message: String },

    /// Requested target stage is not declared
    #[error("determine target stage: {0} is not a valid target build stage")]
    InvalidTarget(String),

    /// Stage references itself or a stage declared after it
    #[error("stage {stage} depends on stage {reference} which is not declared before it")]
    StageCycle { stage: usize, reference: usize },

    /// Numeric stage reference with no corresponding stage
    #[error("stage {stage} references stage {reference} but only {count} stages are declared")]
    StageOutOfRange {
        stage: usize,
        reference: usize,
        count: usize,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Build engine error
    #[error("Build engine error: {0}")]
    Engine(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StagefileError {
    /// Build a [`StagefileError::Syntax`] for the given 1-based line.
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }

    /// Build a [`StagefileError::Instruction`] for the given 1-based line.
    pub fn instruction(line: usize, message: impl Into<String>) -> Self {
        Self::Instruction {
            line,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for StagefileError {
    fn from(err: serde_json::Error) -> Self {
        StagefileError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for StagefileError {
    fn from(err: serde_yaml::Error) -> Self {
        StagefileError::Serialization(err.to_string())
    }
}

/// Result type alias for stagefile operations
pub type Result<T> = std::result::Result<T, StagefileError>;
