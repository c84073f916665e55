
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphselError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Parse error: {message}")]
    Parse { message: String, line: Option<usize>, col: Option<usize> },
    #[error("Unknown field: {0}")]
    UnknownField(String),
    #[error("Remote query error: {0}")]
    Remote(String),
    #[error("Join path error: {0}")]
    JoinPath(String),
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, GraphselError>;

// Helper conversions
impl From<config::ConfigError> for GraphselError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
