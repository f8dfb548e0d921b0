//! Error types shared by the store, the session layer and the web handlers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Gear list not found: {0}")]
    NotFound(String),

    #[error("Invalid gear list name: {0}")]
    InvalidName(String),

    #[error("Parse error on line {line}: {message}")]
    Parse { line: u64, message: String },

    #[error("{0} was changed on disk since it was opened; reload before saving")]
    Conflict(String),

    #[error("Editing requires the password")]
    Unauthorized,

    #[error("Category error: {0}")]
    Category(String),

    #[error("Row {index} does not exist in category {category}")]
    RowOutOfRange { category: String, index: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl StoreError {
    pub fn parse(line: u64, message: impl Into<String>) -> Self {
        StoreError::Parse {
            line,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
