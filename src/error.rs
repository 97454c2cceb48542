use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("database query failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid {field} value {value:?}")]
    Integrity { field: &'static str, value: String },

    #[error("failed to read csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("{path} is missing required column {column}")]
    MissingColumn { path: String, column: &'static str },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("comment summary failed: {0}")]
    Summary(String),
}
