use thiserror::Error;

#[derive(Error, Debug)]
pub enum GridscopeError {
    #[error("invalid date: {0}")]
    InvalidDate(#[from] chrono::ParseError),

    #[error("invalid date range: {0}")]
    InvalidRange(String),

    #[error("unknown {kind}: {value}")]
    UnknownName { kind: &'static str, value: String },

    #[error("{0}")]
    Other(String),
}
