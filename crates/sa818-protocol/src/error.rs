//! Error types for SA818 command parsing

use thiserror::Error;

/// Errors that can occur while parsing a command line
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Line does not match any known command grammar
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A parameter matched the grammar's character class but is not a valid number
    #[error("invalid {field}: {value}")]
    InvalidNumber {
        /// Parameter name as it appears in the command table
        field: &'static str,
        /// Raw parameter text
        value: String,
    },

    /// Required parameter is missing or a separator is out of place
    #[error("malformed parameters: {0}")]
    MalformedParameters(String),
}
