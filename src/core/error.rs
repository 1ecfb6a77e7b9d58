//! Error type shared by every price source.

use thiserror::Error;

/// Errors that abort a price retrieval.
///
/// There is no partial-success mode: any of these ends the in-flight
/// `prices` call and nothing that was accumulated so far is returned.
#[derive(Error, Debug)]
pub enum PriceError {
    /// A caller supplied date is not a valid `YYYY-MM-DD` date, or the range is inverted.
    #[error("Invalid date input '{value}': {reason}")]
    InvalidDateInput { value: String, reason: String },

    /// The symbol is not listed in the provider's catalog.
    #[error("Unknown commodity: {0}")]
    UnknownCommodity(String),

    /// A configured base URL does not form a valid request URL.
    #[error("Invalid request URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// Transport failure, timeout or non-success HTTP status.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body is not the XML document we expected.
    #[error("Failed to decode {document}: {message}")]
    Decode {
        document: &'static str,
        message: String,
    },

    /// A value inside an otherwise well-formed row could not be parsed.
    #[error("Failed to parse {field} '{value}': {message}")]
    FieldParse {
        field: &'static str,
        value: String,
        message: String,
    },
}

impl PriceError {
    pub(crate) fn decode(document: &'static str, message: impl ToString) -> Self {
        Self::Decode {
            document,
            message: message.to_string(),
        }
    }

    pub(crate) fn field(field: &'static str, value: &str, message: impl ToString) -> Self {
        Self::FieldParse {
            field,
            value: value.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PriceError>;
