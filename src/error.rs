// Typed errors raised by the brokerage client

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {path} failed with status {status}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    #[error("response from {path} is missing field `{field}`")]
    MissingField { path: String, field: &'static str },

    #[error("could not parse `{value}` from field `{field}` as a number")]
    InvalidNumber { field: &'static str, value: String },

    #[error("order quantity must be positive (got {0})")]
    InvalidQuantity(u64),

    #[error("no session: authenticate before calling {0}")]
    NotAuthenticated(&'static str),
}
