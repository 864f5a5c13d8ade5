//! Error types for SRV record set reconciliation
//!
//! Every failure a reconciliation cycle can surface is a variant of [`Error`].
//! Errors are returned to the immediate caller of the cycle; nothing is retried
//! or swallowed inside the core.

use hickory_proto::op::ResponseCode;
use hickory_proto::rr::RecordType;
use thiserror::Error;

/// Result type alias for srvset operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for srvset
#[derive(Error, Debug)]
pub enum Error {
    /// Desired-state input that cannot be encoded as an SRV record
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// Transport or protocol failure while reading the current RRset
    #[error("Query for {owner} failed: {reason}")]
    QueryFailed {
        /// Owner name that was queried
        owner: String,
        /// Underlying failure
        reason: String,
    },

    /// The server answered the update with a non-success response code
    #[error("Update of {owner} rejected: {code}")]
    UpdateRejected {
        /// Owner name that was updated
        owner: String,
        /// Response code returned by the server
        code: ResponseCode,
    },

    /// The update message could not be delivered
    #[error("Update of {owner} failed: {reason}")]
    UpdateFailed {
        /// Owner name that was updated
        owner: String,
        /// Underlying failure
        reason: String,
    },

    /// A read returned an answer that is not an SRV record
    #[error("Unexpected {record_type} record in answer for {owner}")]
    UnsupportedAnswerType {
        /// Owner name that was queried
        owner: String,
        /// Type of the offending answer record
        record_type: RecordType,
    },

    /// Post-update state differs from the desired state (strict verification only)
    #[error("Record set {owner} diverged after update: expected {expected} record(s), found {found}")]
    Diverged {
        /// Owner name that was verified
        owner: String,
        /// Number of desired records
        expected: usize,
        /// Number of records the server reports
        found: usize,
    },

    /// Invalid owner, zone or target name
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// State store-related errors
    #[error("State store error: {0}")]
    StateStore(String),

    /// Raw failure reported by an exchange transport
    #[error("Exchange error: {0}")]
    Exchange(String),

    /// I/O errors
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a malformed record error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedRecord(msg.into())
    }

    /// Create a query failure for `owner`
    pub fn query_failed(owner: impl Into<String>, reason: impl ToString) -> Self {
        Self::QueryFailed {
            owner: owner.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an update failure for `owner`
    pub fn update_failed(owner: impl Into<String>, reason: impl ToString) -> Self {
        Self::UpdateFailed {
            owner: owner.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid name error
    pub fn invalid_name(msg: impl Into<String>) -> Self {
        Self::InvalidName(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create an exchange error
    pub fn exchange(msg: impl Into<String>) -> Self {
        Self::Exchange(msg.into())
    }

    /// Whether this failure invalidates the caller's notion of the set's identity.
    ///
    /// After a rejected or undelivered update the server state is unknown, so
    /// the owning entity must be treated as not existing until it is read again.
    pub fn resets_identity(&self) -> bool {
        matches!(self, Self::UpdateRejected { .. } | Self::UpdateFailed { .. })
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
