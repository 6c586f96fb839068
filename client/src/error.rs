//! Error types for the governance client.
//!
//! Every failure is surfaced as a [`DaoClientError`]; nothing is converted into a
//! sentinel value. The variants fall into three families: transport and contract
//! failures, correlation failures, and user input errors caught before submission.

use thiserror::Error;

/// Main error type for governance client operations
#[derive(Error, Debug)]
pub enum DaoClientError {
    /// JSON-RPC endpoint returned an error
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Network communication error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A contract call was executed but failed
    #[error("Contract execution failed in {method}: {message}")]
    ContractExecution {
        /// Contract method that failed
        method: String,
        /// Failure reported by the runtime
        message: String,
    },

    /// Invalid response from the endpoint
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded, retry after {0} seconds")]
    RateLimitExceeded(u64),

    /// Max retries exceeded
    #[error("Max retries ({0}) exceeded")]
    MaxRetriesExceeded(usize),

    /// The proposal page starting at `from_index` came back empty
    #[error("No proposals returned from index {from_index}")]
    EmptyWindow {
        /// First index of the requested page
        from_index: u64,
    },

    /// Proposals were returned but none matched the correlation key
    #[error("No in-progress {kind} proposal matched in {scanned} scanned proposals")]
    NotFound {
        /// Expected proposal kind
        kind: String,
        /// Number of proposals inspected
        scanned: usize,
    },

    /// More than one proposal matched the correlation key
    #[error("Ambiguous match, candidate proposals: {ids:?}")]
    AmbiguousMatch {
        /// IDs of all matching proposals in scan order
        ids: Vec<u64>,
    },

    /// The adaptive scan hit its page limit without a match
    #[error("Scan window exhausted after {pages} pages from index {from_index}")]
    WindowExhausted {
        /// First scanned index
        from_index: u64,
        /// Number of pages fetched
        pages: usize,
    },

    /// Correlation did not succeed before the deadline
    #[error("Correlation timed out after {0} seconds")]
    CorrelationTimeout(u64),

    /// No correlation key is stored in the session
    #[error("No pending correlation in session")]
    NoPendingCorrelation,

    /// Input rejected before submission
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Session store failure
    #[error("Session store error: {0}")]
    Session(String),

    /// Base64 decode error
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// URL parse error
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl DaoClientError {
    /// Whether this is a correlation failure that may clear up once the
    /// submitted proposal becomes visible.
    pub fn is_pending_correlation(&self) -> bool {
        matches!(
            self,
            DaoClientError::EmptyWindow { .. }
                | DaoClientError::NotFound { .. }
                | DaoClientError::WindowExhausted { .. }
        )
    }
}

impl From<std::io::Error> for DaoClientError {
    fn from(err: std::io::Error) -> Self {
        DaoClientError::Session(err.to_string())
    }
}

/// Result type alias for governance client operations
pub type Result<T> = std::result::Result<T, DaoClientError>;

/// Error context for retryable operations
#[derive(Debug, Clone, Default)]
pub struct RetryContext {
    /// Number of attempts made
    pub attempts: usize,
    /// Last error encountered
    pub last_error: String,
    /// Total time spent waiting between attempts (in milliseconds)
    pub total_time_ms: u64,
}

impl RetryContext {
    /// Create a new retry context
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an attempt
    pub fn record_attempt(&mut self, error: &str, duration_ms: u64) {
        self.attempts += 1;
        self.last_error = error.to_string();
        self.total_time_ms += duration_ms;
    }
}
