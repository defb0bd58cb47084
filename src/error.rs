use std::fmt;

/// How a rejected call failed, decided once when the provider error is received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The contract's guard reverted the transaction.
    GuardRejected,
    /// The method is not an external entry point of the contract.
    MethodNotFound,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::GuardRejected => write!(f, "revert"),
            ErrorKind::MethodNotFound => write!(f, "not a function"),
            ErrorKind::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("transaction reverted: {0}")]
    GuardRejected(String),
    #[error("{contract}.methods.{method} is not a function")]
    MethodNotFound { contract: String, method: String },
    #[error("{0}")]
    Other(String),
}

impl LedgerError {
    /// Classifies a raw provider message.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.contains("revert") {
            LedgerError::GuardRejected(message)
        } else if message.contains("is not a function") {
            LedgerError::from_not_a_function(message)
        } else {
            LedgerError::Other(message)
        }
    }

    pub fn method_not_found(contract: &str, method: &str) -> Self {
        LedgerError::MethodNotFound {
            contract: contract.to_string(),
            method: method.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::GuardRejected(_) => ErrorKind::GuardRejected,
            LedgerError::MethodNotFound { .. } => ErrorKind::MethodNotFound,
            LedgerError::Other(_) => ErrorKind::Other,
        }
    }

    /// Whether the failure came from the transport rather than the ledger.
    /// Only deployment retries on these.
    pub fn is_transient(&self) -> bool {
        let LedgerError::Other(message) = self else {
            return false;
        };
        message.contains("408")
            || message.contains("timeout")
            || message.contains("Timeout")
            || message.contains("timed out")
            || message.contains("TransportError")
            || message.contains("connection refused")
            || message.contains("Connection refused")
    }

    // Provider messages look like "Store.methods.foo is not a function"; keep the
    // contract and method when that shape is recognisable.
    fn from_not_a_function(message: String) -> Self {
        let target = message
            .split_whitespace()
            .find(|word| word.contains(".methods."))
            .and_then(|word| word.split_once(".methods."));
        match target {
            Some((contract, method)) => LedgerError::method_not_found(contract, method),
            None => LedgerError::MethodNotFound {
                contract: String::new(),
                method: message,
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("abi error: {0}")]
    Abi(#[from] ethers_core::abi::Error),
    #[error("failed to parse abi: {0}")]
    AbiParse(#[from] ethers_core::abi::ParseError),
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("contract {0} was not deployed")]
    UnknownContract(String),
    #[error("no account at index {0}")]
    MissingAccount(usize),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("{step} succeeded but should have been rejected")]
    UnexpectedSuccess { step: String },
    #[error("{step} was rejected as {actual_kind} instead of {expected}: {actual}")]
    WrongRejection {
        step: String,
        expected: ErrorKind,
        actual_kind: ErrorKind,
        actual: LedgerError,
    },
    #[error("assertion failed: {0}")]
    Assertion(String),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Harness(#[from] HarnessError),
}
