use thiserror::Error;

use crate::cache::CacheError;
use crate::exchange::ExchangeError;

/// Top-level error for a decision or indicator run
///
/// Classification into retryable/fatal is decided where the error is
/// created (see [`ExchangeError`]); callers only ask [`Error::is_retryable`].
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid data for {symbol}: {reason}")]
    InvalidData { symbol: String, reason: String },
}

impl Error {
    pub fn invalid_data(symbol: &str, reason: impl Into<String>) -> Self {
        Error::InvalidData {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the next scheduled cycle is expected to clear this error
    /// without operator involvement
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Exchange(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::NetworkErrorKind;

    #[test]
    fn test_exchange_classification_flows_through() {
        let retryable: Error = ExchangeError::from_api(-1021, "Timestamp for this request is outside of the recvWindow").into();
        assert!(retryable.is_retryable());

        let reset: Error = ExchangeError::Network {
            kind: NetworkErrorKind::ConnectionReset,
            message: "reset by peer".to_string(),
        }
        .into();
        assert!(reset.is_retryable());

        let rejected: Error = ExchangeError::from_api(-2010, "Account has insufficient balance").into();
        assert!(!rejected.is_retryable());
    }

    #[test]
    fn test_non_exchange_errors_are_fatal() {
        assert!(!Error::invalid_data("BTCUSDT", "no symbol info").is_retryable());
        assert!(!Error::Cache(CacheError::Timeout).is_retryable());
    }
}
