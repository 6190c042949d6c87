use std::error::Error as StdError;
use std::fmt;
use std::io;

use serde::Deserialize;
use thiserror::Error;

/// Binance: internal error / disconnected, retry later
pub const CODE_DISCONNECTED: i64 = -1001;
/// Binance: too many requests
pub const CODE_TOO_MANY_REQUESTS: i64 = -1003;
/// Binance: timestamp outside of recvWindow
pub const CODE_INVALID_TIMESTAMP: i64 = -1021;
/// Binance: order does not exist
pub const CODE_NO_SUCH_ORDER: i64 = -2013;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    ConnectionReset,
    ConnectionRefused,
    Timeout,
    Other,
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NetworkErrorKind::ConnectionReset => "ECONNRESET",
            NetworkErrorKind::ConnectionRefused => "ECONNREFUSED",
            NetworkErrorKind::Timeout => "ETIMEDOUT",
            NetworkErrorKind::Other => "network",
        };
        write!(f, "{}", name)
    }
}

/// Failure of an exchange call, classified where it is produced
#[derive(Debug, Clone, Error)]
pub enum ExchangeError {
    #[error("rate limited ({code}): {message}")]
    RateLimited { code: i64, message: String },

    #[error("request timestamp rejected ({code}): {message}")]
    TimestampSkew { code: i64, message: String },

    #[error("exchange disconnected ({code}): {message}")]
    Disconnected { code: i64, message: String },

    #[error("exchange rejected request ({code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("{kind}: {message}")]
    Network {
        kind: NetworkErrorKind,
        message: String,
    },

    #[error("failed to decode exchange response: {0}")]
    Decode(String),
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

impl ExchangeError {
    /// Classify an exchange error code
    pub fn from_api(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            CODE_TOO_MANY_REQUESTS => ExchangeError::RateLimited { code, message },
            CODE_INVALID_TIMESTAMP => ExchangeError::TimestampSkew { code, message },
            CODE_DISCONNECTED => ExchangeError::Disconnected { code, message },
            _ => ExchangeError::Rejected { code, message },
        }
    }

    /// Classify a non-success HTTP response
    pub fn from_response(status: u16, body: &str) -> Self {
        if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
            return Self::from_api(parsed.code, parsed.msg);
        }

        // 429 = request weight exceeded, 418 = IP auto-banned after repeated 429s
        if status == 429 || status == 418 {
            return ExchangeError::RateLimited {
                code: CODE_TOO_MANY_REQUESTS,
                message: body.to_string(),
            };
        }

        ExchangeError::Http {
            status,
            body: body.to_string(),
        }
    }

    /// Classify a transport failure by walking its source chain for the
    /// underlying I/O error
    pub fn from_transport(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            NetworkErrorKind::Timeout
        } else {
            io_kind(err).unwrap_or(NetworkErrorKind::Other)
        };

        ExchangeError::Network {
            kind,
            message: err.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ExchangeError::RateLimited { .. }
            | ExchangeError::TimestampSkew { .. }
            | ExchangeError::Disconnected { .. } => true,
            ExchangeError::Network { kind, .. } => matches!(
                kind,
                NetworkErrorKind::ConnectionReset | NetworkErrorKind::ConnectionRefused
            ),
            _ => false,
        }
    }

    /// The exchange has no record of the requested order
    pub fn is_unknown_order(&self) -> bool {
        self.code() == Some(CODE_NO_SUCH_ORDER)
    }

    /// Exchange error code, when the exchange supplied one
    pub fn code(&self) -> Option<i64> {
        match self {
            ExchangeError::RateLimited { code, .. }
            | ExchangeError::TimestampSkew { code, .. }
            | ExchangeError::Disconnected { code, .. }
            | ExchangeError::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }
}

fn io_kind(err: &(dyn StdError + 'static)) -> Option<NetworkErrorKind> {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(current) = source {
        if let Some(io_err) = current.downcast_ref::<io::Error>() {
            return match io_err.kind() {
                io::ErrorKind::ConnectionReset => Some(NetworkErrorKind::ConnectionReset),
                io::ErrorKind::ConnectionRefused => Some(NetworkErrorKind::ConnectionRefused),
                io::ErrorKind::TimedOut => Some(NetworkErrorKind::Timeout),
                _ => Some(NetworkErrorKind::Other),
            };
        }
        source = current.source();
    }
    None
}
