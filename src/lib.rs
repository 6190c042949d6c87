// Core modules
pub mod cache;
pub mod error;
pub mod exchange;
pub mod indicators;
pub mod ledger;
pub mod lock;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod producer;
pub mod scheduler;
pub mod settings;
pub mod trader;

// Re-export commonly used types
pub use error::Error;
pub use models::*;
pub use pipeline::{Action, Pipeline, Services, SymbolContext, WaitReason};
pub use producer::IndicatorProducer;
pub use trader::{CycleSummary, SymbolOutcome, Trader};

// Error handling
pub type Result<T> = std::result::Result<T, Error>;
