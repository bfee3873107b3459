pub mod accountant;
pub mod casino;
pub mod config;
pub mod connection;
pub mod evm;
pub mod fanout;
pub mod ledger;
pub mod mirror;
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
pub mod retry;
pub mod voting;

pub use accountant::DividendAccountant;
pub use casino::CasinoDesk;
pub use config::{Config, ConfigError, Settings, ValidatedConfig};
pub use connection::Connection;
pub use fanout::{Consumer, EventFanoutBus, Feed, Scope};
pub use ledger::{
    BlockInfo, BlockRange, Call, Ledger, LedgerEvent, Network, Pending, Receipt, Topic,
};
pub use mirror::Mirror;
pub use retry::RetryPolicy;
pub use voting::Governance;

use honest_types::{Precondition, Rejection};
use thiserror::Error;

/// Error type for client operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("precondition failed: {0}")]
    Precondition(#[from] Precondition),
    #[error("rejected by ledger: {0}")]
    Rejected(Rejection),
    #[error("reverted: {0}")]
    Reverted(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("no signing identity configured")]
    NoSigner,
    #[error("unknown proposal {0}")]
    UnknownProposal(u64),
    #[error("no payout period has started")]
    NoPayoutPeriod,
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Whether the failure came from the connection rather than the ledger's rules.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout(_) | Self::ConnectionClosed
        )
    }

    /// The coded ledger rejection, if any.
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::Rejected(rejection) => Some(*rejection),
            _ => None,
        }
    }

    /// Map a revert message to a coded rejection when it carries one.
    pub fn from_revert(message: impl Into<String>) -> Self {
        let message = message.into();
        match Rejection::from_revert(&message) {
            Some(rejection) => Self::Rejected(rejection),
            None => Self::Reverted(message),
        }
    }
}

impl From<Rejection> for Error {
    fn from(rejection: Rejection) -> Self {
        Self::Rejected(rejection)
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
