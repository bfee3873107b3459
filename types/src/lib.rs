//! Rules of the honest casino, mirrored off the ledger.
//!
//! Everything here is pure: outcome resolution and bet sizing ([casino]), dividend accounting
//! ([accountant]) and the proposal state machine ([voting]). The ledger stays the source of
//! truth; these functions compute the same results so doomed transactions are never submitted.

pub mod accountant;
pub mod casino;
pub mod errors;
pub mod voting;

pub use errors::{Component, Precondition, Rejection};
pub use ethers_core::types::{Address, H256, U256};
