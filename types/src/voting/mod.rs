//! Governance rules.
//!
//! Proposals move from [ProposalState::Open] to [ProposalState::ClosedPendingExecution] when
//! their deadline passes and to [ProposalState::Executed] once executed. Nothing leaves
//! `Executed`.

mod constants;
mod kinds;
mod proposal;
mod request;

pub use constants::*;
pub use kinds::*;
pub use proposal::*;
pub use request::*;

#[cfg(test)]
mod tests;
