use super::{ContractType, Parameter, ProposalKind, VoteChoice};
use crate::Precondition;
use ethers_core::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Variant-specific payload of a proposal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalAction {
    /// Advisory only.
    Common,
    Upgrade {
        target: ContractType,
        replacement: Address,
    },
    ParameterChange {
        parameter: Parameter,
        value: U256,
    },
    LeaderElection {
        candidate: Address,
    },
}

impl ProposalAction {
    pub fn kind(&self) -> ProposalKind {
        match self {
            Self::Common => ProposalKind::Common,
            Self::Upgrade { .. } => ProposalKind::Upgrade,
            Self::ParameterChange { .. } => ProposalKind::ParameterChange,
            Self::LeaderElection { .. } => ProposalKind::LeaderElection,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalState {
    Open,
    ClosedPendingExecution,
    Executed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Accepted,
    Rejected,
}

/// Change the ledger applies when an accepted proposal is executed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Repoint {
        target: ContractType,
        address: Address,
    },
    SetParameter {
        parameter: Parameter,
        value: U256,
    },
    ElectLeader {
        leader: Address,
    },
}

/// Weighted vote totals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub accepted: U256,
    pub rejected: U256,
}

/// A single vote cast.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub proposal: u64,
    pub voter: Address,
    pub choice: VoteChoice,
    /// Voter weight at the moment of the cast.
    pub weight: U256,
    pub cast_at: u64,
}

impl Tally {
    /// Ties keep the status quo.
    pub fn decide(&self) -> Decision {
        if self.accepted > self.rejected {
            Decision::Accepted
        } else {
            Decision::Rejected
        }
    }

    /// Tally raw votes for the proposal `id` created at `created_at` and closing at `deadline`.
    ///
    /// Only the latest cast of each voter counts. Casts in the creation instant or at and after
    /// the deadline are ignored.
    pub fn from_votes<'a>(
        id: u64,
        created_at: u64,
        deadline: u64,
        votes: impl IntoIterator<Item = &'a Vote>,
    ) -> Self {
        let mut latest: HashMap<Address, &Vote> = HashMap::new();
        for vote in votes {
            if vote.proposal != id || vote.cast_at <= created_at || vote.cast_at >= deadline {
                continue;
            }
            match latest.get(&vote.voter) {
                Some(previous) if previous.cast_at > vote.cast_at => {}
                _ => {
                    latest.insert(vote.voter, vote);
                }
            }
        }
        latest.values().fold(Self::default(), |mut tally, vote| {
            match vote.choice {
                VoteChoice::Accept => tally.accepted = tally.accepted.saturating_add(vote.weight),
                VoteChoice::Reject => tally.rejected = tally.rejected.saturating_add(vote.weight),
            }
            tally
        })
    }
}

/// A governance proposal as recorded by the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: u64,
    pub created_at: u64,
    pub duration: u64,
    pub description: String,
    pub accepted: U256,
    pub rejected: U256,
    pub executed: bool,
    pub action: ProposalAction,
}

impl Proposal {
    pub fn kind(&self) -> ProposalKind {
        self.action.kind()
    }

    pub fn deadline(&self) -> u64 {
        self.created_at.saturating_add(self.duration)
    }

    pub fn state(&self, now: u64) -> ProposalState {
        if self.executed {
            ProposalState::Executed
        } else if now < self.deadline() {
            ProposalState::Open
        } else {
            ProposalState::ClosedPendingExecution
        }
    }

    /// Running totals exposed by the ledger.
    pub fn tally(&self) -> Tally {
        Tally {
            accepted: self.accepted,
            rejected: self.rejected,
        }
    }

    pub fn decide(&self) -> Decision {
        self.tally().decide()
    }

    /// Votes cast in the creation instant never count.
    pub fn can_vote(&self, now: u64) -> bool {
        self.state(now) == ProposalState::Open && now > self.created_at
    }

    pub fn can_execute(&self, now: u64) -> bool {
        self.state(now) == ProposalState::ClosedPendingExecution
    }

    pub fn check_vote(&self, now: u64, weight: U256) -> Result<(), Precondition> {
        match self.state(now) {
            ProposalState::Executed => return Err(Precondition::AlreadyExecuted(self.id)),
            ProposalState::ClosedPendingExecution => {
                return Err(Precondition::VotingClosed(self.id))
            }
            ProposalState::Open => {}
        }
        if now <= self.created_at {
            return Err(Precondition::VotingNotOpen(self.id));
        }
        if weight.is_zero() {
            return Err(Precondition::ZeroWeight);
        }
        Ok(())
    }

    pub fn check_execute(&self, now: u64) -> Result<(), Precondition> {
        match self.state(now) {
            ProposalState::Executed => Err(Precondition::AlreadyExecuted(self.id)),
            ProposalState::Open => Err(Precondition::NotEnded(self.id)),
            ProposalState::ClosedPendingExecution => Ok(()),
        }
    }

    /// What executing the proposal changes, given its current tally.
    pub fn expected_effect(&self) -> Option<Effect> {
        if self.decide() == Decision::Rejected {
            return None;
        }
        match &self.action {
            ProposalAction::Common => None,
            ProposalAction::Upgrade {
                target,
                replacement,
            } => Some(Effect::Repoint {
                target: *target,
                address: *replacement,
            }),
            ProposalAction::ParameterChange { parameter, value } => Some(Effect::SetParameter {
                parameter: *parameter,
                value: *value,
            }),
            ProposalAction::LeaderElection { candidate } => Some(Effect::ElectLeader {
                leader: *candidate,
            }),
        }
    }
}
