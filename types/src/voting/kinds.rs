use super::{
    LEADER_ELECTION_MIN_DURATION_SECS, MIN_PROPOSAL_DURATION_SECS,
    PARAMETER_CHANGE_MIN_DURATION_SECS, UPGRADE_MIN_DURATION_SECS,
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KindError {
    #[error("unknown contract type {0}")]
    ContractType(u8),
    #[error("unknown proposal kind {0}")]
    ProposalKind(u8),
    #[error("unknown proposal kind label {0:?}")]
    ProposalLabel(String),
    #[error("unknown vote choice {0}")]
    VoteChoice(u8),
}

/// Ledger component an Upgrade or ParameterChange proposal targets.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractType {
    Casino = 1,
    Voting = 2,
    Accountant = 3,
    Token = 4,
    Registry = 5,
}

impl TryFrom<u8> for ContractType {
    type Error = KindError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Casino),
            2 => Ok(Self::Voting),
            3 => Ok(Self::Accountant),
            4 => Ok(Self::Token),
            5 => Ok(Self::Registry),
            other => Err(KindError::ContractType(other)),
        }
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Casino => "casino",
            Self::Voting => "voting",
            Self::Accountant => "accountant",
            Self::Token => "token",
            Self::Registry => "registry",
        };
        f.write_str(name)
    }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProposalKind {
    Common = 1,
    Upgrade = 2,
    ParameterChange = 3,
    LeaderElection = 4,
}

impl ProposalKind {
    pub fn min_duration(self) -> u64 {
        match self {
            Self::Common => MIN_PROPOSAL_DURATION_SECS,
            Self::Upgrade => UPGRADE_MIN_DURATION_SECS,
            Self::ParameterChange => PARAMETER_CHANGE_MIN_DURATION_SECS,
            Self::LeaderElection => LEADER_ELECTION_MIN_DURATION_SECS,
        }
    }

    /// Short label used on the command line and in listings.
    pub fn label(self) -> &'static str {
        match self {
            Self::Common => "COMMON",
            Self::Upgrade => "UPGRADE",
            Self::ParameterChange => "CHANGE",
            Self::LeaderElection => "ELECTION",
        }
    }
}

impl TryFrom<u8> for ProposalKind {
    type Error = KindError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Common),
            2 => Ok(Self::Upgrade),
            3 => Ok(Self::ParameterChange),
            4 => Ok(Self::LeaderElection),
            other => Err(KindError::ProposalKind(other)),
        }
    }
}

impl FromStr for ProposalKind {
    type Err = KindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "COMMON" => Ok(Self::Common),
            "UPGRADE" => Ok(Self::Upgrade),
            "CHANGE" => Ok(Self::ParameterChange),
            "ELECTION" => Ok(Self::LeaderElection),
            _ => Err(KindError::ProposalLabel(s.to_string())),
        }
    }
}

impl fmt::Display for ProposalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Numeric protocol parameter a ParameterChange proposal can set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Parameter {
    CasinoPrizeMultiplier,
    TokenMaxTotalSupply,
    TokenMintPricePercent,
    AccountantMaintenancePercent,
    AccountantDistributionInterval,
}

impl Parameter {
    pub fn contract(self) -> ContractType {
        match self {
            Self::CasinoPrizeMultiplier => ContractType::Casino,
            Self::TokenMaxTotalSupply | Self::TokenMintPricePercent => ContractType::Token,
            Self::AccountantMaintenancePercent | Self::AccountantDistributionInterval => {
                ContractType::Accountant
            }
        }
    }

    /// Index of the parameter within its contract.
    pub fn index(self) -> u8 {
        match self {
            Self::CasinoPrizeMultiplier
            | Self::TokenMaxTotalSupply
            | Self::AccountantMaintenancePercent => 0,
            Self::TokenMintPricePercent | Self::AccountantDistributionInterval => 1,
        }
    }

    pub fn from_wire(contract: ContractType, index: u8) -> Option<Self> {
        match (contract, index) {
            (ContractType::Casino, 0) => Some(Self::CasinoPrizeMultiplier),
            (ContractType::Token, 0) => Some(Self::TokenMaxTotalSupply),
            (ContractType::Token, 1) => Some(Self::TokenMintPricePercent),
            (ContractType::Accountant, 0) => Some(Self::AccountantMaintenancePercent),
            (ContractType::Accountant, 1) => Some(Self::AccountantDistributionInterval),
            _ => None,
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CasinoPrizeMultiplier => "casino prize multiplier",
            Self::TokenMaxTotalSupply => "token max total supply",
            Self::TokenMintPricePercent => "token mint price percent",
            Self::AccountantMaintenancePercent => "accountant maintenance percent",
            Self::AccountantDistributionInterval => "accountant distribution interval",
        };
        f.write_str(name)
    }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteChoice {
    Accept = 1,
    Reject = 2,
}

impl VoteChoice {
    /// Decode a ledger vote status, where 0 means no vote was cast.
    pub fn from_status(status: u8) -> Result<Option<Self>, KindError> {
        match status {
            0 => Ok(None),
            1 => Ok(Some(Self::Accept)),
            2 => Ok(Some(Self::Reject)),
            other => Err(KindError::VoteChoice(other)),
        }
    }
}
