//! Failure vocabulary shared by the local rules and the ledger.
//!
//! [Precondition] is raised before anything is submitted. [Rejection] is the closed set of coded
//! reasons the ledger itself reverts with (`$CAS3`, `$VOT11`, ...).

use crate::voting::{Parameter, ProposalKind};
use ethers_core::types::U256;
use std::fmt;
use thiserror::Error;

/// A locally checked rule that an operation violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Precondition {
    #[error("guess number must be between 0 and 99 (got {0})")]
    GuessOutOfRange(u8),
    #[error("stake must be greater than zero")]
    ZeroStake,
    #[error("stake {stake} exceeds the maximum stake {max}")]
    StakeAboveMax { stake: U256, max: U256 },
    #[error("the wager did not win")]
    NotAWinner,
    #[error("there is no unclaimed prize")]
    NothingToClaim,
    #[error("a prize cannot be claimed in the block of its wager")]
    ClaimInSameBlock,
    #[error("the claim window of {window} blocks has passed")]
    ClaimWindowExpired { window: u64 },
    #[error("the payout period is over and must be reset first")]
    ResetDue,
    #[error("the payout period cannot be reset before {due_at}")]
    ResetNotDue { due_at: u64 },
    #[error("mint value must be greater than zero")]
    ZeroMint,
    #[error("proposal duration must be greater than zero")]
    ZeroDuration,
    #[error("{kind} proposals must last at least {min} seconds (got {got})")]
    DurationTooShort {
        kind: ProposalKind,
        min: u64,
        got: u64,
    },
    #[error("proposals can last at most {max} seconds (got {got})")]
    DurationTooLong { max: u64, got: u64 },
    #[error("address cannot be zero")]
    ZeroAddress,
    #[error("invalid value {value} for {parameter}: {reason}")]
    InvalidParameterValue {
        parameter: Parameter,
        value: U256,
        reason: &'static str,
    },
    #[error("proposer weight {weight} is below the required {required}")]
    InsufficientWeight { weight: U256, required: U256 },
    #[error("voter weight is zero")]
    ZeroWeight,
    #[error("voting on proposal {0} has not opened yet")]
    VotingNotOpen(u64),
    #[error("the voting deadline of proposal {0} has passed")]
    VotingClosed(u64),
    #[error("proposal {0} is already executed")]
    AlreadyExecuted(u64),
    #[error("proposal {0} has not ended yet")]
    NotEnded(u64),
}

/// Ledger component a [Rejection] originates from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Component {
    Accountant,
    Casino,
    Token,
    Registry,
    Voting,
    Registered,
    History,
}

macro_rules! rejections {
    ($($variant:ident => $component:ident, $code:literal, $meaning:literal;)*) => {
        /// Coded reason the ledger reverted a transaction with.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum Rejection {
            $($variant,)*
        }

        impl Rejection {
            /// Every known rejection, in code order.
            pub const ALL: &'static [Rejection] = &[$(Rejection::$variant,)*];

            /// The code as it appears in revert messages (without the leading `$`).
            pub fn code(self) -> &'static str {
                match self {
                    $(Rejection::$variant => $code,)*
                }
            }

            pub fn meaning(self) -> &'static str {
                match self {
                    $(Rejection::$variant => $meaning,)*
                }
            }

            pub fn component(self) -> Component {
                match self {
                    $(Rejection::$variant => Component::$component,)*
                }
            }

            /// Look up a bare code such as `CAS3`.
            pub fn from_code(code: &str) -> Option<Self> {
                match code {
                    $($code => Some(Rejection::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

rejections! {
    AlreadyPaidThisPeriod => Accountant, "ACC1", "The caller already received dividends this month";
    NoDividendFunds => Accountant, "ACC2", "No funds to receive dividends";
    PayoutRightAfterReset => Accountant, "ACC3", "Unable to receive dividends right after dividends distribution period reset";
    MaintenancePercentTooLarge => Accountant, "ACC4", "Maintenance percent should be less than 100%";
    DistributionIntervalOutOfRange => Accountant, "ACC5", "Distribution session interval should be between 1 and 365 days";
    GuessOutOfRange => Casino, "CAS1", "Guess number should be between 0 and 99";
    BetAboveMax => Casino, "CAS2", "Bet x10 can't be more than total locked value";
    BetAboveCap => Casino, "CAS3", "Bet can't be more than 20 ethers";
    NoBetPlaced => Casino, "CAS4", "The account didn't place a bet";
    ClaimWindowExpired => Casino, "CAS5", "Blockhash history only stored for 255 blocks";
    PrizeFundExhausted => Casino, "CAS6", "Prize fund is exhausted";
    FeeTransferFailed => Casino, "CAS7", "Fee transfer failed";
    ClaimInSameBlock => Casino, "CAS8", "Unable to claim a prize in the same block";
    MultiplierTooLarge => Casino, "CAS9", "Unable to set prize multiplier more than 99";
    MaxSupplyReached => Token, "NIN1", "Max total supply reached";
    MintWithoutValue => Token, "NIN2", "Unable to mint without investing";
    MaxSupplyNotIncreased => Token, "NIN3", "New max total supply is lesser than previous";
    DeploymentOverfunded => Token, "NIN4", "To much funds for deployment sent (only 1 ether total needed)";
    ValueExceedsUint192 => Token, "NIN5", "The value does not fit in MAX_UINT192";
    ValueExceedsUint64 => Token, "NIN6", "The value does not fit in MAX_UINT64";
    CasinoUnset => Registry, "REG1", "Casino contract is unset";
    VotingUnset => Registry, "REG2", "Voting contract is unset";
    AccountantUnset => Registry, "REG3", "Accountant contract is unset";
    TokenUnset => Registry, "REG4", "NineToken contract is unset";
    RegistryCallerNotVoting => Registry, "REG5", "The caller is not the Voting contract";
    DurationTooLong => Voting, "VOT1", "Voting max duration is 365 days";
    CommonProposalWithoutTokens => Voting, "VOT2", "The caller should posses at least some Nines to start COMMON voting";
    UpgradeTargetNone => Voting, "VOT3", "UPGRADE voting type can't be NONE";
    InvalidReplacementAddress => Voting, "VOT4", "Provide valid nextVersion address";
    LeaderElectionTooShort => Voting, "VOT5", "LEADER ELECTION should last at least 14 days";
    PrivilegedProposalWeightTooLow => Voting, "VOT6", "The caller should posses at least 10 Nines to start UPGRADE or CHANGE voting";
    ChangeTargetNone => Voting, "VOT7", "CHANGE voting type can't be NONE";
    ChangeTooShort => Voting, "VOT8", "CHANGE voting should last at least 7 days";
    VotingDeadlinePassed => Voting, "VOT11", "The votings deadline has passed";
    ZeroVoterWeight => Voting, "VOT12", "The callers weight is 0";
    VotingAlreadyExecuted => Voting, "VOT13", "This voting is already executed";
    VotingNotEnded => Voting, "VOT14", "This voting didn't end yet";
    ExecutorWeightTooLow => Voting, "VOT15", "The caller should posses at least 10 Nines to execute a voting";
    VotingNotFound => Voting, "VOT16", "The voting does not exist";
    VoteStatusNone => Voting, "VOT17", "The vote status can't be NONE";
    VoteInCreationBlock => Voting, "VOT18", "Unable to vote right after voting creation";
    NotLeader => Voting, "VOT19", "Only the leader can perform this action";
    MigrationToZeroAddress => Registered, "RWC1", "Unable to migrate capital to empty address";
    RegistryAlreadySet => Registered, "RGD1", "Initial setting of the Registry contract is only possible once";
    RegistryUnset => Registered, "RGD2", "Registry is unset";
    OnlyViaVoting => Registered, "RGD3", "This action can only be done via voting";
    RegisteredCallerNotLeader => Registered, "RGD4", "This action can only be performed by leader";
    HistoryLookupFailed => History, "EWH1", "Balance history lookup failed";
}

impl Rejection {
    /// Extract the first known `$CODE` from a revert message.
    ///
    /// Ledgers wrap the reason in varying amounts of text (`execution reverted: $CAS3`,
    /// `VM Exception while processing transaction: revert $CAS3`), so every `$` is tried.
    pub fn from_revert(message: &str) -> Option<Self> {
        message.split('$').skip(1).find_map(|rest| {
            let end = rest
                .find(|c: char| !c.is_ascii_alphanumeric())
                .unwrap_or(rest.len());
            Self::from_code(&rest[..end])
        })
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}: {}", self.code(), self.meaning())
    }
}

impl std::error::Error for Rejection {}
