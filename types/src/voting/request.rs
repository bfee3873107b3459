use super::{
    Parameter, ProposalAction, ProposalKind, MAX_DISTRIBUTION_INTERVAL_SECS,
    MAX_MAINTENANCE_PERCENT, MAX_PROPOSAL_DURATION_SECS, MIN_DISTRIBUTION_INTERVAL_SECS,
    MIN_PRIVILEGED_PROPOSER_WEIGHT,
};
use crate::{casino::MAX_PRIZE_MULTIPLIER, Precondition};
use ethers_core::types::U256;
use serde::{Deserialize, Serialize};

/// Ledger state a proposal request is authorized against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProposalContext {
    /// Current token balance of the proposer.
    pub proposer_weight: U256,
    /// Current max total supply of the token.
    pub max_total_supply: U256,
}

/// A proposal that passed the duration and payload checks and can be submitted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalRequest {
    duration: u64,
    description: String,
    action: ProposalAction,
}

impl ProposalRequest {
    pub fn new(
        duration: u64,
        description: impl Into<String>,
        action: ProposalAction,
    ) -> Result<Self, Precondition> {
        check_duration(action.kind(), duration)?;
        match &action {
            ProposalAction::Upgrade { replacement, .. } if replacement.is_zero() => {
                return Err(Precondition::ZeroAddress)
            }
            ProposalAction::LeaderElection { candidate } if candidate.is_zero() => {
                return Err(Precondition::ZeroAddress)
            }
            ProposalAction::ParameterChange { parameter, value } => {
                check_parameter_bounds(*parameter, *value)?
            }
            _ => {}
        }
        Ok(Self {
            duration,
            description: description.into(),
            action,
        })
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn action(&self) -> &ProposalAction {
        &self.action
    }

    pub fn kind(&self) -> ProposalKind {
        self.action.kind()
    }

    /// Weight a proposer needs to start this request.
    pub fn required_weight(&self) -> U256 {
        match self.kind() {
            ProposalKind::Common => U256::one(),
            _ => U256::from(MIN_PRIVILEGED_PROPOSER_WEIGHT),
        }
    }

    /// Checks that depend on current ledger state.
    pub fn authorize(&self, context: &ProposalContext) -> Result<(), Precondition> {
        let required = self.required_weight();
        if context.proposer_weight < required {
            return Err(Precondition::InsufficientWeight {
                weight: context.proposer_weight,
                required,
            });
        }
        if let ProposalAction::ParameterChange {
            parameter: parameter @ Parameter::TokenMaxTotalSupply,
            value,
        } = self.action
        {
            if value <= context.max_total_supply {
                return Err(Precondition::InvalidParameterValue {
                    parameter,
                    value,
                    reason: "must exceed the current max total supply",
                });
            }
        }
        Ok(())
    }
}

pub fn check_duration(kind: ProposalKind, duration: u64) -> Result<(), Precondition> {
    if duration == 0 {
        return Err(Precondition::ZeroDuration);
    }
    if duration > MAX_PROPOSAL_DURATION_SECS {
        return Err(Precondition::DurationTooLong {
            max: MAX_PROPOSAL_DURATION_SECS,
            got: duration,
        });
    }
    let min = kind.min_duration();
    if duration < min {
        return Err(Precondition::DurationTooShort {
            kind,
            min,
            got: duration,
        });
    }
    Ok(())
}

/// Static bounds of a parameter value, independent of ledger state.
pub fn check_parameter_bounds(parameter: Parameter, value: U256) -> Result<(), Precondition> {
    let invalid = |reason: &'static str| -> Result<(), Precondition> {
        Err(Precondition::InvalidParameterValue {
            parameter,
            value,
            reason,
        })
    };
    match parameter {
        Parameter::CasinoPrizeMultiplier if value > U256::from(MAX_PRIZE_MULTIPLIER) => {
            invalid("must not exceed 99")
        }
        Parameter::TokenMaxTotalSupply if value.bits() > 192 => invalid("does not fit in 192 bits"),
        Parameter::TokenMintPricePercent if value.bits() > 64 => invalid("does not fit in 64 bits"),
        Parameter::AccountantMaintenancePercent if value >= U256::from(MAX_MAINTENANCE_PERCENT) => {
            invalid("must be less than 100 percent")
        }
        Parameter::AccountantDistributionInterval
            if value < U256::from(MIN_DISTRIBUTION_INTERVAL_SECS)
                || value > U256::from(MAX_DISTRIBUTION_INTERVAL_SECS) =>
        {
            invalid("must be between 1 and 365 days")
        }
        _ => Ok(()),
    }
}
