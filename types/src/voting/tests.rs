use super::*;
use crate::{accountant::DAY_SECS, casino::WEI_PER_ETHER, Precondition};
use ethers_core::types::{Address, U256};
use proptest::prelude::*;

fn tokens(n: u64) -> U256 {
    U256::from(n) * U256::from(WEI_PER_ETHER)
}

fn proposal(accepted: u64, rejected: u64) -> Proposal {
    Proposal {
        id: 1,
        created_at: 0,
        duration: 30 * DAY_SECS,
        description: "raise the multiplier".to_string(),
        accepted: U256::from(accepted),
        rejected: U256::from(rejected),
        executed: false,
        action: ProposalAction::Common,
    }
}

fn vote(voter: u8, choice: VoteChoice, weight: u64, cast_at: u64) -> Vote {
    Vote {
        proposal: 1,
        voter: Address::repeat_byte(voter),
        choice,
        weight: U256::from(weight),
        cast_at,
    }
}

#[test]
fn test_ties_are_rejected() {
    assert_eq!(proposal(500, 500).decide(), Decision::Rejected);
    assert_eq!(proposal(0, 0).decide(), Decision::Rejected);
    assert_eq!(proposal(501, 500).decide(), Decision::Accepted);
    assert_eq!(proposal(0, 1).decide(), Decision::Rejected);
}

#[test]
fn test_state_transitions() {
    let mut open = proposal(2, 1);
    let deadline = open.deadline();
    assert_eq!(open.state(0), ProposalState::Open);
    assert_eq!(open.state(deadline - 1), ProposalState::Open);
    assert_eq!(open.state(deadline), ProposalState::ClosedPendingExecution);

    assert_eq!(open.check_execute(deadline - 1), Err(Precondition::NotEnded(1)));
    assert!(!open.can_execute(deadline - 1));
    assert!(open.can_execute(deadline));
    assert_eq!(open.check_execute(deadline), Ok(()));
    open.executed = true;
    assert_eq!(open.state(deadline), ProposalState::Executed);
    assert_eq!(open.state(0), ProposalState::Executed);
    assert_eq!(
        open.check_execute(deadline + 1),
        Err(Precondition::AlreadyExecuted(1))
    );
    assert!(!open.can_vote(1));
}

#[test]
fn test_votes_in_creation_instant_do_not_count() {
    let open = proposal(0, 0);
    assert!(!open.can_vote(0));
    assert!(open.can_vote(1));
    assert!(!open.can_vote(open.deadline()));

    assert_eq!(
        open.check_vote(0, tokens(1)),
        Err(Precondition::VotingNotOpen(1))
    );
    assert_eq!(open.check_vote(1, tokens(1)), Ok(()));
    assert_eq!(open.check_vote(1, U256::zero()), Err(Precondition::ZeroWeight));
    assert_eq!(
        open.check_vote(open.deadline(), tokens(1)),
        Err(Precondition::VotingClosed(1))
    );
}

#[test]
fn test_tally_counts_latest_cast_per_voter() {
    let deadline = 30 * DAY_SECS;
    let votes = [
        vote(0xaa, VoteChoice::Accept, 100, 10),
        vote(0xbb, VoteChoice::Reject, 40, 11),
        // Recast replaces the first vote.
        vote(0xaa, VoteChoice::Reject, 90, 12),
        // Cast in the creation instant.
        vote(0xcc, VoteChoice::Accept, 1_000, 0),
        // Cast after the deadline.
        vote(0xdd, VoteChoice::Accept, 1_000, deadline),
        Vote {
            proposal: 2,
            ..vote(0xee, VoteChoice::Accept, 1_000, 5)
        },
    ];
    let tally = Tally::from_votes(1, 0, deadline, votes.iter());
    assert_eq!(
        tally,
        Tally {
            accepted: U256::zero(),
            rejected: U256::from(130),
        }
    );
    assert_eq!(tally.decide(), Decision::Rejected);
}

#[test]
fn test_expected_effect() {
    let replacement = Address::repeat_byte(0x42);
    let mut upgrade = proposal(10, 1);
    upgrade.action = ProposalAction::Upgrade {
        target: ContractType::Casino,
        replacement,
    };
    assert_eq!(
        upgrade.expected_effect(),
        Some(Effect::Repoint {
            target: ContractType::Casino,
            address: replacement
        })
    );

    let mut election = proposal(10, 1);
    election.action = ProposalAction::LeaderElection {
        candidate: replacement,
    };
    assert_eq!(
        election.expected_effect(),
        Some(Effect::ElectLeader {
            leader: replacement
        })
    );

    upgrade.rejected = U256::from(10);
    assert_eq!(upgrade.expected_effect(), None);
    assert_eq!(proposal(10, 1).expected_effect(), None);
}

#[test]
fn test_duration_floors() {
    let upgrade = ProposalAction::Upgrade {
        target: ContractType::Accountant,
        replacement: Address::repeat_byte(1),
    };
    assert_eq!(
        ProposalRequest::new(30 * DAY_SECS - 1, "", upgrade.clone()),
        Err(Precondition::DurationTooShort {
            kind: ProposalKind::Upgrade,
            min: 30 * DAY_SECS,
            got: 30 * DAY_SECS - 1,
        })
    );
    assert!(ProposalRequest::new(30 * DAY_SECS, "", upgrade).is_ok());

    let election = ProposalAction::LeaderElection {
        candidate: Address::repeat_byte(2),
    };
    assert!(ProposalRequest::new(14 * DAY_SECS - 1, "", election.clone()).is_err());
    assert!(ProposalRequest::new(14 * DAY_SECS, "", election).is_ok());

    assert_eq!(
        ProposalRequest::new(0, "", ProposalAction::Common),
        Err(Precondition::ZeroDuration)
    );
    assert!(ProposalRequest::new(1, "", ProposalAction::Common).is_ok());
    assert_eq!(
        ProposalRequest::new(365 * DAY_SECS + 1, "", ProposalAction::Common),
        Err(Precondition::DurationTooLong {
            max: 365 * DAY_SECS,
            got: 365 * DAY_SECS + 1,
        })
    );
}

#[test]
fn test_request_payload_checks() {
    assert_eq!(
        ProposalRequest::new(
            30 * DAY_SECS,
            "",
            ProposalAction::Upgrade {
                target: ContractType::Voting,
                replacement: Address::zero(),
            }
        ),
        Err(Precondition::ZeroAddress)
    );
    assert!(ProposalRequest::new(
        14 * DAY_SECS,
        "",
        ProposalAction::ParameterChange {
            parameter: Parameter::AccountantMaintenancePercent,
            value: U256::from(100),
        }
    )
    .is_err());
    assert!(ProposalRequest::new(
        14 * DAY_SECS,
        "",
        ProposalAction::ParameterChange {
            parameter: Parameter::TokenMaxTotalSupply,
            value: U256::one() << 192,
        }
    )
    .is_err());
    assert!(ProposalRequest::new(
        14 * DAY_SECS,
        "",
        ProposalAction::ParameterChange {
            parameter: Parameter::AccountantDistributionInterval,
            value: U256::from(DAY_SECS),
        }
    )
    .is_ok());
    for (multiplier, valid) in [(99, true), (100, false)] {
        let request = ProposalRequest::new(
            14 * DAY_SECS,
            "",
            ProposalAction::ParameterChange {
                parameter: Parameter::CasinoPrizeMultiplier,
                value: U256::from(multiplier),
            },
        );
        assert_eq!(request.is_ok(), valid);
    }
}

#[test]
fn test_authorize_checks_weight_and_supply() {
    let common = ProposalRequest::new(DAY_SECS, "advisory", ProposalAction::Common).unwrap();
    assert!(common
        .authorize(&ProposalContext {
            proposer_weight: U256::one(),
            ..Default::default()
        })
        .is_ok());
    assert_eq!(
        common.authorize(&ProposalContext::default()),
        Err(Precondition::InsufficientWeight {
            weight: U256::zero(),
            required: U256::one(),
        })
    );

    let raise = ProposalRequest::new(
        14 * DAY_SECS,
        "raise supply",
        ProposalAction::ParameterChange {
            parameter: Parameter::TokenMaxTotalSupply,
            value: tokens(1_000),
        },
    )
    .unwrap();
    let context = ProposalContext {
        proposer_weight: tokens(10),
        max_total_supply: tokens(1_000),
    };
    assert!(matches!(
        raise.authorize(&context),
        Err(Precondition::InvalidParameterValue { .. })
    ));
    assert!(raise
        .authorize(&ProposalContext {
            max_total_supply: tokens(999),
            ..context
        })
        .is_ok());
    assert!(matches!(
        raise.authorize(&ProposalContext {
            proposer_weight: tokens(9),
            max_total_supply: tokens(999),
        }),
        Err(Precondition::InsufficientWeight { .. })
    ));
}

#[test]
fn test_wire_codes() {
    assert_eq!(ProposalKind::try_from(3), Ok(ProposalKind::ParameterChange));
    assert!(ProposalKind::try_from(0).is_err());
    assert!(ContractType::try_from(0).is_err());
    assert_eq!(ContractType::try_from(4), Ok(ContractType::Token));
    assert_eq!("change".parse::<ProposalKind>(), Ok(ProposalKind::ParameterChange));
    assert_eq!(
        Parameter::from_wire(ContractType::Accountant, 1),
        Some(Parameter::AccountantDistributionInterval)
    );
    assert_eq!(
        Parameter::from_wire(ContractType::Casino, 0),
        Some(Parameter::CasinoPrizeMultiplier)
    );
    assert_eq!(Parameter::from_wire(ContractType::Casino, 1), None);
    assert_eq!(Parameter::from_wire(ContractType::Registry, 0), None);
    assert_eq!(VoteChoice::from_status(0), Ok(None));
    assert_eq!(VoteChoice::from_status(2), Ok(Some(VoteChoice::Reject)));
    assert!(VoteChoice::from_status(3).is_err());
}

proptest! {
    #[test]
    fn prop_decide_rejects_every_tie(weight in any::<u128>()) {
        let tally = Tally { accepted: U256::from(weight), rejected: U256::from(weight) };
        prop_assert_eq!(tally.decide(), Decision::Rejected);
    }

    #[test]
    fn prop_short_privileged_durations_are_refused(duration in 1u64..(14 * DAY_SECS)) {
        let candidate = Address::repeat_byte(3);
        let upgrade = ProposalAction::Upgrade {
            target: ContractType::Casino,
            replacement: candidate,
        };
        let election = ProposalAction::LeaderElection { candidate };
        let change = ProposalAction::ParameterChange {
            parameter: Parameter::AccountantMaintenancePercent,
            value: U256::from(5),
        };
        prop_assert!(
            matches!(
                ProposalRequest::new(duration, "", upgrade),
                Err(Precondition::DurationTooShort { .. })
            ),
            "upgrade accepted"
        );
        prop_assert!(
            matches!(
                ProposalRequest::new(duration, "", election),
                Err(Precondition::DurationTooShort { .. })
            ),
            "election accepted"
        );
        prop_assert!(
            matches!(
                ProposalRequest::new(duration, "", change),
                Err(Precondition::DurationTooShort { .. })
            ),
            "change accepted"
        );
    }
}
