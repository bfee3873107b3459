use crate::{accountant::DAY_SECS, casino::WEI_PER_ETHER};

/// Longest proposal any variant can be started with.
pub const MAX_PROPOSAL_DURATION_SECS: u64 = 365 * DAY_SECS;

/// Shortest Upgrade proposal.
pub const UPGRADE_MIN_DURATION_SECS: u64 = 30 * DAY_SECS;

/// Shortest ParameterChange proposal.
pub const PARAMETER_CHANGE_MIN_DURATION_SECS: u64 = 14 * DAY_SECS;

/// Shortest LeaderElection proposal.
pub const LEADER_ELECTION_MIN_DURATION_SECS: u64 = 14 * DAY_SECS;

/// Generic minimum shared by every variant.
pub const MIN_PROPOSAL_DURATION_SECS: u64 = 1;

/// Weight needed to start anything but a Common proposal (10 tokens).
pub const MIN_PRIVILEGED_PROPOSER_WEIGHT: u128 = 10 * WEI_PER_ETHER;

/// Upper bound (exclusive) of the maintenance percent parameter.
pub const MAX_MAINTENANCE_PERCENT: u64 = 100;

/// Bounds of the distribution session interval parameter, in seconds.
pub const MIN_DISTRIBUTION_INTERVAL_SECS: u64 = DAY_SECS;
pub const MAX_DISTRIBUTION_INTERVAL_SECS: u64 = 365 * DAY_SECS;
