//! Casino rules.
//!
//! Outcome resolution, bet sizing and claim eligibility for the guess-a-number game.

mod constants;
mod outcome;
mod sizing;
mod wager;

pub use constants::*;
pub use outcome::*;
pub use sizing::*;
pub use wager::*;
