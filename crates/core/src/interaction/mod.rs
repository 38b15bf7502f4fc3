pub mod ledger;
pub mod types;

pub use ledger::InteractionLedger;
pub use types::{
    Interaction, InteractionSnapshot, VoteAction, VoteKind, VoteOutcome, VoteRequest, Voter,
};
