// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// A registered candidate of a poll.
///
/// The order in which candidates are passed to the engine is the registration
/// order. It is used to order candidates that have the same number of votes.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Candidate {
    /// Opaque identifier, unique within a poll.
    pub id: String,
    /// Display name.
    pub name: String,
}

impl Candidate {
    pub fn new(id: &str, name: &str) -> Candidate {
        Candidate {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

/// The ranked choices of one voter.
///
/// `preferences` holds candidate ids, the most preferred first. It may be empty.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Ballot {
    pub id: String,
    pub preferences: Vec<String>,
}

// ******** Output data structures *********

/// The vote count of one candidate in one round.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RoundResult {
    pub id: String,
    pub name: String,
    pub vote_count: u64,
}

/// What happened to the ballots of a candidate that got eliminated.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct EliminationStats {
    pub id: String,
    pub name: String,
    /// The number of ballots moved to each candidate (by id), in registration order.
    pub transfers: Vec<(String, u64)>,
    /// The number of ballots that have no preference left.
    pub exhausted: u64,
}

/// Statistics for one round
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RoundStats {
    pub round: u32,
    /// All the candidates in contention, the weakest first.
    pub tally: Vec<RoundResult>,
    /// The minimum number of votes needed to win this round.
    pub threshold: u64,
    pub continuing_ballots: u64,
    pub exhausted_ballots: u64,
    /// Empty for the final round.
    pub eliminated: Vec<EliminationStats>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum TallyStatus {
    /// A candidate holds a strict majority.
    Majority { id: String, name: String },
    /// All the candidates or all the ballots were used up before a majority formed.
    Exhausted,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TallyResult {
    pub status: TallyStatus,
    pub round_stats: Vec<RoundStats>,
}

impl TallyResult {
    /// The name of the winner, if any.
    pub fn winner(&self) -> Option<&str> {
        match &self.status {
            TallyStatus::Majority { name, .. } => Some(name.as_str()),
            TallyStatus::Exhausted => None,
        }
    }

    /// The per-round tallies, in round order.
    pub fn tally_log(&self) -> Vec<Vec<RoundResult>> {
        self.round_stats.iter().map(|rs| rs.tally.clone()).collect()
    }
}

/// Invalid inputs, rejected before any round is run.
///
/// Running out of candidates or ballots is not an error: it is reported
/// through `TallyStatus::Exhausted`.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum TallyErrors {
    EmptyCandidateSet,
    DuplicateCandidate(String),
    UnknownCandidate { ballot: String, candidate: String },
}

impl Error for TallyErrors {}

impl Display for TallyErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TallyErrors::EmptyCandidateSet => write!(f, "the poll has no candidates"),
            TallyErrors::DuplicateCandidate(id) => {
                write!(f, "candidate id {} is registered more than once", id)
            }
            TallyErrors::UnknownCandidate { ballot, candidate } => write!(
                f,
                "ballot {} references unknown candidate {}",
                ballot, candidate
            ),
        }
    }
}

// ********* Configuration **********

/// The population of ballots against which a majority is computed.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum MajorityBase {
    /// Ballots that still carry a preference in the current round.
    /// Exhausted ballots leave the denominator.
    ContinuingBallots,
    /// All the ballots given to the tally, including the exhausted ones.
    AllBallots,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TallyRules {
    pub majority_base: MajorityBase,
}

impl TallyRules {
    pub const DEFAULT_RULES: TallyRules = TallyRules {
        majority_base: MajorityBase::ContinuingBallots,
    };
}

impl Default for TallyRules {
    fn default() -> Self {
        TallyRules::DEFAULT_RULES
    }
}
