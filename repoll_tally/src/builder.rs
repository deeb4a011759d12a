pub use crate::config::*;

/// A builder for assembling a poll and its ballots before running the tally.
///
/// ```
/// pub use repoll_tally::builder::Builder;
/// pub use repoll_tally::{Candidate, TallyRules};
/// # use repoll_tally::TallyErrors;
///
/// let mut builder = Builder::new(&TallyRules::DEFAULT_RULES)?
///     .candidates(&[Candidate::new("a", "Anna"), Candidate::new("b", "Bob")])?;
///
/// builder.add_ballot(&["a".to_string(), "b".to_string()])?;
/// builder.add_ballot(&["b".to_string()])?;
/// builder.add_ballot(&["a".to_string()])?;
///
/// let result = builder.tally()?;
/// assert_eq!(result.winner(), Some("Anna"));
///
/// # Ok::<(), TallyErrors>(())
/// ```
pub struct Builder {
    pub(crate) _rules: TallyRules,
    pub(crate) _candidates: Vec<Candidate>,
    pub(crate) _ballots: Vec<Ballot>,
}

impl Builder {
    pub fn new(rules: &TallyRules) -> Result<Builder, TallyErrors> {
        Ok(Builder {
            _rules: rules.clone(),
            _candidates: Vec::new(),
            _ballots: Vec::new(),
        })
    }

    /// Sets the candidate slate, in registration order.
    ///
    /// Ballots added before this call are discarded.
    pub fn candidates(self, cands: &[Candidate]) -> Result<Builder, TallyErrors> {
        if cands.is_empty() {
            return Err(TallyErrors::EmptyCandidateSet);
        }
        for (idx, c) in cands.iter().enumerate() {
            if cands[..idx].iter().any(|c2| c2.id == c.id) {
                return Err(TallyErrors::DuplicateCandidate(c.id.clone()));
            }
        }
        Ok(Builder {
            _rules: self._rules,
            _candidates: cands.to_vec(),
            _ballots: Vec::new(),
        })
    }

    /// Adds a ballot with an automatically assigned id.
    ///
    /// preferences: the candidate ids, the most preferred first.
    pub fn add_ballot(&mut self, preferences: &[String]) -> Result<(), TallyErrors> {
        let id = format!("ballot-{}", self._ballots.len() + 1);
        self.add_ballot_2(&Ballot {
            id,
            preferences: preferences.to_vec(),
        })
    }

    /// Adds a ballot. All the preferences must refer to registered candidates.
    pub fn add_ballot_2(&mut self, ballot: &Ballot) -> Result<(), TallyErrors> {
        if let Some(unknown) = ballot
            .preferences
            .iter()
            .find(|p| !self._candidates.iter().any(|c| c.id == **p))
        {
            return Err(TallyErrors::UnknownCandidate {
                ballot: ballot.id.clone(),
                candidate: unknown.clone(),
            });
        }
        self._ballots.push(ballot.clone());
        Ok(())
    }

    pub fn tally(&self) -> Result<TallyResult, TallyErrors> {
        crate::run_tally(&self._candidates, &self._ballots, &self._rules)
    }
}
