mod config;
pub mod builder;
pub mod manual;

use log::{debug, info};

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    ops::{Add, AddAssign},
};

pub use crate::config::*;

// **** Private structures ****

type RoundId = u32;

/// Position of a candidate in the registration order.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
struct CandidateId(u32);

// Invariant: all the choices refer to candidates still in contention.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
struct RankedChoice {
    first_valid: CandidateId,
    rest: Vec<CandidateId>,
}

impl RankedChoice {
    fn from_choices(choices: &[CandidateId]) -> Option<RankedChoice> {
        choices.split_first().map(|(first, rest)| RankedChoice {
            first_valid: *first,
            rest: rest.to_vec(),
        })
    }

    /// Removes all the eliminated candidates from the list of choices.
    /// Returns None if no choice is left, in which case the ballot is exhausted.
    fn filtered_candidate(&self, still_valid: &HashSet<CandidateId>) -> Option<RankedChoice> {
        let choices: Vec<CandidateId> = std::iter::once(self.first_valid)
            .chain(self.rest.iter().cloned())
            .filter(|cid| still_valid.contains(cid))
            .collect();
        RankedChoice::from_choices(&choices)
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
struct VoteCount(u64);

impl VoteCount {
    const EMPTY: VoteCount = VoteCount(0);
}

impl std::iter::Sum for VoteCount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        VoteCount(iter.map(|vc| vc.0).sum())
    }
}

impl AddAssign for VoteCount {
    fn add_assign(&mut self, rhs: VoteCount) {
        self.0 += rhs.0;
    }
}

impl Add for VoteCount {
    type Output = VoteCount;
    fn add(self: VoteCount, rhs: VoteCount) -> VoteCount {
        VoteCount(self.0 + rhs.0)
    }
}

// Identical ballots are folded together, `count` is the number of ballots.
#[derive(Eq, PartialEq, Debug, Clone)]
struct VoteInternal {
    candidates: RankedChoice,
    count: VoteCount,
}

#[derive(Eq, PartialEq, Debug, Clone)]
struct EliminationInternal {
    candidate: CandidateId,
    transfers: BTreeMap<CandidateId, VoteCount>,
    exhausted: VoteCount,
}

#[derive(Eq, PartialEq, Debug, Clone)]
struct RoundStatistics {
    // Sorted by increasing count, then by registration order.
    candidate_stats: Vec<(CandidateId, VoteCount)>,
    eliminated: Vec<EliminationInternal>,
    vote_threshold: VoteCount,
    continuing: VoteCount,
    exhausted: VoteCount,
}

#[derive(Eq, PartialEq, Debug, Clone)]
struct RoundOutput {
    // The ballots for the next round. Only meaningful if there is no winner.
    votes: Vec<VoteInternal>,
    stats: RoundStatistics,
    winner: Option<CandidateId>,
}

/// Runs the instant-runoff tally for the given candidates and ballots.
///
/// Arguments:
/// * `candidates` the registered candidates, in registration order
/// * `ballots` the ballots, each one listing candidate ids from the most preferred
/// * `rules` the rules that govern this tally
///
/// The inputs are validated before any round is run. Once validated, the tally
/// always completes, either with a majority winner or with the field exhausted.
pub fn run_tally(
    candidates: &[Candidate],
    ballots: &[Ballot],
    rules: &TallyRules,
) -> Result<TallyResult, TallyErrors> {
    info!(
        "Processing {:?} ballots, {:?} candidates, rules: {:?}",
        ballots.len(),
        candidates.len(),
        rules
    );

    let cr: CheckResult = checks(ballots, candidates)?;
    debug!(
        "run_tally: aggregated votes: {:?}, empty ballots: {:?}",
        cr.votes.len(),
        cr.empty_ballots
    );
    for (idx, c) in candidates.iter().enumerate() {
        info!("Candidate: {}: {} ({})", idx + 1, c.name, c.id);
    }

    let total_count = VoteCount(ballots.len() as u64);

    // The candidates that are still running, in registration order.
    let mut cur_candidates: Vec<CandidateId> = cr.candidates;
    let mut cur_votes: Vec<VoteInternal> = cr.votes;
    let mut cur_stats: Vec<RoundStatistics> = Vec::new();

    loop {
        let continuing: VoteCount = cur_votes.iter().map(|v| v.count).sum();
        if cur_candidates.is_empty() || continuing == VoteCount::EMPTY {
            info!(
                "No majority after {} rounds: {} candidates and {:?} continuing ballots left",
                cur_stats.len(),
                cur_candidates.len(),
                continuing
            );
            return Ok(TallyResult {
                status: TallyStatus::Exhausted,
                round_stats: round_results_to_stats(&cur_stats, candidates),
            });
        }

        let round_id = (cur_stats.len() + 1) as RoundId;
        info!(
            "Round id: {:?} cur_candidates: {:?}",
            round_id, cur_candidates
        );
        let round_res = run_one_round(&cur_votes, rules, &cur_candidates, total_count);
        info!("Round id: {:?} stats: {:?}", round_id, round_res.stats);

        let eliminated: HashSet<CandidateId> = round_res
            .stats
            .eliminated
            .iter()
            .map(|e| e.candidate)
            .collect();
        cur_stats.push(round_res.stats);

        if let Some(cid) = round_res.winner {
            let winner = candidate_of(candidates, cid);
            info!("Round id: {:?} winner: {}", round_id, winner.name);
            return Ok(TallyResult {
                status: TallyStatus::Majority {
                    id: winner.id.clone(),
                    name: winner.name.clone(),
                },
                round_stats: round_results_to_stats(&cur_stats, candidates),
            });
        }

        // Survivors are described in candidate order.
        let survivors: Vec<CandidateId> = cur_candidates
            .iter()
            .filter(|cid| !eliminated.contains(cid))
            .cloned()
            .collect();
        assert!(
            survivors.len() < cur_candidates.len(),
            "The number of candidates did not decrease: {:?} -> {:?}",
            cur_candidates,
            survivors
        );
        cur_candidates = survivors;
        cur_votes = round_res.votes;
    }
}

/// Strict majority: more than half of the base.
fn get_threshold(base: VoteCount) -> VoteCount {
    VoteCount((base.0 / 2) + 1)
}

fn round_results_to_stats(results: &[RoundStatistics], candidates: &[Candidate]) -> Vec<RoundStats> {
    results
        .iter()
        .enumerate()
        .map(|(idx, r)| round_result_to_stat(r, idx as RoundId + 1, candidates))
        .collect()
}

fn round_result_to_stat(
    stats: &RoundStatistics,
    round_id: RoundId,
    candidates: &[Candidate],
) -> RoundStats {
    let cand = |cid: CandidateId| candidate_of(candidates, cid);

    let tally: Vec<RoundResult> = stats
        .candidate_stats
        .iter()
        .map(|(cid, vc)| RoundResult {
            id: cand(*cid).id.clone(),
            name: cand(*cid).name.clone(),
            vote_count: vc.0,
        })
        .collect();

    let eliminated: Vec<EliminationStats> = stats
        .eliminated
        .iter()
        .map(|e| EliminationStats {
            id: cand(e.candidate).id.clone(),
            name: cand(e.candidate).name.clone(),
            transfers: e
                .transfers
                .iter()
                .map(|(t_cid, t_count)| (cand(*t_cid).id.clone(), t_count.0))
                .collect(),
            exhausted: e.exhausted.0,
        })
        .collect();

    RoundStats {
        round: round_id,
        tally,
        threshold: stats.vote_threshold.0,
        continuing_ballots: stats.continuing.0,
        exhausted_ballots: stats.exhausted.0,
        eliminated,
    }
}

fn candidate_of(candidates: &[Candidate], cid: CandidateId) -> &Candidate {
    &candidates[cid.0 as usize]
}

/// Counts the top choice of every ballot.
///
/// The result covers all the candidates in contention, including the ones
/// without votes, sorted by increasing count. Candidates with the same count
/// keep their registration order.
fn compute_tally(
    votes: &[VoteInternal],
    candidates: &[CandidateId],
) -> Vec<(CandidateId, VoteCount)> {
    let mut tally: HashMap<CandidateId, VoteCount> = candidates
        .iter()
        .map(|cid| (*cid, VoteCount::EMPTY))
        .collect();
    for v in votes.iter() {
        if let Some(vc) = tally.get_mut(&v.candidates.first_valid) {
            *vc += v.count;
        }
    }
    let mut sorted_tally: Vec<(CandidateId, VoteCount)> = candidates
        .iter()
        .map(|cid| (*cid, tally[cid]))
        .collect();
    // Stable sort: ties stay in registration order.
    sorted_tally.sort_by_key(|(_, vc)| *vc);
    sorted_tally
}

/// Runs the tally for one round, and either finds a winner or eliminates the
/// weakest candidates and returns the remaining votes.
fn run_one_round(
    votes: &[VoteInternal],
    rules: &TallyRules,
    candidates: &[CandidateId],
    total_count: VoteCount,
) -> RoundOutput {
    let tally = compute_tally(votes, candidates);
    debug!("run_one_round: tally: {:?}", tally);

    let continuing: VoteCount = tally.iter().map(|(_, vc)| *vc).sum();
    let base = match rules.majority_base {
        MajorityBase::ContinuingBallots => continuing,
        MajorityBase::AllBallots => total_count,
    };
    let vote_threshold = get_threshold(base);
    debug!("run_one_round: vote_threshold: {:?}", vote_threshold);

    let mut stats = RoundStatistics {
        candidate_stats: tally.clone(),
        eliminated: Vec::new(),
        vote_threshold,
        continuing,
        exhausted: VoteCount(total_count.0 - continuing.0),
    };

    // The strongest candidate is the last one.
    if let Some((cid, count)) = tally.last() {
        if *count >= vote_threshold {
            debug!(
                "run_one_round: {:?} has count {:?}, marking as winner",
                cid, count
            );
            return RoundOutput {
                votes: votes.to_vec(),
                stats,
                winner: Some(*cid),
            };
        }
    }

    let eliminated_candidates: HashSet<CandidateId> =
        find_eliminated_candidates(&tally).into_iter().collect();
    assert!(!eliminated_candidates.is_empty(), "No candidate eliminated");
    debug!(
        "run_one_round: eliminated_candidates: {:?}",
        eliminated_candidates
    );

    // Statistics about transfers:
    // For every eliminated candidate, keep the vote transfers, or the exhausted votes.
    let mut elimination_stats: BTreeMap<CandidateId, (BTreeMap<CandidateId, VoteCount>, VoteCount)> =
        eliminated_candidates
            .iter()
            .map(|cid| (*cid, (BTreeMap::new(), VoteCount::EMPTY)))
            .collect();

    let remaining_candidates: HashSet<CandidateId> = candidates
        .iter()
        .filter(|cid| !eliminated_candidates.contains(cid))
        .cloned()
        .collect();

    let rem_votes: Vec<VoteInternal> = votes
        .iter()
        .filter_map(|va| {
            let new_rank = va.candidates.filtered_candidate(&remaining_candidates);
            let old_first = va.candidates.first_valid;
            let new_first = new_rank.as_ref().map(|nr| nr.first_valid);

            match new_first {
                None => {
                    // Ballot is now exhausted. Record the exhausted vote.
                    let e = elimination_stats
                        .entry(old_first)
                        .or_insert((BTreeMap::new(), VoteCount::EMPTY));
                    e.1 += va.count;
                }
                Some(new_first_cid) if new_first_cid != old_first => {
                    // The ballot has been transfered. Record the transfer.
                    let e = elimination_stats
                        .entry(old_first)
                        .or_insert((BTreeMap::new(), VoteCount::EMPTY));
                    let e2 = e.0.entry(new_first_cid).or_insert(VoteCount::EMPTY);
                    *e2 += va.count;
                }
                _ => {
                    // Nothing to do, the first choice is the same.
                }
            }

            new_rank.map(|rc| VoteInternal {
                candidates: rc,
                count: va.count,
            })
        })
        .collect();

    // Eliminated candidates are reported in tally order.
    stats.eliminated = tally
        .iter()
        .filter_map(|(cid, _)| {
            elimination_stats
                .remove(cid)
                .map(|(transfers, exhausted)| EliminationInternal {
                    candidate: *cid,
                    transfers,
                    exhausted,
                })
        })
        .collect();

    RoundOutput {
        votes: rem_votes,
        stats,
        winner: None,
    }
}

/// All the candidates with the lowest count. Ties are all eliminated together.
fn find_eliminated_candidates(sorted_tally: &[(CandidateId, VoteCount)]) -> Vec<CandidateId> {
    let min_count = match sorted_tally.first() {
        Some((_, vc)) => *vc,
        None => return Vec::new(),
    };
    let all_smallest: Vec<CandidateId> = sorted_tally
        .iter()
        .take_while(|(_, vc)| *vc == min_count)
        .map(|(cid, _)| *cid)
        .collect();
    debug!(
        "find_eliminated_candidates: min_count: {:?} all_smallest: {:?}",
        min_count, all_smallest
    );
    all_smallest
}

struct CheckResult {
    votes: Vec<VoteInternal>,
    candidates: Vec<CandidateId>,
    empty_ballots: VoteCount,
}

// Candidates are returned in the same order.
fn checks(coll: &[Ballot], reg_candidates: &[Candidate]) -> Result<CheckResult, TallyErrors> {
    debug!("checks: coll size: {:?}", coll.len());
    if reg_candidates.is_empty() {
        return Err(TallyErrors::EmptyCandidateSet);
    }

    let mut candidates: HashMap<&str, CandidateId> = HashMap::new();
    for (idx, c) in reg_candidates.iter().enumerate() {
        if candidates
            .insert(c.id.as_str(), CandidateId(idx as u32))
            .is_some()
        {
            return Err(TallyErrors::DuplicateCandidate(c.id.clone()));
        }
    }

    // Identical rankings are aggregated, in order of first appearance.
    let mut validated_votes: Vec<VoteInternal> = Vec::new();
    let mut vote_positions: HashMap<Vec<CandidateId>, usize> = HashMap::new();
    let mut empty_ballots = VoteCount::EMPTY;

    for b in coll.iter() {
        let mut choices: Vec<CandidateId> = Vec::with_capacity(b.preferences.len());
        for p in b.preferences.iter() {
            let cid = candidates
                .get(p.as_str())
                .ok_or_else(|| TallyErrors::UnknownCandidate {
                    ballot: b.id.clone(),
                    candidate: p.clone(),
                })?;
            choices.push(*cid);
        }

        match RankedChoice::from_choices(&choices) {
            None => {
                debug!("checks: ballot {} is empty", b.id);
                empty_ballots += VoteCount(1);
            }
            Some(rc) => {
                if let Some(&pos) = vote_positions.get(&choices) {
                    validated_votes[pos].count += VoteCount(1);
                } else {
                    vote_positions.insert(choices, validated_votes.len());
                    validated_votes.push(VoteInternal {
                        candidates: rc,
                        count: VoteCount(1),
                    });
                }
            }
        }
    }

    Ok(CheckResult {
        votes: validated_votes,
        candidates: (0..reg_candidates.len())
            .map(|idx| CandidateId(idx as u32))
            .collect(),
        empty_ballots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn abc() -> Vec<Candidate> {
        vec![
            Candidate::new("a", "Alice"),
            Candidate::new("b", "Bob"),
            Candidate::new("c", "Clara"),
        ]
    }

    fn ballots(prefs: &[&[&str]]) -> Vec<Ballot> {
        prefs
            .iter()
            .enumerate()
            .map(|(idx, p)| Ballot {
                id: format!("ballot-{}", idx),
                preferences: p.iter().map(|s| s.to_string()).collect(),
            })
            .collect()
    }

    fn counts(rs: &RoundStats) -> Vec<(&str, u64)> {
        rs.tally
            .iter()
            .map(|r| (r.id.as_str(), r.vote_count))
            .collect()
    }

    #[test]
    fn compute_tally_sorts_ascending_and_keeps_registration_order_for_ties() {
        let votes = vec![
            VoteInternal {
                candidates: RankedChoice {
                    first_valid: CandidateId(2),
                    rest: vec![],
                },
                count: VoteCount(3),
            },
            VoteInternal {
                candidates: RankedChoice {
                    first_valid: CandidateId(0),
                    rest: vec![CandidateId(1)],
                },
                count: VoteCount(1),
            },
        ];
        let cands = vec![CandidateId(0), CandidateId(1), CandidateId(2), CandidateId(3)];
        let tally = compute_tally(&votes, &cands);
        assert_eq!(
            tally,
            vec![
                (CandidateId(1), VoteCount(0)),
                (CandidateId(3), VoteCount(0)),
                (CandidateId(0), VoteCount(1)),
                (CandidateId(2), VoteCount(3)),
            ]
        );
    }

    #[test]
    fn filtered_candidate_strips_every_eliminated_entry() {
        let rc = RankedChoice {
            first_valid: CandidateId(0),
            rest: vec![CandidateId(1), CandidateId(0), CandidateId(2)],
        };
        let valid: HashSet<CandidateId> = [CandidateId(2)].into_iter().collect();
        assert_eq!(
            rc.filtered_candidate(&valid),
            Some(RankedChoice {
                first_valid: CandidateId(2),
                rest: vec![],
            })
        );
        let none: HashSet<CandidateId> = HashSet::new();
        assert_eq!(rc.filtered_candidate(&none), None);
    }

    #[test]
    fn threshold_is_strict_majority() {
        assert_eq!(get_threshold(VoteCount(5)), VoteCount(3));
        assert_eq!(get_threshold(VoteCount(4)), VoteCount(3));
        assert_eq!(get_threshold(VoteCount(1)), VoteCount(1));
    }

    #[test]
    fn two_round_majority() {
        init();
        let bs = ballots(&[
            &["a", "b"],
            &["a", "c"],
            &["b", "a"],
            &["b", "c"],
            &["c", "a"],
        ]);
        let res = run_tally(&abc(), &bs, &TallyRules::DEFAULT_RULES).unwrap();
        assert_eq!(
            res.status,
            TallyStatus::Majority {
                id: "a".to_string(),
                name: "Alice".to_string()
            }
        );
        assert_eq!(res.round_stats.len(), 2);
        assert_eq!(
            counts(&res.round_stats[0]),
            vec![("c", 1), ("a", 2), ("b", 2)]
        );
        assert_eq!(counts(&res.round_stats[1]), vec![("b", 2), ("a", 3)]);
        assert_eq!(res.round_stats[1].threshold, 3);
        assert_eq!(
            res.round_stats[0].eliminated,
            vec![EliminationStats {
                id: "c".to_string(),
                name: "Clara".to_string(),
                transfers: vec![("a".to_string(), 1)],
                exhausted: 0,
            }]
        );
        assert!(res.round_stats[1].eliminated.is_empty());
    }

    #[test]
    fn first_round_majority() {
        init();
        let bs = ballots(&[&["c"], &["c", "a"], &["c"]]);
        let res = run_tally(&abc(), &bs, &TallyRules::DEFAULT_RULES).unwrap();
        assert_eq!(res.winner(), Some("Clara"));
        assert_eq!(res.round_stats.len(), 1);
        assert_eq!(
            counts(&res.round_stats[0]),
            vec![("a", 0), ("b", 0), ("c", 3)]
        );
    }

    #[test]
    fn tied_losers_are_eliminated_together() {
        init();
        let cands = vec![
            Candidate::new("a", "Alice"),
            Candidate::new("b", "Bob"),
            Candidate::new("c", "Clara"),
            Candidate::new("d", "Dan"),
        ];
        let bs = ballots(&[
            &["a", "c"],
            &["b", "c"],
            &["c"],
            &["c"],
            &["d"],
            &["d"],
            &["d"],
        ]);
        let res = run_tally(&cands, &bs, &TallyRules::DEFAULT_RULES).unwrap();
        assert_eq!(
            counts(&res.round_stats[0]),
            vec![("a", 1), ("b", 1), ("c", 2), ("d", 3)]
        );
        let eliminated: Vec<&str> = res.round_stats[0]
            .eliminated
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(eliminated, vec!["a", "b"]);
        assert_eq!(counts(&res.round_stats[1]), vec![("d", 3), ("c", 4)]);
        assert_eq!(res.winner(), Some("Clara"));
    }

    #[test]
    fn full_tie_exhausts_the_field() {
        init();
        let cands = vec![Candidate::new("a", "Alice"), Candidate::new("b", "Bob")];
        let bs = ballots(&[&["a", "b"], &["b", "a"]]);
        let res = run_tally(&cands, &bs, &TallyRules::DEFAULT_RULES).unwrap();
        assert_eq!(res.status, TallyStatus::Exhausted);
        assert_eq!(res.round_stats.len(), 1);
        assert_eq!(res.round_stats[0].eliminated.len(), 2);
        assert_eq!(res.round_stats[0].eliminated[0].exhausted, 1);
    }

    #[test]
    fn empty_ballots_exhaust_immediately() {
        init();
        let cands = vec![Candidate::new("a", "Alice"), Candidate::new("b", "Bob")];
        let bs = ballots(&[&[], &[]]);
        let res = run_tally(&cands, &bs, &TallyRules::DEFAULT_RULES).unwrap();
        assert_eq!(res.status, TallyStatus::Exhausted);
        assert!(res.round_stats.is_empty());

        let res = run_tally(&cands, &[], &TallyRules::DEFAULT_RULES).unwrap();
        assert_eq!(res.status, TallyStatus::Exhausted);
        assert!(res.tally_log().is_empty());
    }

    #[test]
    fn exhausted_ballots_leave_the_denominator() {
        init();
        let bs = ballots(&[&["a"], &["a"], &["b"], &["b"], &["b"], &["c"], &["c"]]);
        let res = run_tally(&abc(), &bs, &TallyRules::DEFAULT_RULES).unwrap();
        // 7 ballots: a=2, b=3, c=2. a and c are eliminated, b is alone with 3 of 3.
        assert_eq!(res.round_stats.len(), 2);
        assert_eq!(res.round_stats[1].continuing_ballots, 3);
        assert_eq!(res.round_stats[1].exhausted_ballots, 4);
        assert_eq!(res.winner(), Some("Bob"));

        let all_rules = TallyRules {
            majority_base: MajorityBase::AllBallots,
        };
        let res = run_tally(&abc(), &bs, &all_rules).unwrap();
        // 3 of 7 is not a majority: b is eliminated in turn.
        assert_eq!(res.round_stats.len(), 2);
        assert_eq!(res.round_stats[1].threshold, 4);
        assert_eq!(res.status, TallyStatus::Exhausted);
    }

    #[test]
    fn rejects_invalid_inputs() {
        init();
        assert_eq!(
            run_tally(&[], &[], &TallyRules::DEFAULT_RULES),
            Err(TallyErrors::EmptyCandidateSet)
        );
        let dup = vec![Candidate::new("a", "Alice"), Candidate::new("a", "Anna")];
        assert_eq!(
            run_tally(&dup, &[], &TallyRules::DEFAULT_RULES),
            Err(TallyErrors::DuplicateCandidate("a".to_string()))
        );
        let bs = ballots(&[&["a"], &["a", "zoe"]]);
        assert_eq!(
            run_tally(&abc(), &bs, &TallyRules::DEFAULT_RULES),
            Err(TallyErrors::UnknownCandidate {
                ballot: "ballot-1".to_string(),
                candidate: "zoe".to_string()
            })
        );
    }

    #[test]
    fn checks_aggregates_identical_rankings() {
        let bs = ballots(&[&["a", "b"], &[], &["a", "b"], &["b"]]);
        let cr = checks(&bs, &abc()).unwrap();
        assert_eq!(cr.votes.len(), 2);
        assert_eq!(cr.votes[0].count, VoteCount(2));
        assert_eq!(cr.votes[1].count, VoteCount(1));
        assert_eq!(cr.empty_ballots, VoteCount(1));
    }
}
