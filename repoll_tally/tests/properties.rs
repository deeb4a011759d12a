// Properties of the tally over every small election that can be enumerated.

use repoll_tally::*;

fn candidates(n: usize) -> Vec<Candidate> {
    (0..n)
        .map(|i| Candidate {
            id: format!("c{}", i),
            name: format!("Candidate {}", i),
        })
        .collect()
}

// All the rankings of length 0..=2 over the given candidates.
fn all_rankings(cands: &[Candidate]) -> Vec<Vec<String>> {
    let mut res: Vec<Vec<String>> = vec![vec![]];
    for a in cands.iter() {
        res.push(vec![a.id.clone()]);
        for b in cands.iter().filter(|b| b.id != a.id) {
            res.push(vec![a.id.clone(), b.id.clone()]);
        }
    }
    res
}

// Every election with `num_ballots` ballots drawn from the rankings, without regard to order.
fn elections(rankings: &[Vec<String>], num_ballots: usize) -> Vec<Vec<Ballot>> {
    fn rec(
        rankings: &[Vec<String>],
        start: usize,
        left: usize,
        cur: &mut Vec<Ballot>,
        out: &mut Vec<Vec<Ballot>>,
    ) {
        if left == 0 {
            out.push(cur.clone());
            return;
        }
        for idx in start..rankings.len() {
            cur.push(Ballot {
                id: format!("b{}", cur.len()),
                preferences: rankings[idx].clone(),
            });
            rec(rankings, idx, left - 1, cur, out);
            cur.pop();
        }
    }
    let mut out = Vec::new();
    rec(rankings, 0, num_ballots, &mut Vec::new(), &mut out);
    out
}

fn check_properties(cands: &[Candidate], ballots: &[Ballot], rules: &TallyRules) {
    let res = run_tally(cands, ballots, rules).unwrap();
    let mut previous_size: Option<usize> = None;
    let mut previous_continuing: Option<u64> = None;
    for rs in res.round_stats.iter() {
        let sum: u64 = rs.tally.iter().map(|r| r.vote_count).sum();
        assert!(sum <= ballots.len() as u64);
        assert_eq!(sum, rs.continuing_ballots);
        assert_eq!(sum + rs.exhausted_ballots, ballots.len() as u64);

        // Weakest first.
        assert!(rs.tally.windows(2).all(|w| w[0].vote_count <= w[1].vote_count));

        if let Some(size) = previous_size {
            assert!(rs.tally.len() < size, "{:?}", res);
        }
        if let Some(c) = previous_continuing {
            assert!(rs.continuing_ballots <= c);
        }
        previous_size = Some(rs.tally.len());
        previous_continuing = Some(rs.continuing_ballots);

        // Every eliminated candidate had the lowest count, and all its ballots went somewhere.
        let min = rs.tally.first().map(|r| r.vote_count).unwrap_or(0);
        for e in rs.eliminated.iter() {
            let count = rs
                .tally
                .iter()
                .find(|r| r.id == e.id)
                .map(|r| r.vote_count)
                .unwrap();
            assert_eq!(count, min);
            let moved: u64 = e.transfers.iter().map(|(_, c)| *c).sum::<u64>() + e.exhausted;
            assert_eq!(moved, count);
        }
    }
    assert!(res.round_stats.len() <= cands.len());

    match &res.status {
        TallyStatus::Majority { id, .. } => {
            let last = res.round_stats.last().unwrap();
            let top = last.tally.last().unwrap();
            assert_eq!(&top.id, id);
            assert!(top.vote_count >= last.threshold);
            assert!(last.eliminated.is_empty());
        }
        TallyStatus::Exhausted => {
            if let Some(last) = res.round_stats.last() {
                assert!(!last.eliminated.is_empty());
            }
        }
    }

    // Deterministic.
    assert_eq!(run_tally(cands, ballots, rules).unwrap(), res);
}

#[test]
fn invariants_hold_for_small_elections() {
    let cands = candidates(3);
    let rankings = all_rankings(&cands);
    for num_ballots in 0..=4 {
        for ballots in elections(&rankings, num_ballots) {
            check_properties(&cands, &ballots, &TallyRules::DEFAULT_RULES);
            check_properties(
                &cands,
                &ballots,
                &TallyRules {
                    majority_base: MajorityBase::AllBallots,
                },
            );
        }
    }
}

#[test]
fn continuing_base_always_elects_when_ballots_remain() {
    // With the continuing base, a winner exists unless the last candidates are tied.
    let cands = candidates(3);
    let rankings = all_rankings(&cands);
    for ballots in elections(&rankings, 3) {
        let res = run_tally(&cands, &ballots, &TallyRules::DEFAULT_RULES).unwrap();
        if res.status == TallyStatus::Exhausted {
            if let Some(last) = res.round_stats.last() {
                let top = last.tally.last().unwrap().vote_count;
                assert!(last.tally.iter().all(|r| r.vote_count == top), "{:?}", res);
            }
        }
    }
}

#[test]
fn first_round_majority_has_a_single_round() {
    let cands = candidates(4);
    let mut ballots: Vec<Ballot> = Vec::new();
    for (idx, prefs) in [
        vec!["c2", "c0"],
        vec!["c2"],
        vec!["c1", "c2"],
        vec!["c2", "c3"],
        vec!["c0"],
    ]
    .iter()
    .enumerate()
    {
        ballots.push(Ballot {
            id: format!("b{}", idx),
            preferences: prefs.iter().map(|s| s.to_string()).collect(),
        });
    }
    let res = run_tally(&cands, &ballots, &TallyRules::DEFAULT_RULES).unwrap();
    assert_eq!(res.round_stats.len(), 1);
    assert_eq!(
        res.status,
        TallyStatus::Majority {
            id: "c2".to_string(),
            name: "Candidate 2".to_string()
        }
    );
}

#[test]
fn inputs_are_not_modified() {
    let cands = candidates(3);
    let ballots = vec![
        Ballot {
            id: "b0".to_string(),
            preferences: vec!["c0".to_string(), "c1".to_string()],
        },
        Ballot {
            id: "b1".to_string(),
            preferences: vec!["c1".to_string()],
        },
        Ballot {
            id: "b2".to_string(),
            preferences: vec!["c2".to_string(), "c0".to_string()],
        },
    ];
    let cands_before = cands.clone();
    let ballots_before = ballots.clone();
    let first = run_tally(&cands, &ballots, &TallyRules::DEFAULT_RULES).unwrap();
    assert_eq!(cands, cands_before);
    assert_eq!(ballots, ballots_before);
    let second = run_tally(&cands, &ballots, &TallyRules::DEFAULT_RULES).unwrap();
    assert_eq!(first.tally_log(), second.tally_log());
}

#[test]
fn independent_tallies_run_in_parallel() {
    let handles: Vec<std::thread::JoinHandle<TallyResult>> = (2..6)
        .map(|n| {
            std::thread::spawn(move || {
                let cands = candidates(n);
                let ballots: Vec<Ballot> = (0..n)
                    .map(|i| Ballot {
                        id: format!("b{}", i),
                        preferences: vec![cands[n - 1].id.clone()],
                    })
                    .collect();
                run_tally(&cands, &ballots, &TallyRules::DEFAULT_RULES).unwrap()
            })
        })
        .collect();
    for (h, n) in handles.into_iter().zip(2..6) {
        let res = h.join().unwrap();
        assert_eq!(res.winner(), Some(format!("Candidate {}", n - 1).as_str()));
    }
}
