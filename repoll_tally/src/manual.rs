/*!

This is the long-form manual for `repoll_tally` and the `repoll` command line program.

## Counting rules

The tally proceeds in rounds. In every round:

1. Every ballot that still carries a preference counts for its highest ranked
   candidate still in contention. The tally of the round lists all the
   candidates in contention, the weakest first. Candidates with the same count
   are listed in registration order.
2. If the strongest candidate holds a strict majority, it wins and the count
   stops.
3. Otherwise, all the candidates with the lowest count are eliminated
   together. Their ballots move to the next preference still in contention,
   or are exhausted if there is none.

The count also stops, without a winner, when no candidate or no ballot is left.
This happens for example when the last two candidates are tied.

### Majority base

By default, a majority is computed over the ballots that still carry a
preference in the current round (`continuingBallots`): exhausted ballots leave
the denominator. With `allBallots`, every ballot given to the tally, including
empty and exhausted ones, stays in the denominator. This makes it harder to
win and more likely that the count ends without a winner.

## Input formats

### `repoll_json`

An export of the records of a RePoll poll:

```text
{
  "poll": {
    "_id": "p1",
    "name": "Board election",
    "candidates": [{"_id": "c1", "name": "Alice"}, {"_id": "c2", "name": "Bob"}]
  },
  "ballots": [
    {"_id": "b1", "pollId": "p1", "candidates": [{"_id": "c2"}, {"_id": "c1"}]},
    {"_id": "b2", "pollId": "p1", "candidates": null}
  ]
}
```

The `candidates` of a ballot, in order, are the preferences of the voter. A
ballot without candidates is an empty ballot. Ballots of another poll are
ignored.

### `csv`

One ballot per line. The columns after `firstVoteColumnIndex` are the ranks,
each holding a candidate id or a candidate name. Empty cells are skipped.

```text
id,choice 1,choice 2,choice 3
v1,Alice,Bob,
v2,c2,,c1
```

## Configuration

```text
{
  "outputSettings": {"pollName": "Board election", "outputDirectory": "out"},
  "ballotSources": [{"provider": "csv", "filePath": "ballots.csv",
                     "firstVoteColumnIndex": 2, "firstVoteRowIndex": 2,
                     "idColumnIndex": 1}],
  "candidates": [{"id": "c1", "name": "Alice"}, {"id": "c2", "name": "Bob"}],
  "rules": {"majorityBase": "continuingBallots"}
}
```

- `candidates` (optional): if missing, the slate of the first `repoll_json`
  source is used.
- `rules` (optional): `majorityBase` is `continuingBallots` (default) or
  `allBallots`.
- `outputDirectory` (optional): the summary is written there as
  `summary.json`. Relative paths are resolved against the configuration file.

## Output

The summary lists the rounds in order. The `tally` of each round is the
ranking of the candidates, the weakest first; `tallyResults` lists the
eliminated candidates with the transfers of their ballots, one entry per
receiving candidate id, and the number of ballots that exhausted.

 */
