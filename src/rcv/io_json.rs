// Reader for the poll and ballot records exported from the RePoll service.

use serde::Deserialize;

use crate::rcv::*;

#[derive(Eq, PartialEq, Debug, Clone, Deserialize)]
struct PollCandidate {
    #[serde(rename = "_id")]
    id: String,
    name: String,
}

// The candidate records stored in a ballot may only carry the id.
#[derive(Eq, PartialEq, Debug, Clone, Deserialize)]
struct SelectedCandidate {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Deserialize)]
struct PollRecord {
    #[serde(rename = "_id")]
    id: String,
    name: Option<String>,
    #[serde(default)]
    candidates: Vec<PollCandidate>,
}

#[derive(Eq, PartialEq, Debug, Clone, Deserialize)]
struct BallotRecord {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "pollId")]
    poll_id: Option<String>,
    candidates: Option<Vec<SelectedCandidate>>,
}

#[derive(Eq, PartialEq, Debug, Clone, Deserialize)]
struct PollExport {
    poll: PollRecord,
    #[serde(default)]
    ballots: Vec<BallotRecord>,
}

/// The content of an export: the slate of the poll and its ballots.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PollRecords {
    pub name: Option<String>,
    pub candidates: Vec<RcvCandidate>,
    pub ballots: Vec<ParsedBallot>,
}

pub fn read_json(path: String) -> RcvResult<PollRecords> {
    let contents = fs::read_to_string(path.clone()).context(OpeningJsonSnafu { path })?;
    let export: PollExport =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(convert_export(export))
}

fn convert_export(export: PollExport) -> PollRecords {
    let poll_id = export.poll.id.clone();
    let mut ballots: Vec<ParsedBallot> = Vec::new();
    for b in export.ballots.into_iter() {
        match b.poll_id.as_deref() {
            Some(pid) if pid != poll_id => {
                warn!(
                    "read_json: skipping ballot {} of poll {} (expected poll {})",
                    b.id, pid, poll_id
                );
                continue;
            }
            _ => {}
        }
        // The selected candidates, in order, are the ranking of the voter.
        let choices: Vec<String> = b
            .candidates
            .unwrap_or_default()
            .into_iter()
            .map(|c| c.id)
            .collect();
        ballots.push(ParsedBallot { id: b.id, choices });
    }
    debug!("read_json: poll {}: {} ballots", poll_id, ballots.len());

    PollRecords {
        name: export.poll.name,
        candidates: export
            .poll
            .candidates
            .into_iter()
            .map(|c| RcvCandidate {
                id: c.id,
                name: c.name,
            })
            .collect(),
        ballots,
    }
}
