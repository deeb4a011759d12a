use crate::rcv::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "pollName")]
    pub poll_name: String,
    #[serde(rename = "pollDate")]
    pub poll_date: Option<String>,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
}

/// The header of the summary.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub poll: String,
    pub date: Option<String>,
    #[serde(rename = "majorityBase")]
    pub majority_base: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FileSource {
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "firstVoteColumnIndex")]
    _first_vote_column_index: Option<JSValue>,
    #[serde(rename = "firstVoteRowIndex")]
    _first_vote_row_index: Option<JSValue>,
    #[serde(rename = "idColumnIndex")]
    pub id_column_index: Option<JSValue>,
}

impl FileSource {
    /// A source with the default layout for its provider.
    pub fn new(provider: &str, file_path: &str) -> FileSource {
        FileSource {
            provider: provider.to_string(),
            file_path: file_path.to_string(),
            _first_vote_column_index: None,
            _first_vote_row_index: None,
            id_column_index: None,
        }
    }

    /// 0-based. Defaults to the first column.
    pub fn first_vote_column_index(&self) -> RcvResult<usize> {
        match self._first_vote_column_index {
            Some(_) => Ok(read_js_int(&self._first_vote_column_index)? - 1),
            None => Ok(0),
        }
    }

    /// 0-based. Defaults to the first row.
    pub fn first_vote_row_index(&self) -> RcvResult<usize> {
        match self._first_vote_row_index {
            Some(_) => Ok(read_js_int(&self._first_vote_row_index)? - 1),
            None => Ok(0),
        }
    }

    /// 0-based, if the ballots carry an id column.
    pub fn id_column_index_int(&self) -> RcvResult<Option<usize>> {
        match self.id_column_index {
            Some(_) => read_js_int(&self.id_column_index).map(|x| Some(x - 1)),
            None => Ok(None),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RcvCandidate {
    pub id: String,
    pub name: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RcvRules {
    #[serde(rename = "majorityBase")]
    pub majority_base: Option<String>,
}

impl RcvRules {
    pub fn majority_base(&self) -> RcvResult<MajorityBase> {
        match self.majority_base.as_deref() {
            None | Some("continuingBallots") => Ok(MajorityBase::ContinuingBallots),
            Some("allBallots") => Ok(MajorityBase::AllBallots),
            Some(x) => whatever!("unknown majority base: {}", x),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RcvConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    #[serde(rename = "ballotSources")]
    pub ballot_sources: Vec<FileSource>,
    pub candidates: Option<Vec<RcvCandidate>>,
    pub rules: Option<RcvRules>,
}

pub fn read_config(path: &str) -> RcvResult<RcvConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    serde_json::from_str(&contents).context(ParsingJsonSnafu {})
}

pub fn read_summary(path: String) -> RcvResult<JSValue> {
    let contents = fs::read_to_string(path.clone()).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    debug!("read_summary: {:?}", js);
    Ok(js)
}

/// Reads a 1-based index, written as a number, a numeric string or a
/// spreadsheet column name ("A", "B", ..., "AA").
fn read_js_int(x: &Option<JSValue>) -> RcvResult<usize> {
    let res: Option<usize> = match x {
        Some(JSValue::Number(n)) => n.as_u64().map(|x| x as usize),
        Some(JSValue::String(s)) if !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic()) => {
            s.to_ascii_lowercase().chars().try_fold(0usize, |acc, c| {
                acc.checked_mul(26)?
                    .checked_add((c as usize) - ('a' as usize) + 1)
            })
        }
        Some(JSValue::String(s)) => s.parse::<usize>().ok(),
        _ => None,
    };
    res.filter(|x| *x >= 1).context(ParsingJsonNumberSnafu {})
}
