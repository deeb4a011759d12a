use log::{debug, info, warn};

use repoll_tally::*;
use snafu::{prelude::*, Snafu};

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

pub mod config_reader;
mod io_common;
mod io_csv;
mod io_json;

use crate::rcv::config_reader::*;

#[derive(Debug, Snafu)]
pub enum RcvError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON: {source}"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing the summary to {path}"))]
    WritingSummary {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error parsing a CSV line: {source}"))]
    CsvLineParse { source: csv::Error },
    #[snafu(display("CSV line {lineno} is too short"))]
    CsvLineTooShort { lineno: usize },
    #[snafu(display("Expected a positive index"))]
    ParsingJsonNumber {},
    #[snafu(display("Error reading the working directory"))]
    WorkingDir { source: std::io::Error },
    #[snafu(display("The configuration file has no parent directory"))]
    MissingParentDir {},
    #[snafu(display("No candidates in the configuration or in the ballots"))]
    MissingCandidates {},
    #[snafu(display("Ballot provider not implemented: {provider}"))]
    UnknownProvider { provider: String },
    #[snafu(display("The poll cannot be tallied: {source}"))]
    Tally { source: TallyErrors },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type RcvResult<T> = Result<T, RcvError>;

/// A ballot, as parsed by the readers.
/// The choices are candidate ids or names, blank ranks removed.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ParsedBallot {
    pub id: String,
    pub choices: Vec<String>,
}

/// Command line settings that take precedence over the configuration file.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct RunOverrides {
    pub input: Option<String>,
    pub input_type: Option<String>,
    pub out: Option<String>,
    pub majority_base: Option<String>,
}

const DEFAULT_PROVIDER: &str = "repoll_json";
const SUMMARY_FILE_NAME: &str = "summary.json";

fn result_stats_to_json(rs: &TallyResult, candidates: &[Candidate]) -> Vec<JSValue> {
    let names: HashMap<&str, &str> = candidates
        .iter()
        .map(|c| (c.id.as_str(), c.name.as_str()))
        .collect();

    let mut l: Vec<JSValue> = Vec::new();
    let num_rounds = rs.round_stats.len();
    for (idx, round_stat) in rs.round_stats.iter().enumerate() {
        let tally: Vec<JSValue> = round_stat
            .tally
            .iter()
            .map(|r| json!({"id": r.id, "name": r.name, "count": r.vote_count}))
            .collect();

        let mut tally_results: Vec<JSValue> = Vec::new();
        for elim_stats in round_stat.eliminated.iter() {
            // Names are not unique, the transfers are listed per candidate id.
            let transfers: Vec<JSValue> = elim_stats
                .transfers
                .iter()
                .map(|(cid, count)| {
                    let name = names.get(cid.as_str()).cloned().unwrap_or(cid.as_str());
                    json!({"id": cid, "name": name, "count": count})
                })
                .collect();
            let mut entry: JSMap<String, JSValue> = JSMap::new();
            entry.insert("eliminated".to_string(), json!(elim_stats.name));
            entry.insert("id".to_string(), json!(elim_stats.id));
            entry.insert("transfers".to_string(), json!(transfers));
            if elim_stats.exhausted > 0 {
                entry.insert("exhausted".to_string(), json!(elim_stats.exhausted));
            }
            tally_results.push(JSValue::Object(entry));
        }
        // The winner is reported in the last round.
        if let TallyStatus::Majority { id, name } = &rs.status {
            if idx == num_rounds - 1 {
                tally_results.push(json!({
                    "elected": name,
                    "id": id,
                    "transfers": []
                }));
            }
        }

        let js = json!({
            "round": round_stat.round,
            "threshold": round_stat.threshold,
            "continuingBallots": round_stat.continuing_ballots,
            "exhaustedBallots": round_stat.exhausted_ballots,
            "tally": tally,
            "tallyResults": tally_results
        });
        l.push(js);
    }
    l
}

fn status_to_json(status: &TallyStatus) -> JSValue {
    match status {
        TallyStatus::Majority { id, name } => json!({"majority": {"id": id, "name": name}}),
        TallyStatus::Exhausted => json!("exhausted"),
    }
}

fn majority_base_label(base: MajorityBase) -> String {
    match base {
        MajorityBase::ContinuingBallots => "continuingBallots".to_string(),
        MajorityBase::AllBallots => "allBallots".to_string(),
    }
}

fn build_summary_js(
    config: &RcvConfig,
    rules: &TallyRules,
    candidates: &[Candidate],
    rv: &TallyResult,
) -> JSValue {
    let c = OutputConfig {
        poll: config.output_settings.poll_name.clone(),
        date: config.output_settings.poll_date.clone(),
        majority_base: majority_base_label(rules.majority_base),
    };
    json!({
        "config": c,
        "status": status_to_json(&rv.status),
        "results": result_stats_to_json(rv, candidates)
    })
}

fn validate_rules(rcv_rules: &Option<RcvRules>, overrides: &RunOverrides) -> RcvResult<TallyRules> {
    let rules = RcvRules {
        majority_base: overrides
            .majority_base
            .clone()
            .or_else(|| rcv_rules.as_ref().and_then(|r| r.majority_base.clone())),
    };
    Ok(TallyRules {
        majority_base: rules.majority_base()?,
    })
}

/// The ballots read from one source, and the slate of the poll if the source carries one.
struct SourceData {
    poll_name: Option<String>,
    candidates: Option<Vec<RcvCandidate>>,
    ballots: Vec<ParsedBallot>,
}

fn read_ranking_data(root_path: &Path, cfs: &FileSource) -> RcvResult<SourceData> {
    let p: PathBuf = root_path.join(&cfs.file_path);
    let p2 = p.as_path().display().to_string();
    info!("Attempting to read rank file {:?}", p2);
    match cfs.provider.as_str() {
        "repoll_json" => {
            let records = io_json::read_json(p2)?;
            Ok(SourceData {
                poll_name: records.name,
                candidates: Some(records.candidates),
                ballots: records.ballots,
            })
        }
        "csv" => Ok(SourceData {
            poll_name: None,
            candidates: None,
            ballots: io_csv::read_csv_ranking(p2, cfs)?,
        }),
        x => UnknownProviderSnafu { provider: x }.fail(),
    }
}

/// Infers a slate from the choices, in order of first appearance. Every choice
/// is both the id and the name of a candidate.
fn infer_candidates(parsed_ballots: &[ParsedBallot]) -> Vec<Candidate> {
    let mut res: Vec<Candidate> = Vec::new();
    for pb in parsed_ballots.iter() {
        for c in pb.choices.iter() {
            if !res.iter().any(|x| x.id == *c) {
                res.push(Candidate::new(c, c));
            }
        }
    }
    res
}

/// Turns the choices into candidate ids. A choice may be written as the id or
/// as the name of a candidate. Anything else is passed through unchanged and
/// gets rejected by the tally.
fn validate_ballots(parsed_ballots: &[ParsedBallot], candidates: &[Candidate]) -> Vec<Ballot> {
    let mut by_name: HashMap<&str, &str> = HashMap::new();
    for c in candidates.iter() {
        by_name.insert(c.name.as_str(), c.id.as_str());
    }

    let mut res: Vec<Ballot> = Vec::new();
    for pb in parsed_ballots.iter() {
        let preferences: Vec<String> = pb
            .choices
            .iter()
            .map(|s| {
                if candidates.iter().any(|c| c.id == *s) {
                    s.clone()
                } else if let Some(cid) = by_name.get(s.as_str()) {
                    cid.to_string()
                } else {
                    warn!("validate_ballots: ballot {}: unknown choice {:?}", pb.id, s);
                    s.clone()
                }
            })
            .collect();
        debug!("Preferences for ballot {:?}: {:?}", pb.id, preferences);
        res.push(Ballot {
            id: pb.id.clone(),
            preferences,
        });
    }
    res
}

fn load_config(config_path: &Option<String>, overrides: &RunOverrides) -> RcvResult<(RcvConfig, PathBuf)> {
    let input_source = overrides.input.as_ref().map(|input| {
        FileSource::new(
            overrides.input_type.as_deref().unwrap_or(DEFAULT_PROVIDER),
            input,
        )
    });

    match (config_path, input_source) {
        (Some(cp), input_source) => {
            let mut config = read_config(cp)?;
            let root_p = Path::new(cp.as_str())
                .parent()
                .context(MissingParentDirSnafu {})?
                .to_path_buf();
            // The input of the command line is relative to the working directory.
            if let Some(mut source) = input_source {
                let cwd = std::env::current_dir().context(WorkingDirSnafu {})?;
                source.file_path = cwd.join(&source.file_path).display().to_string();
                config.ballot_sources = vec![source];
            }
            Ok((config, root_p))
        }
        (None, Some(source)) => {
            let config = RcvConfig {
                output_settings: OutputSettings {
                    poll_name: io_common::simplify_file_name(&source.file_path),
                    poll_date: None,
                    output_directory: None,
                },
                ballot_sources: vec![source],
                candidates: None,
                rules: None,
            };
            Ok((config, PathBuf::new()))
        }
        (None, None) => whatever!("Either a configuration file or an input file must be provided"),
    }
}

fn write_summary(
    pretty_js_stats: &str,
    config: &RcvConfig,
    root_p: &Path,
    overrides: &RunOverrides,
) -> RcvResult<()> {
    let destination: Option<PathBuf> = match overrides.out.as_deref() {
        Some("stdout") | Some("") => None,
        Some(p) => Some(PathBuf::from(p)),
        None => config
            .output_settings
            .output_directory
            .as_ref()
            .map(|d| root_p.join(d).join(SUMMARY_FILE_NAME)),
    };
    match destination {
        Some(p) => {
            let path = p.display().to_string();
            info!("Writing summary to {}", path);
            fs::write(&p, pretty_js_stats).context(WritingSummarySnafu { path })
        }
        None => {
            println!("{}", pretty_js_stats);
            Ok(())
        }
    }
}

pub fn run_election(
    config_path: Option<String>,
    check_summary_path: Option<String>,
    overrides: &RunOverrides,
) -> RcvResult<()> {
    let (config, root_p) = load_config(&config_path, overrides)?;
    info!("config: {:?}", config);

    let rules = validate_rules(&config.rules, overrides)?;

    if config.ballot_sources.is_empty() {
        whatever!("No ballot sources detected");
    }

    let mut parsed: Vec<ParsedBallot> = Vec::new();
    let mut source_candidates: Option<Vec<RcvCandidate>> = None;
    let mut source_poll_name: Option<String> = None;
    for cfs in config.ballot_sources.iter() {
        let mut data = read_ranking_data(&root_p, cfs)?;
        if source_candidates.is_none() {
            source_candidates = data.candidates;
        }
        if source_poll_name.is_none() {
            source_poll_name = data.poll_name;
        }
        parsed.append(&mut data.ballots);
    }
    info!("Read {} ballots", parsed.len());

    let candidates: Vec<Candidate> = match config.candidates.clone().or(source_candidates) {
        Some(cs) => cs.iter().map(|c| Candidate::new(&c.id, &c.name)).collect(),
        None => {
            warn!("No candidates provided, inferring them from the ballots");
            infer_candidates(&parsed)
        }
    };
    ensure!(!candidates.is_empty(), MissingCandidatesSnafu {});

    let ballots = validate_ballots(&parsed, &candidates);
    let result = run_tally(&candidates, &ballots, &rules).context(TallySnafu {})?;
    info!("Tally status: {:?}", result.status);

    // A poll exported from the service names itself when run without a configuration.
    let mut config_out = config.clone();
    if config_path.is_none() {
        if let Some(name) = source_poll_name {
            config_out.output_settings.poll_name = name;
        }
    }

    // Assemble the final json
    let result_js = build_summary_js(&config_out, &rules, &candidates, &result);
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;
    write_summary(&pretty_js_stats, &config_out, &root_p, overrides)?;

    // The reference summary, if provided for comparison
    if let Some(summary_p) = check_summary_path {
        let summary_ref = read_summary(summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference string");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }

    Ok(())
}

#[cfg(test)]
fn test_wrapper(test_name: &str) -> RcvResult<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let test_dir = format!("{}/tests/data", env!("CARGO_MANIFEST_DIR"));
    info!("Running test {}", test_name);
    run_election(
        Some(format!("{}/{}/{}_config.json", test_dir, test_name, test_name)),
        Some(format!(
            "{}/{}/{}_expected_summary.json",
            test_dir, test_name, test_name
        )),
        &RunOverrides::default(),
    )
}
