use clap::Parser;

/// This is the tabulation program for RePoll ranked-choice polls.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The file describing the poll: candidates, ballot sources and rules.
    /// See the manual of repoll_tally for the format.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) A reference file containing the outcome of a poll in JSON format. If provided, repoll will
    /// check that the tabulated output matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the poll will be written in JSON format to the given
    /// location. Setting this option overrides the output directory that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path or empty) If specified, the ballots are read from this file. Setting this option overrides
    /// the ballot sources of the --config option. A relative path is read from the working directory.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (default repoll_json) The type of the input: repoll_json or csv.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (continuingBallots or allBallots) The population of ballots a majority is computed against.
    #[clap(long, value_parser)]
    pub majority_base: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
