mod args;
mod rcv;

use clap::Parser;
use log::error;

use crate::args::Args;
use crate::rcv::RunOverrides;

fn main() {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let overrides = RunOverrides {
        input: args.input.clone(),
        input_type: args.input_type.clone(),
        out: args.out.clone(),
        majority_base: args.majority_base.clone(),
    };

    if let Err(e) = rcv::run_election(args.config.clone(), args.reference.clone(), &overrides) {
        error!("Error occured {:?}", e);
        eprintln!("An error occured: {}", e);
        std::process::exit(1);
    }
}
