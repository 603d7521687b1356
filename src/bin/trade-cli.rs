// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Command-line interface to the Bisq trade store

#[macro_use]
extern crate log;

use std::path::Path;

use clap::Parser;

use bisq_trade::cli::Opts;
use bisq_trade::config::parse_config;
use bisq_trade::storage::LmdbStore;
use bisq_trade::{Error, LogStyle};

fn main() {
    let mut opts = Opts::parse();
    trace!("Command-line arguments: {:?}", &opts);
    opts.process();
    trace!("Processed arguments: {:?}", &opts);

    if let Err(err) = run(opts) {
        eprintln!("{} {}", "error:".err(), err.err());
        std::process::exit(1);
    }
}

fn run(opts: Opts) -> Result<(), Error> {
    let config = parse_config(&opts.shared.config)?;
    trace!("Configuration: {:#?}", &config);

    let mut store_path = config.store_path();
    opts.shared.process_dir(&mut store_path);
    debug!("Trade store at {}", &store_path);
    let store = LmdbStore::open(Path::new(&store_path))?;

    trace!("Executing command: {:?}", opts.command);
    opts.command.exec(&config, &store)
}
