// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use clap::{Parser, Subcommand};

/// Command-line tool inspecting the trades of a Bisq trade store
#[derive(Parser, Clone, PartialEq, Eq, Debug)]
#[clap(name = "trade-cli", bin_name = "trade-cli", author, version)]
pub struct Opts {
    /// These params can be read also from the configuration file, not just
    /// command-line args or environment variables
    #[clap(flatten)]
    pub shared: crate::opts::Opts,

    /// Command to execute
    #[clap(subcommand)]
    pub command: Command,
}

impl Opts {
    pub fn process(&mut self) {
        self.shared.process()
    }
}

/// Command-line commands:
#[derive(Subcommand, Clone, PartialEq, Eq, Debug, Display)]
pub enum Command {
    /// Lists open and closed trades with their state
    #[display("ls")]
    Ls,

    /// Prints a stored trade and its protocol data
    #[display("show<{id}>")]
    Show {
        /// Trade id
        id: String,
    },

    /// Prints the tasks a restart would run for a trade
    #[display("resume-plan<{id}>")]
    ResumePlan {
        /// Trade id
        id: String,
    },

    /// Prints the effective configuration
    #[display("config")]
    Config,
}
