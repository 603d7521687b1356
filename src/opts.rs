// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use clap::ValueHint;
use std::fs;
use std::path::PathBuf;

#[cfg(target_os = "linux")]
pub const BISQ_TRADE_DATA_DIR: &str = "~/.bisq-trade";
#[cfg(any(target_os = "freebsd", target_os = "openbsd", target_os = "netbsd"))]
pub const BISQ_TRADE_DATA_DIR: &str = "~/.bisq-trade";
#[cfg(target_os = "macos")]
pub const BISQ_TRADE_DATA_DIR: &str = "~/Library/Application Support/BisqTrade";
#[cfg(target_os = "windows")]
pub const BISQ_TRADE_DATA_DIR: &str = "~\\AppData\\Local\\BisqTrade";
#[cfg(target_os = "ios")]
pub const BISQ_TRADE_DATA_DIR: &str = "~/Documents";
#[cfg(target_os = "android")]
pub const BISQ_TRADE_DATA_DIR: &str = ".";

pub const BISQ_TRADE_CONFIG_FILE: &str = "{data_dir}/bisq-trade.toml";

/// Shared options used by different binaries
#[derive(Parser, Clone, PartialEq, Eq, Debug)]
pub struct Opts {
    /// Data directory path
    ///
    /// Path to the directory that contains the trade store and the
    /// configuration file.
    #[clap(
        short,
        long,
        global = true,
        default_value = BISQ_TRADE_DATA_DIR,
        env = "BISQ_TRADE_DATA_DIR",
        value_hint = ValueHint::DirPath
    )]
    pub data_dir: PathBuf,

    /// Path to the configuration file
    ///
    /// Defaults to `bisq-trade.toml` inside `--data-dir` directory. A default
    /// file is written when none exists.
    #[clap(
        short,
        long,
        global = true,
        env = "BISQ_TRADE_CONFIG",
        value_hint = ValueHint::FilePath,
        default_value = BISQ_TRADE_CONFIG_FILE
    )]
    pub config: String,
}

impl Opts {
    pub fn process(&mut self) {
        let env = env_logger::Env::new().default_filter_or("bisq_trade=info");
        // standard environment variable set to "true" when running in CI environments
        let is_test = matches!(std::env::var("CI"), Ok(v) if v == "true");
        // a logger may already be installed by the embedding application
        let _ = env_logger::from_env(env).is_test(is_test).try_init();

        self.data_dir =
            PathBuf::from(shellexpand::tilde(&self.data_dir.to_string_lossy()).to_string());
        if let Err(err) = fs::create_dir_all(&self.data_dir) {
            warn!(
                "Unable to access data directory {}: {}",
                self.data_dir.display(),
                err
            );
        }

        let mut config = self.config.clone();
        self.process_dir(&mut config);
        self.config = config;
    }

    /// Expands `{data_dir}` and `~` in a path template
    pub fn process_dir(&self, path: &mut String) {
        *path = path.replace("{data_dir}", &self.data_dir.to_string_lossy());
        *path = shellexpand::tilde(path).to_string();
    }
}
