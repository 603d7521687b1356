// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

#![recursion_limit = "256"]
// Coding conventions
#![deny(
    non_upper_case_globals,
    non_camel_case_types,
    non_snake_case,
    unused_mut,
    unused_imports,
    dead_code
)]

extern crate amplify;
#[macro_use]
extern crate amplify_derive;

#[cfg(feature = "cli")]
#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde;

pub mod bus;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod manager;
#[cfg(feature = "cli")]
pub mod opts;
pub mod protocol;
mod service;
pub mod storage;
pub mod trade;

pub use crate::config::Config;
pub use error::Error;
pub use manager::TradeManager;
pub use service::LogStyle;
