//! Various utils to help build protocol tests.

#![allow(dead_code)]

pub mod fixtures;
pub mod mocks;

pub fn setup_logging(level: Option<log::LevelFilter>) {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(level.unwrap_or(log::LevelFilter::Info))
        .try_init();
}
