//! Subcommand implementations

pub mod config;
pub mod doctor;
pub mod ledger;
pub mod normalize;
pub mod run;
