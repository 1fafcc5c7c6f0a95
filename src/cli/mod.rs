//! Operator subcommands that run against the database directly.

pub mod purge_demo;
pub mod resummarize;
pub mod stats;
