//! CLI subcommands

pub mod discovery;
pub mod forward;
