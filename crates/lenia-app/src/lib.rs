//! Command-line driver for single Lenia runs.

pub mod cli;
pub mod runner;

pub use cli::{Cli, ModeArg, ParameterOverrides};
pub use runner::{RunReport, execute};
