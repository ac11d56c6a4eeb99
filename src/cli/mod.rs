//! Command-line interface module.

mod args;
pub mod resolve;
pub mod tags;

pub use args::{Cli, Commands, TagsArgs};
