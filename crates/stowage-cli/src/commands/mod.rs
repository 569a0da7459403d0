//! Report generators behind the CLI subcommands.

mod clear;
mod list;

pub use clear::{clear, ClearOptions};
pub use list::{list, ListOptions};
