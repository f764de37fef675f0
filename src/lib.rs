//! A Z-Machine interpreter for version 3, 5 and 8 stories, driven one command line at a time
#![crate_name = "zline"]

#[macro_use]
extern crate log;

pub mod config;
pub mod error;
pub mod files;
pub mod iff;
pub mod instruction;
pub mod interpreter;
pub mod object;
pub mod quetzal;
pub mod text;
pub mod zmachine;

#[cfg(test)]
pub mod test_util;

pub use interpreter::Interpreter;
