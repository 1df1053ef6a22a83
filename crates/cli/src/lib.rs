#![recursion_limit = "256"]

pub mod browser;
pub mod cli;
pub mod client;
pub mod commands;
pub mod daemon;
pub mod error;
pub mod logging;
pub mod output;
pub mod registry;
pub mod styles;
