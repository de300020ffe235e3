pub mod action;
pub mod cli;
pub mod load_config;
pub mod server;

pub use cli::{run, Cli, Commands};
