//! Shift timeline CLI library.
//!
//! This crate provides the CLI interface for importing shift records and
//! checking client timelines for collisions.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, WindowArgs};
pub use config::Config;
