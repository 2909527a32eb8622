//! CLI module - Command-line interface for the application.
//!
//! Provides commands for:
//! - `migrate` - Database migrations
//! - `audit` - Reading back the audit trail

pub mod args;

pub use args::{Cli, Commands};
