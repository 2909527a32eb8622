//! CLI argument definitions.
//!
//! Uses clap derive macros for type-safe argument parsing.

use clap::{Parser, Subcommand};

use crate::config::DEFAULT_AUDIT_LIST_LIMIT;

/// specrepo - storage and audit-trail maintenance
#[derive(Parser, Debug)]
#[command(name = "specrepo")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Database URL (overrides DATABASE_URL)
    #[arg(short, long, global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run database migrations
    Migrate(MigrateArgs),

    /// Show recorded audit rows
    Audit(AuditArgs),
}

/// Arguments for the migrate command
#[derive(Parser, Debug)]
pub struct MigrateArgs {
    #[command(subcommand)]
    pub action: MigrateAction,
}

/// Migration actions
#[derive(Subcommand, Debug)]
pub enum MigrateAction {
    /// Run pending migrations
    Up,
    /// Rollback last migration
    Down,
    /// Show migration status
    Status,
    /// Reset and re-run all migrations
    Fresh,
}

/// Arguments for the audit command
#[derive(Parser, Debug)]
pub struct AuditArgs {
    /// Only rows for this entity table
    #[arg(short, long)]
    pub table: Option<String>,

    /// Maximum number of rows, newest first
    #[arg(short, long, default_value_t = DEFAULT_AUDIT_LIST_LIMIT)]
    pub limit: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_audit_with_defaults() {
        let cli = Cli::parse_from(["specrepo", "audit", "--table", "Product"]);
        match cli.command {
            Commands::Audit(args) => {
                assert_eq!(args.table.as_deref(), Some("Product"));
                assert_eq!(args.limit, DEFAULT_AUDIT_LIST_LIMIT);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_global_database_url() {
        let cli = Cli::parse_from(["specrepo", "migrate", "status", "-d", "sqlite::memory:"]);
        assert_eq!(cli.database_url.as_deref(), Some("sqlite::memory:"));
        assert!(matches!(
            cli.command,
            Commands::Migrate(MigrateArgs { action: MigrateAction::Status })
        ));
    }
}
