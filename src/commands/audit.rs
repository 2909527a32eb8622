//! Audit command - Read back the persisted audit trail.

use std::sync::Arc;

use crate::cli::args::AuditArgs;
use crate::config::Config;
use crate::domain::{AuditLog, AuditQuery};
use crate::errors::{AppError, AppResult};
use crate::infra::{Database, RepositoryFactory, SqlStore, Store};

/// Execute the audit command
pub async fn execute(args: AuditArgs, config: Config) -> AppResult<()> {
    let db = Database::connect(&config.database_url)
        .await
        .map_err(|e| AppError::internal(format!("Database connection failed: {}", e)))?;
    let factory = RepositoryFactory::from_config(Arc::new(SqlStore::new(db.get_connection())), &config);
    tracing::debug!(user = factory.user_id(), "Reading audit trail");

    let query = AuditQuery {
        table_name: args.table,
        limit: Some(args.limit),
    };
    let logs = factory.store().audit_logs(query).await?;
    tracing::debug!(rows = logs.len(), "Audit rows loaded");

    if logs.is_empty() {
        println!("No audit rows");
    }
    for log in &logs {
        println!("{}", format_log(log));
    }

    Ok(())
}

fn format_log(log: &AuditLog) -> String {
    format!(
        "{} {:<6} {} {} by {} [{}]",
        log.date_time.to_rfc3339(),
        log.audit_type.as_str(),
        log.table_name,
        log.primary_key,
        log.user_id,
        log.affected_column_names().join(", "),
    )
}
