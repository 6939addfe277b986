//! Declarative catalog of tenant-scoped tables and policy application.

use sqlx::PgPool;
use tracing::{info, warn};

use super::RlsError;
use crate::database::manager::DatabaseManager;

/// Every table carrying a `tenant_id uuid` column. Adding a tenant-scoped
/// table means adding it here and nowhere else; `apply_policies` and the
/// isolation probe both walk this list.
pub const TENANT_TABLES: &[&str] = &[
    "users",
    "invoices",
    "payroll_runs",
    "delivery_orders",
    "leads",
    "chat_threads",
    "chat_messages",
    "products",
    "integrations",
];

/// Single policy name shared by all tables, so re-applying the catalog
/// replaces rather than accumulates policies.
pub const POLICY_NAME: &str = "tenant_isolation";

/// Outcome of applying the policy to one table.
#[derive(Debug)]
pub struct TableOutcome {
    pub table: String,
    pub applied: bool,
    pub error: Option<String>,
}

/// Per-table results of a catalog application pass.
#[derive(Debug)]
pub struct ApplySummary {
    pub outcomes: Vec<TableOutcome>,
}

impl ApplySummary {
    pub fn applied(&self) -> usize {
        self.outcomes.iter().filter(|o| o.applied).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.applied).count()
    }

    pub fn all_applied(&self) -> bool {
        self.failed() == 0
    }
}

/// The DDL sequence that makes one table tenant-isolated.
///
/// FORCE is load-bearing: without it the table owner (the application role in
/// most deployments) bypasses every policy. DROP POLICY IF EXISTS before
/// CREATE keeps the sequence idempotent and replaces any stale predicate from
/// an earlier revision.
pub fn policy_statements(table: &str) -> Vec<String> {
    let quoted = DatabaseManager::quote_identifier(table);
    vec![
        format!("ALTER TABLE {} ENABLE ROW LEVEL SECURITY", quoted),
        format!("ALTER TABLE {} FORCE ROW LEVEL SECURITY", quoted),
        format!("DROP POLICY IF EXISTS {} ON {}", POLICY_NAME, quoted),
        format!(
            "CREATE POLICY {} ON {} \
             USING (tenant_id = current_tenant_id()) \
             WITH CHECK (tenant_id = current_tenant_id())",
            POLICY_NAME, quoted
        ),
    ]
}

/// Apply the tenant-isolation policy to every catalog table.
///
/// Failures are per-table: a table that is missing (partial migration) or
/// already locked logs a warning and the pass continues, so one bad table
/// never blocks isolation on the rest. Callers decide whether a partial
/// summary is acceptable.
pub async fn apply_policies(pool: &PgPool) -> Result<ApplySummary, RlsError> {
    let mut outcomes = Vec::with_capacity(TENANT_TABLES.len());

    for table in TENANT_TABLES {
        match apply_table(pool, table).await {
            Ok(()) => {
                outcomes.push(TableOutcome {
                    table: table.to_string(),
                    applied: true,
                    error: None,
                });
            }
            Err(e) => {
                warn!("RLS policy not applied to {}: {}", table, e);
                outcomes.push(TableOutcome {
                    table: table.to_string(),
                    applied: false,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    let summary = ApplySummary { outcomes };
    info!(
        "RLS policy catalog applied: {} ok, {} failed",
        summary.applied(),
        summary.failed()
    );
    Ok(summary)
}

async fn apply_table(pool: &PgPool, table: &str) -> Result<(), sqlx::Error> {
    for sql in policy_statements(table) {
        sqlx::query(&sql).execute(pool).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_no_duplicates() {
        let mut tables: Vec<_> = TENANT_TABLES.to_vec();
        tables.sort();
        tables.dedup();
        assert_eq!(tables.len(), TENANT_TABLES.len());
    }

    #[test]
    fn policy_statements_enable_force_and_recreate() {
        let stmts = policy_statements("invoices");
        assert_eq!(stmts.len(), 4);
        assert_eq!(stmts[0], "ALTER TABLE \"invoices\" ENABLE ROW LEVEL SECURITY");
        assert_eq!(stmts[1], "ALTER TABLE \"invoices\" FORCE ROW LEVEL SECURITY");
        assert!(stmts[2].starts_with("DROP POLICY IF EXISTS tenant_isolation"));
        assert!(stmts[3].contains("USING (tenant_id = current_tenant_id())"));
        assert!(stmts[3].contains("WITH CHECK (tenant_id = current_tenant_id())"));
    }

    #[test]
    fn policy_statements_quote_identifiers() {
        let stmts = policy_statements("odd\"table");
        assert!(stmts[0].contains("\"odd\"\"table\""));
    }
}
