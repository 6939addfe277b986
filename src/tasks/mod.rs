//! Background job runner.
//!
//! An in-process queue fed by handlers and drained by a single worker task.
//! Jobs that touch tenant data carry the tenant ID and re-enter tenant
//! context through `TenantDb` exactly like a request would; a job never
//! inherits context from whoever enqueued it. Job failures are logged and
//! swallowed so the worker loop outlives any individual job.

use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::{DatabaseManager, TenantDb};
use crate::rls;

#[derive(Debug, Clone)]
pub enum Job {
    SendEmail {
        tenant_id: Uuid,
        to: String,
        subject: String,
        body: String,
    },
    SyncIntegration {
        tenant_id: Uuid,
        integration_id: Uuid,
    },
    IsolationAudit {
        tenant_a: Uuid,
        tenant_b: Uuid,
    },
}

impl Job {
    fn kind(&self) -> &'static str {
        match self {
            Job::SendEmail { .. } => "send_email",
            Job::SyncIntegration { .. } => "sync_integration",
            Job::IsolationAudit { .. } => "isolation_audit",
        }
    }
}

/// Handle for enqueuing jobs; cheap to clone into request extensions.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
}

impl JobQueue {
    /// Start the worker loop and return the enqueue handle.
    pub fn start() -> Self {
        let depth = crate::config::config().worker.queue_depth;
        let (tx, rx) = mpsc::channel(depth);
        tokio::spawn(run_worker(rx));
        Self { tx }
    }

    /// Handle with no worker behind it. Enqueued jobs are dropped with a
    /// warning, which keeps handlers oblivious to whether the worker runs.
    pub fn disabled() -> Self {
        let (tx, _rx) = mpsc::channel(1);
        Self { tx }
    }

    /// Enqueue without blocking; a full queue drops the job with a warning
    /// rather than stalling the request that produced it.
    pub fn enqueue(&self, job: Job) {
        let kind = job.kind();
        if let Err(e) = self.tx.try_send(job) {
            warn!("Job queue full, dropping {} job: {}", kind, e);
        }
    }
}

async fn run_worker(mut rx: mpsc::Receiver<Job>) {
    info!("Background worker started");
    while let Some(job) = rx.recv().await {
        let kind = job.kind();
        if let Err(e) = handle_job(job).await {
            // Per-job failures never kill the worker
            warn!("Background job {} failed: {}", kind, e);
        }
    }
    info!("Background worker stopped");
}

async fn handle_job(job: Job) -> anyhow::Result<()> {
    match job {
        Job::SendEmail {
            tenant_id,
            to,
            subject,
            body,
        } => {
            // Outbound mail transport is out of scope; the job exists so
            // callers enqueue instead of blocking requests on delivery.
            info!(
                tenant = %tenant_id,
                to = %to,
                subject = %subject,
                bytes = body.len(),
                "email handed off for delivery"
            );
            Ok(())
        }
        Job::SyncIntegration {
            tenant_id,
            integration_id,
        } => sync_integration(tenant_id, integration_id).await,
        Job::IsolationAudit { tenant_a, tenant_b } => {
            let pool = DatabaseManager::pool()?;
            let report = rls::verify_isolation(&pool, tenant_a, tenant_b).await?;
            report.ensure()?;
            info!("Isolation audit passed for {} / {}", tenant_a, tenant_b);
            Ok(())
        }
    }
}

/// Stamp sync bookkeeping on one integration, under the owning tenant's
/// context.
async fn sync_integration(tenant_id: Uuid, integration_id: Uuid) -> anyhow::Result<()> {
    let pool = DatabaseManager::pool()?;
    let db = TenantDb::new(pool, tenant_id);
    let mut tx = db.begin().await?;

    let updated = sqlx::query(
        r#"
        UPDATE integrations
        SET last_synced_at = now(), last_sync_status = 'ok', updated_at = now()
        WHERE id = $1 AND tenant_id = $2 AND is_enabled = true
        "#,
    )
    .bind(integration_id)
    .bind(tenant_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;

    if updated == 0 {
        warn!(
            "Integration sync skipped: {} not found or disabled for tenant {}",
            integration_id, tenant_id
        );
    } else {
        info!("Integration {} synced for tenant {}", integration_id, tenant_id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_kinds_are_stable() {
        let job = Job::SendEmail {
            tenant_id: Uuid::new_v4(),
            to: "a@b.c".to_string(),
            subject: "s".to_string(),
            body: "b".to_string(),
        };
        assert_eq!(job.kind(), "send_email");
    }
}
