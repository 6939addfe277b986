//! Operational subcommands.
//!
//! Everything an operator used to need ad hoc scripts for runs through the
//! one binary: applying and verifying RLS, provisioning tenants, seeding
//! demo data. `serve` is the default when no subcommand is given.

use anyhow::Context;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::database::DatabaseManager;
use crate::rls;
use crate::services::{seed, TenantService};

#[derive(Debug, Parser)]
#[command(name = "trellis-api", about = "Multi-tenant business management backend")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Row-level-security maintenance
    Rls {
        #[command(subcommand)]
        command: RlsCommand,
    },
    /// Tenant registry management
    Tenant {
        #[command(subcommand)]
        command: TenantCommand,
    },
    /// Insert demo data for a tenant
    Seed {
        #[arg(long)]
        tenant: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum RlsCommand {
    /// Provision session functions and apply the policy catalog
    Apply,
    /// Probe isolation between two tenants
    Verify {
        #[arg(long)]
        tenant_a: Uuid,
        #[arg(long)]
        tenant_b: Uuid,
    },
}

#[derive(Debug, Subcommand)]
pub enum TenantCommand {
    /// Create a tenant and its owner user
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        slug: String,
        #[arg(long, default_value = "standard")]
        plan: String,
        #[arg(long)]
        owner_email: String,
        #[arg(long)]
        owner_password: String,
    },
    /// List active tenants
    List,
}

pub async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Serve => unreachable!("serve is dispatched by main"),
        Command::Rls { command } => run_rls(command).await,
        Command::Tenant { command } => run_tenant(command).await,
        Command::Seed { tenant } => {
            seed::seed_tenant(&tenant)
                .await
                .with_context(|| format!("seeding tenant '{}'", tenant))?;
            println!("Seeded demo data for '{}'", tenant);
            Ok(())
        }
    }
}

async fn run_rls(command: RlsCommand) -> anyhow::Result<()> {
    let pool = DatabaseManager::pool()?;
    match command {
        RlsCommand::Apply => {
            let summary = rls::bootstrap(&pool).await?;
            for outcome in &summary.outcomes {
                match &outcome.error {
                    None => println!("  ok      {}", outcome.table),
                    Some(e) => println!("  FAILED  {} ({})", outcome.table, e),
                }
            }
            println!("{} applied, {} failed", summary.applied(), summary.failed());
            if !summary.all_applied() {
                anyhow::bail!("policy catalog only partially applied");
            }
            Ok(())
        }
        RlsCommand::Verify { tenant_a, tenant_b } => {
            let report = rls::verify_isolation(&pool, tenant_a, tenant_b).await?;
            for check in &report.checks {
                let status = if check.passed { "ok" } else { "LEAK" };
                println!(
                    "  {:6}  {} (cross-tenant: {}, no-context: {})",
                    status, check.table, check.cross_tenant_rows, check.no_context_rows
                );
            }
            report.ensure()?;
            println!("isolation verified");
            Ok(())
        }
    }
}

async fn run_tenant(command: TenantCommand) -> anyhow::Result<()> {
    let service = TenantService::new()?;
    match command {
        TenantCommand::Create {
            name,
            slug,
            plan,
            owner_email,
            owner_password,
        } => {
            let tenant = service
                .create_tenant(&name, &slug, &plan, &owner_email, &owner_password)
                .await?;
            println!("created tenant {} ({})", tenant.slug, tenant.id);
            Ok(())
        }
        TenantCommand::List => {
            for tenant in service.list().await? {
                let state = if tenant.is_active { "active" } else { "suspended" };
                println!("{}  {:10}  {}  [{}]", tenant.id, state, tenant.slug, tenant.plan);
            }
            Ok(())
        }
    }
}
