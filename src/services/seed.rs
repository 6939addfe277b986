//! Demo data seeding for a tenant, used by the `seed` CLI subcommand.
//!
//! Rows are inserted through a tenant-scoped transaction like any request
//! would, so seeding doubles as a smoke test of the RLS WITH CHECK clauses.

use serde_json::json;
use sqlx::Row;
use uuid::Uuid;

use super::tenants::{TenantError, TenantService};
use crate::database::TenantDb;
use crate::models::invoice::LineItem;

pub async fn seed_tenant(slug: &str) -> Result<(), TenantError> {
    let service = TenantService::new()?;
    let tenant = service
        .get_by_slug(slug)
        .await?
        .ok_or_else(|| TenantError::NotFound(slug.to_string()))?;

    let db = TenantDb::new(service.pool().clone(), tenant.id);
    let mut tx = db.begin().await?;

    // Owner user anchors rows that need an author
    let owner: Uuid = sqlx::query(
        "SELECT id FROM users WHERE tenant_id = $1 ORDER BY created_at ASC LIMIT 1",
    )
    .bind(tenant.id)
    .fetch_one(&mut *tx)
    .await?
    .try_get("id")?;

    let line_items = vec![
        LineItem {
            description: "Setup fee".to_string(),
            quantity: 1,
            unit_price_cents: 50_000,
        },
        LineItem {
            description: "Monthly subscription".to_string(),
            quantity: 12,
            unit_price_cents: 9_900,
        },
    ];
    let amount: i64 = line_items
        .iter()
        .map(|li| li.total_cents().unwrap_or(0))
        .sum();
    sqlx::query(
        r#"
        INSERT INTO invoices (tenant_id, customer_name, line_items, amount_cents, currency, status)
        VALUES ($1, 'Globex Corp', $2, $3, 'USD', 'draft')
        "#,
    )
    .bind(tenant.id)
    .bind(json!(line_items))
    .bind(amount)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO payroll_runs (tenant_id, period_start, period_end, gross_cents, status)
        VALUES ($1, date_trunc('month', now())::date,
                (date_trunc('month', now()) + interval '1 month - 1 day')::date,
                1250000, 'pending')
        "#,
    )
    .bind(tenant.id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO delivery_orders (tenant_id, pickup_address, dropoff_address, status)
        VALUES ($1, '12 Warehouse Way', '88 Customer St', 'pending'),
               ($1, '12 Warehouse Way', '14 Uptown Ave', 'pending')
        "#,
    )
    .bind(tenant.id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO leads (tenant_id, contact_name, contact_email, company, stage)
        VALUES ($1, 'Dana Prospect', 'dana@example.com', 'Initech', 'new')
        "#,
    )
    .bind(tenant.id)
    .execute(&mut *tx)
    .await?;

    let thread_id: Uuid = sqlx::query(
        r#"
        INSERT INTO chat_threads (tenant_id, subject, status, opened_by)
        VALUES ($1, 'Getting started', 'open', $2)
        RETURNING id
        "#,
    )
    .bind(tenant.id)
    .bind(owner)
    .fetch_one(&mut *tx)
    .await?
    .try_get("id")?;

    sqlx::query(
        r#"
        INSERT INTO chat_messages (tenant_id, thread_id, sender_id, body)
        VALUES ($1, $2, $3, 'Welcome! How can we help?')
        "#,
    )
    .bind(tenant.id)
    .bind(thread_id)
    .bind(owner)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO products (tenant_id, name, sku, price_cents, stock)
        VALUES ($1, 'Starter Widget', 'SKU-0001', 1999, 100),
               ($1, 'Pro Widget', 'SKU-0002', 4999, 25)
        ON CONFLICT (tenant_id, sku) DO NOTHING
        "#,
    )
    .bind(tenant.id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO integrations (tenant_id, provider, shop_domain)
        VALUES ($1, 'shopify', 'demo-shop.example.com')
        "#,
    )
    .bind(tenant.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!("Seeded demo data for tenant {}", slug);
    Ok(())
}
