use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Extension, Router,
};
use clap::Parser;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use trellis_api::cli::{self, Cli, Command};
use trellis_api::database::DatabaseManager;
use trellis_api::handlers;
use trellis_api::middleware::{
    jwt_auth_middleware, require_owner_middleware, tenant_context_middleware,
};
use trellis_api::rls;
use trellis_api::tasks::JobQueue;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        None | Some(Command::Serve) => serve().await,
        Some(command) => cli::run(command).await,
    }
}

async fn serve() -> anyhow::Result<()> {
    let config = trellis_api::config::config();
    tracing::info!("Starting Trellis API in {:?} mode", config.environment);

    // Startup database work is best-effort: the server still comes up without
    // a reachable database and reports degraded on /health.
    match DatabaseManager::pool() {
        Ok(pool) => {
            if config.database.run_migrations_on_start {
                if let Err(e) = DatabaseManager::run_migrations().await {
                    tracing::warn!("Migrations not applied at startup: {}", e);
                }
            }
            if config.database.apply_rls_on_start {
                match rls::bootstrap(&pool).await {
                    Ok(summary) if summary.all_applied() => {
                        tracing::info!("RLS policies applied to {} tables", summary.applied());
                    }
                    Ok(summary) => {
                        tracing::warn!(
                            "RLS policies only partially applied: {} ok, {} failed",
                            summary.applied(),
                            summary.failed()
                        );
                    }
                    Err(e) => tracing::warn!("RLS bootstrap skipped: {}", e),
                }
            }
        }
        Err(e) => tracing::warn!("Database not configured, starting degraded: {}", e),
    }

    let jobs = if config.worker.enabled {
        JobQueue::start()
    } else {
        tracing::info!("Background worker disabled");
        JobQueue::disabled()
    };

    let app = app(jobs);

    // Allow tests or deployments to override port via env
    let port = std::env::var("TRELLIS_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("Trellis API listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn app(jobs: JobQueue) -> Router {
    let config = trellis_api::config::config();

    // Owner-gated registry and RLS maintenance; no tenant context needed.
    let admin = admin_routes().layer(axum_middleware::from_fn(require_owner_middleware));

    // Tenant-scoped business routes. Layers run outermost-last, so requests
    // hit jwt_auth first, then tenant resolution.
    let protected = Router::new()
        .merge(auth_routes())
        .merge(invoice_routes())
        .merge(payroll_routes())
        .merge(delivery_routes())
        .merge(lead_routes())
        .merge(chat_routes())
        .merge(product_routes())
        .merge(integration_routes())
        .layer(axum_middleware::from_fn(tenant_context_middleware));

    let api = Router::new()
        .merge(protected)
        .merge(admin)
        .layer(axum_middleware::from_fn(jwt_auth_middleware));

    let mut router = Router::new()
        // Public
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health))
        .merge(auth_public_routes())
        .merge(api)
        .layer(Extension(jobs));

    if config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    if config.security.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }
    router
}

fn auth_public_routes() -> Router {
    use handlers::public::auth;

    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
}

fn auth_routes() -> Router {
    use handlers::protected::auth;

    Router::new().route("/api/auth/whoami", get(auth::whoami))
}

fn invoice_routes() -> Router {
    use handlers::protected::invoices;

    Router::new()
        .route("/api/invoices", get(invoices::list).post(invoices::create))
        .route("/api/invoices/:id", get(invoices::get))
        .route("/api/invoices/:id/finalize", post(invoices::finalize))
        .route("/api/invoices/:id/pay", post(invoices::pay))
        .route("/api/invoices/:id/void", post(invoices::void))
}

fn payroll_routes() -> Router {
    use handlers::protected::payroll;

    Router::new()
        .route("/api/payroll/runs", get(payroll::list).post(payroll::create))
        .route("/api/payroll/runs/:id", get(payroll::get))
        .route("/api/payroll/runs/:id/approve", post(payroll::approve))
        .route("/api/payroll/runs/:id/pay", post(payroll::pay))
}

fn delivery_routes() -> Router {
    use handlers::protected::deliveries;

    Router::new()
        .route("/api/deliveries", get(deliveries::list).post(deliveries::create))
        .route("/api/deliveries/:id", get(deliveries::get))
        .route("/api/deliveries/:id/assign", post(deliveries::assign))
        .route("/api/deliveries/:id/status", put(deliveries::set_status))
}

fn lead_routes() -> Router {
    use handlers::protected::leads;

    Router::new()
        .route("/api/leads", get(leads::list).post(leads::create))
        .route("/api/leads/:id", get(leads::get))
        .route("/api/leads/:id/stage", put(leads::set_stage))
}

fn chat_routes() -> Router {
    use handlers::protected::chat;

    Router::new()
        .route(
            "/api/chat/threads",
            get(chat::list_threads).post(chat::open_thread),
        )
        .route(
            "/api/chat/threads/:id/messages",
            get(chat::list_messages).post(chat::post_message),
        )
        .route("/api/chat/threads/:id/close", post(chat::close_thread))
}

fn product_routes() -> Router {
    use handlers::protected::products;

    Router::new()
        .route("/api/products", get(products::list).post(products::create))
        .route(
            "/api/products/:id",
            get(products::get)
                .patch(products::update)
                .delete(products::archive),
        )
}

fn integration_routes() -> Router {
    use handlers::protected::integrations;

    Router::new()
        .route(
            "/api/integrations",
            get(integrations::list).post(integrations::create),
        )
        .route("/api/integrations/:id/sync", post(integrations::sync))
}

fn admin_routes() -> Router {
    use handlers::admin::{rls as rls_admin, tenants};

    Router::new()
        .route(
            "/api/admin/tenants",
            get(tenants::list).post(tenants::create),
        )
        .route("/api/admin/tenants/:id", get(tenants::show))
        .route("/api/admin/tenants/:id/deactivate", post(tenants::deactivate))
        .route("/api/admin/tenants/:id/reactivate", post(tenants::reactivate))
        .route("/api/admin/rls/apply", post(rls_admin::apply))
        .route("/api/admin/rls/verify", get(rls_admin::verify))
        .route("/api/admin/rls/audit", post(rls_admin::audit))
}
