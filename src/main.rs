use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::sync::Arc;
use std::time::Duration;

use splitstream::clock::SystemClock;
use splitstream::config::Config;
use splitstream::db::{create_pool, init_db, queries, AppState};
use splitstream::gateway::HttpGatewayClient;
use splitstream::handlers;
use splitstream::models::{CreateContent, CreateSubscription, CreateUser, Plan};
use splitstream::reconcile;

#[derive(Parser, Debug)]
#[command(name = "splitstream")]
#[command(about = "Streaming-subscription backend with creator revenue share")]
struct Cli {
    /// Seed the database with dev data (creator, viewer, content, pending subscription)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Seeds the database with dev data for testing.
/// Creates: a creator with content, a viewer, and a pending subscription.
/// Only runs in dev mode and when the database is empty.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");
    let now = state.clock.now();

    if queries::get_user_by_email(&conn, "creator@splitstream.local")
        .expect("Failed to check for seeded data")
        .is_some()
    {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    tracing::info!("============================================");
    tracing::info!("SEEDING DEV DATA");
    tracing::info!("============================================");

    let creator = queries::create_user(
        &conn,
        &CreateUser {
            email: "creator@splitstream.local".to_string(),
            name: "Dev Creator".to_string(),
            is_creator: true,
            commission_percent: None,
        },
        now,
    )
    .expect("Failed to create dev creator");

    let content = queries::create_content(
        &conn,
        &CreateContent {
            creator_id: creator.id.clone(),
            title: "Dev Stream".to_string(),
            published_at: now,
        },
        now,
    )
    .expect("Failed to create dev content");

    let viewer = queries::create_user(
        &conn,
        &CreateUser {
            email: "viewer@splitstream.local".to_string(),
            name: "Dev Viewer".to_string(),
            is_creator: false,
            commission_percent: None,
        },
        now,
    )
    .expect("Failed to create dev viewer");

    let transaction_ref = splitstream::id::EntityType::TransactionRef.gen_id();
    let sub = queries::create_subscription(
        &conn,
        &transaction_ref,
        &CreateSubscription {
            user_id: viewer.id.clone(),
            content_id: Some(content.id.clone()),
            plan: Plan::Monthly,
            amount_minor: 1990,
        },
        now,
    )
    .expect("Failed to create dev subscription");

    tracing::info!("Creator: {} ({})", creator.email, creator.id);
    tracing::info!("Viewer: {} ({})", viewer.email, viewer.id);
    tracing::info!("Content: {} ({})", content.title, content.id);
    tracing::info!("Subscription: {} (ref: {})", sub.id, sub.transaction_ref);

    // Copy-paste friendly output for manual webhook testing
    println!();
    println!("--- COPY FROM HERE ---");
    println!("  transaction_ref: {}", sub.transaction_ref);
    println!("  subscription_id: {}", sub.id);
    println!("  creator_id: {}", creator.id);
    println!("  viewer_id: {}", viewer.id);
    println!("--- END COPY ---");
    println!();
}

/// Spawns the periodic retry sweep.
/// Re-drives all due `pending_retry` webhook events through the pipeline.
fn spawn_sweep_task(state: AppState, interval_secs: u64) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(interval_secs);

        loop {
            tokio::time::sleep(interval).await;

            match reconcile::sweep_due_events(&state).await {
                Ok(stats) if stats.examined > 0 => {
                    tracing::debug!(
                        "Sweep: processed={}, retried={}, failed={}",
                        stats.processed,
                        stats.retried,
                        stats.failed
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Retry sweep failed: {}", e);
                }
            }
        }
    });

    tracing::info!("Retry sweep task started (runs every {}s)", interval_secs);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "splitstream=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let gateway = HttpGatewayClient::new(
        &config.gateway_url,
        Duration::from_secs(config.gateway_timeout_secs),
    )
    .expect("Failed to build gateway client");

    if config.operator_api_key.is_none() {
        tracing::warn!("OPERATOR_API_KEY not set: operator endpoints are disabled");
    }

    let state = AppState {
        db: db_pool,
        gateway: Arc::new(gateway),
        clock: Arc::new(SystemClock),
        sweep_lock: Arc::new(tokio::sync::Mutex::new(())),
        operator_api_key: config.operator_api_key.clone(),
    };

    // Seed dev data if --seed flag is passed (only in dev mode)
    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set SPLITSTREAM_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    spawn_sweep_task(state.clone(), config.sweep_interval_secs);

    let app = Router::new()
        // Webhook ingress (ack-always, called by the payment gateway)
        .merge(handlers::webhooks::router())
        // Subscriber-facing glue
        .merge(handlers::subscriptions::router())
        // Operator API (bearer token auth)
        .merge(handlers::operators::router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();

    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("Splitstream server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
