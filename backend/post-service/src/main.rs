use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::prelude::*;

use post_service::config::Config;
use post_service::handlers;
use post_service::repository::{PgLedgerStore, PostRepository, UserRepository};
use post_service::schema::build_schema;
use post_service::services::{PostService, VoteService};
use post_service::session::SessionStore;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,post_service=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(true),
        )
        .init();

    info!("Starting post-service...");

    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .context("Database health check failed")?;
    info!(
        max_connections = config.database.max_connections,
        "Database pool ready"
    );

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    info!("Database migrations applied");

    let sessions = SessionStore::connect(&config.redis.url)
        .await
        .context("Failed to connect to session store")?;
    info!("Session store connected");

    let votes = VoteService::new(Arc::new(PgLedgerStore::new(pool.clone())));
    let posts = PostService::new(PostRepository::new(pool.clone()));
    let users = UserRepository::new(pool.clone());
    let schema = build_schema(posts, users, votes, &config.graphql);

    let bind_addr = config.bind_addr();
    info!("post-service listening on http://{}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::new(schema.clone()))
            .app_data(web::Data::new(sessions.clone()))
            .route("/graphql", web::post().to(handlers::graphql_handler))
            .route("/graphql/schema", web::get().to(handlers::schema_handler))
            .route("/health", web::get().to(handlers::health_handler))
            .route("/metrics", web::get().to(handlers::metrics_handler))
    })
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {}", bind_addr))?
    .run()
    .await
    .context("HTTP server error")?;

    Ok(())
}
