use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;
use dotenvy::dotenv;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod routes;
mod utils;

use config::Config;
use db::{init_db, run_migrations};

use crate::docs::ApiDoc;
use crate::routes::RateLimiters;
use crate::utils::{email_cache, email_filter};
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "DayFlow HRMS API"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(addr = %config.server_addr, "Server starting...");

    let pool = init_db(&config.database_url)
        .await
        .context("failed to connect to the database")?;

    if config.run_migrations {
        run_migrations(&pool).await.context("failed to run migrations")?;
        info!("Migrations applied");
    }

    let limiters = RateLimiters::from_config(&config)?;

    let pool_for_filter_warmup = pool.clone();
    let pool_for_cache_warmup = pool.clone();
    let server_addr = config.server_addr.clone();

    actix_web::rt::spawn(async move {
        if let Err(e) = email_filter::warmup_email_filter(&pool_for_filter_warmup, 100).await {
            error!(error = ?e, "Failed to warm up email filter");
        }
    });

    actix_web::rt::spawn(async move {
        // Last 30 days of sign-ups in batches of 250
        if let Err(e) = email_cache::warmup_email_cache(&pool_for_cache_warmup, 30, 250).await {
            error!(error = ?e, "Failed to warm up email cache");
        }
    });

    HttpServer::new(move || {
        let limiters = limiters.clone();
        let config_for_routes = config.clone();
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // wildcard matches JS/CSS assets
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .service(index)
            .configure(move |cfg| routes::configure(cfg, &config_for_routes, limiters))
    })
    .bind(server_addr)?
    .run()
    .await?;

    info!("Server stopped");
    Ok(())
}
