use actix_web::{web, App, HttpServer};
use clap::Parser;
use sitedesk::api::middleware::ApiKeyAuth;
use sitedesk::cli::{commands::{Cli, Commands}, run_cli};
use sitedesk::config::AppConfig;
use sitedesk::db;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if !matches!(cli.command, Commands::Serve) {
        if let Err(e) = run_cli(cli.command, cli.config).await {
            error!("{}", e);
            std::process::exit(1);
        }
        return Ok(());
    }

    info!("Starting Sitedesk backend...");

    let config = match AppConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let db_pool = match db::get_connection(&config.database) {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    if config.auth.api_keys.is_empty() {
        warn!("No admin API keys configured; admin and transcript routes will reject every request");
    }

    let host = config.server.host.clone();
    let port = config.server.port;

    info!("Server listening on {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(web::Data::new(config.auth.clone()))
            .wrap(ApiKeyAuth)
            .configure(sitedesk::api::configure)
    })
    .bind((host, port))?
    .run()
    .await
}
