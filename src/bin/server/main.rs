use actix::Actor;
use actix_web::http::header;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;
use env_logger::Env;
use std::sync::Arc;
use std::time::Duration;
use tvetlink::app_config;
use tvetlink::db::init_db;
use tvetlink::middleware::ClientCtx;
use tvetlink::realtime::{ConnectionRegistry, MemoryRegistry, Publisher, RedisRegistry};
use tvetlink::session::TokenKeys;
use tvetlink::web::realtime_ws::RealtimeServer;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_lib_mods();
    app_config::init();

    let config = app_config::get_config();

    let db = init_db(&config.database.url, config.database.max_connections)
        .await
        .to_owned();
    if config.database.auto_migrate {
        tvetlink::schema::create_schema(&db)
            .await
            .context("Failed to create database schema")?;
    }

    let keys = TokenKeys::from_config(&config.auth);

    let presence_ttl = Duration::from_secs(config.realtime.presence_ttl_secs);
    let registry: Arc<dyn ConnectionRegistry> = match config.realtime.registry.as_str() {
        "redis" => {
            log::info!("Using Redis online-user registry at {}", config.realtime.redis_url);
            Arc::new(
                RedisRegistry::new(&config.realtime.redis_url, presence_ttl)
                    .context("Invalid realtime.redis_url")?,
            )
        }
        "memory" => Arc::new(MemoryRegistry::new()),
        other => anyhow::bail!("Unknown realtime.registry {:?}, expected memory or redis", other),
    };

    let realtime = RealtimeServer::new(registry)
        .with_refresh_interval(presence_ttl / 3)
        .start();
    let publisher: Arc<dyn Publisher> = Arc::new(realtime.clone());

    let bind = (config.server.host.clone(), config.server.port);
    log::info!("Listening on {}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        // Order of middleware IS IMPORTANT and is in REVERSE EXECUTION ORDER.
        App::new()
            .app_data(Data::new(db.clone()))
            .app_data(Data::new(keys.clone()))
            .app_data(Data::new(realtime.clone()))
            .app_data(Data::new(publisher.clone()))
            // Security headers - applied to all responses
            .wrap(
                DefaultHeaders::new()
                    .add((header::X_FRAME_OPTIONS, "DENY"))
                    .add((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
                    .add(("Referrer-Policy", "strict-origin-when-cross-origin")),
            )
            .wrap(ClientCtx::default())
            // %U is the path only; query strings are never logged.
            .wrap(Logger::new("%a %{User-Agent}i %U %s %Dms"))
            .configure(tvetlink::web::configure)
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}

/// Initialize third party crates we rely on but don't have control over.
pub fn init_lib_mods() {
    // A missing .env is fine; the environment may already be set.
    if let Err(e) = dotenv::dotenv() {
        eprintln!("No .env loaded: {}", e);
    }
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}
