use std::sync::Arc;

use actix::Actor;
use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use poolsplit::auth::AuthKeys;
use poolsplit::cache::InMemoryCache;
use poolsplit::config::Config;
use poolsplit::handlers::configure_routes;
use poolsplit::notify::{LogMailer, NotificationWorker};
use poolsplit::service::{PoolService, ServiceOptions};
use poolsplit::store::MongoStore;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn io_error(e: poolsplit::Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("poolsplit=info,actix_web=info")),
        )
        .init();

    let config = Config::from_env().and_then(|c| c.validate().map(|_| c)).map_err(|e| {
        error!("Invalid configuration: {}", e);
        io_error(e)
    })?;
    info!(
        "Using database {} on {}:{}",
        config.mongodb.database, config.server.host, config.server.port
    );

    let store = MongoStore::connect(&config.mongodb.uri, &config.mongodb.database)
        .await
        .map_err(|e| {
            error!("Failed to connect to MongoDB: {}", e);
            io_error(e)
        })?;
    let notifier = NotificationWorker::new(Box::new(LogMailer)).start();

    let service = web::Data::new(PoolService::new(
        Arc::new(store),
        Arc::new(InMemoryCache::new()),
        Arc::new(notifier),
        ServiceOptions {
            summary_ttl: config.cache.summary_ttl(),
            reuse_pending: config.settlement.reuse_pending,
        },
    ));
    let keys = web::Data::new(AuthKeys::from(&config.auth));

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(service.clone())
            .app_data(keys.clone())
            .configure(configure_routes)
    })
    .workers(config.server.workers)
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
