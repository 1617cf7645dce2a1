use std::{net::SocketAddr, sync::Arc};

use chrono::Duration;
use foodgram::{
    api::routes::routes, cache::cache::RedisSessionCache, config::Config, context::Context,
    document::render::Renderer, jwt::TokenSigner, store::PgStore,
};
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::load()?;
    let renderer = Renderer::new(&config.pdf_font, &config.site_name, &config.media_root)?;
    let signer = TokenSigner::new(&config.secret, Duration::hours(config.token_hours))
        .map_err(|e| format!("Invalid FOODGRAM_SECRET: {e}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    log::info!("Database ready");

    let sessions = RedisSessionCache::connect(&config.redis_url).await?;
    log::info!("Session cache ready");

    let address = SocketAddr::from(([0, 0, 0, 0], config.port));
    let context = Context::new(
        Arc::new(PgStore::new(pool)),
        Arc::new(sessions),
        signer,
        renderer,
        config,
    );

    let (address, server) = warp::serve(routes(context))
        .try_bind_with_graceful_shutdown(address, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Cannot listen for shutdown signal: {e}");
            }
        })?;

    log::info!("Listening on http://{address}");
    server.await;
    log::info!("Shut down");

    Ok(())
}
