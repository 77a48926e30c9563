use scribbler_api::server::{self, AuthConfig, MediaStorage, PageCache, ServerState};
use scribbler_common::{
    model::auth::{InvalidLifetimeHoursError, TokenLifetime},
    snowflake::NodeId,
};
use scribbler_db::{DbError, MemoryStore, PgStore, Store};
use serde::Deserialize;
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Invalid auth token lifetime: {0}")]
    TokenLifetime(#[from] InvalidLifetimeHoursError),
    #[error("Error setting up the database: {0}")]
    Database(#[from] DbError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

fn default_max_connections() -> u32 {
    5
}

fn default_media_root() -> PathBuf {
    PathBuf::from("media")
}

fn default_home_cache_seconds() -> u64 {
    20
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    database_url: Option<String>,
    #[serde(default = "default_max_connections")]
    database_max_connections: u32,
    #[serde(default = "default_media_root")]
    media_root: PathBuf,
    #[serde(default)]
    node_id: NodeId,
    #[serde(default = "default_home_cache_seconds")]
    home_cache_seconds: u64,
    auth_token_lifetime_hours: Option<i64>,
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "scribbler_api=debug,\
                scribbler_db=debug,\
                scribbler_common=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn connect_store(env: &Env) -> Result<Arc<dyn Store>, InitError> {
    let Some(database_url) = &env.database_url else {
        warn!("DATABASE_URL is not set, keeping all data in memory");
        return Ok(Arc::new(MemoryStore::new(env.node_id)));
    };

    let store = PgStore::connect(database_url, env.database_max_connections, env.node_id).await?;
    store.migrate().await?;

    Ok(Arc::new(store))
}

fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();

    let trigger = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl-C, shutting down"),
            Err(err) => warn!(%err, "Listening for Ctrl-C failed, shutting down"),
        }
        trigger.cancel();
    });

    token
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let token_lifetime = env
        .auth_token_lifetime_hours
        .map(TokenLifetime::from_hours)
        .transpose()?;

    let state = ServerState {
        store: connect_store(&env).await?,
        home_cache: PageCache::new(std::time::Duration::from_secs(env.home_cache_seconds)),
        media: Arc::new(MediaStorage::new(env.media_root.clone())),
        auth: AuthConfig { token_lifetime },
    };
    let app = server::app(state);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    let shutdown = shutdown_on_ctrl_c();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
