use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    extract::FromRef,
    http::{HeaderValue, header},
};
use axum_extra::extract::cookie::Key;
use dotenv::dotenv;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::templates::Templates;

mod admin;
mod blog;
mod config;
mod content;
mod db;
mod error;
mod flash;
mod models;
mod schema;
mod slugs;
mod templates;

#[derive(Clone)]
pub struct App {
    pub db: db::Db,
    pub config: Arc<ServerConfig>,
    pub templates: Arc<Templates>,
    key: Key,
}

// Lets the signed cookie jar find its key in the shared state.
impl FromRef<App> for Key {
    fn from_ref(app: &App) -> Key {
        app.key.clone()
    }
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::new_from_env();

    if config.secret_key.len() < 32 {
        tracing::error!("SECRET_KEY must be at least 32 bytes to derive a signing key");
        std::process::exit(1);
    }

    let templates = Templates::load().expect("couldn't parse the bundled templates");

    let db = db::connect(&config.database_url);
    db::ensure_schema(&db)
        .await
        .expect("couldn't create the database schema");
    db::seed_if_empty(&db)
        .await
        .expect("couldn't seed the database");

    let port = config.port;
    let ctx = App {
        db,
        key: Key::derive_from(config.secret_key.as_bytes()),
        config: Arc::new(config),
        templates: Arc::new(templates),
    };

    let app = Router::new()
        .merge(blog::routes::route())
        .merge(admin::routes::route(ctx.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        ))
        .with_state(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("couldn't bind the listen address");
    axum::serve(listener, app)
        .await
        .expect("server exited with an error");
}
