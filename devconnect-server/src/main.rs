use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    routing::{delete, get, post},
    Router,
};
use devconnect_api::TokenKeys;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod db;
mod error;
mod extractors;
mod fuzz;
mod handlers;
mod posts;
mod profiles;
#[cfg(test)]
mod tests;

use db::PgStore;
use error::Error;
use extractors::{AppState, Profiles, Store};

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

#[derive(structopt::StructOpt)]
struct Opt {
    /// Postgres connection string
    #[structopt(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,

    /// Address to serve the API on
    #[structopt(long, env = "LISTEN_ADDR", default_value = "127.0.0.1:5000")]
    listen: SocketAddr,

    /// Secret used to verify bearer tokens
    #[structopt(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: String,

    #[structopt(long, env = "DB_MAX_CONNECTIONS", default_value = "10")]
    max_connections: u32,
}

pub async fn create_sqlx_pool(url: &str, max_connections: u32) -> anyhow::Result<sqlx::PgPool> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .with_context(|| format!("Error opening database {url:?}"))
}

pub fn app(store: Store, profiles: Profiles, keys: TokenKeys) -> Router {
    Router::new()
        .route("/api/posts/test", get(handlers::test))
        .route(
            "/api/posts",
            get(handlers::list_posts).post(handlers::create_post),
        )
        .route(
            "/api/posts/",
            get(handlers::list_posts).post(handlers::create_post),
        )
        .route(
            "/api/posts/:id",
            get(handlers::get_post).delete(handlers::delete_post),
        )
        .route("/api/posts/like/:id", post(handlers::like_post))
        .route("/api/posts/dislike/:id", post(handlers::unlike_post))
        .route("/api/posts/comment/:id", post(handlers::comment_post))
        .route(
            "/api/posts/comment/:id/:comment_id",
            delete(handlers::uncomment_post),
        )
        .route("/api/profile/test", get(handlers::profile_test))
        .route(
            "/api/profile",
            get(handlers::current_profile)
                .post(handlers::save_profile)
                .delete(handlers::delete_profile),
        )
        .route(
            "/api/profile/",
            get(handlers::current_profile)
                .post(handlers::save_profile)
                .delete(handlers::delete_profile),
        )
        .route("/api/profile/all", get(handlers::all_profiles))
        .route("/api/profile/handle/:handle", get(handlers::profile_by_handle))
        .route("/api/profile/user/:user_id", get(handlers::profile_by_user))
        .route("/api/profile/experience", post(handlers::add_experience))
        .route(
            "/api/profile/experience/:exp_id",
            delete(handlers::remove_experience),
        )
        .route("/api/profile/education", post(handlers::add_education))
        .route(
            "/api/profile/education/:edu_id",
            delete(handlers::remove_education),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(AppState {
            store,
            profiles,
            keys,
        })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(?err, "failed listening for shutdown signal");
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let opt = <Opt as structopt::StructOpt>::from_args();

    let pool = create_sqlx_pool(&opt.database_url, opt.max_connections).await?;
    MIGRATOR
        .run(&pool)
        .await
        .context("applying database migrations")?;

    let db = Arc::new(PgStore::new(pool));
    let store: Store = db.clone();
    let profiles: Profiles = db;
    let keys = TokenKeys::from_secret(opt.jwt_secret.as_bytes());

    tracing::info!("listening on {}", opt.listen);
    axum::Server::bind(&opt.listen)
        .serve(app(store, profiles, keys).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum webserver")
}
