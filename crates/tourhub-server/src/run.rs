use std::path::Path;

use crate::config::ServerConfig;
use crate::error::Result;
use axum::http::{StatusCode, Uri};
use axum::{response::IntoResponse, routing::get, Router};
use futures::FutureExt;
use tourhub_app::{
    auth::token::TokenLayer,
    error::ApiError,
    notify::LogNotifier,
    rest_api,
    state::{AppConfig, AppState},
    user::users_router,
};
use tourhub_auth::token::TokenManager;
use tokio::{fs, io::AsyncWriteExt as _};
use tracing::{debug, info};

const SECRET_SIZE: usize = 64;

pub async fn run(args: ServerConfig) -> Result<()> {
    let state = build_state(&args).await?;
    run_with_state(args, state).await
}

pub async fn run_with_state(args: ServerConfig, state: AppState) -> Result<()> {
    let shutdown = tokio::signal::ctrl_c().map(|_| ());
    run_graceful_with_state(args, state, shutdown).await
}

pub async fn run_graceful_with_state<S>(
    args: ServerConfig,
    state: AppState,
    shutdown_signal: S,
) -> Result<()>
where
    S: std::future::Future<Output = ()> + Send + 'static,
{
    let mut app = main_router(state);

    if args.cors {
        app = app.layer(tower_http::cors::CorsLayer::very_permissive());
    }

    let ip: std::net::IpAddr = args.listen_address.parse()?;
    let addr = std::net::SocketAddr::from((ip, args.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    debug!("Server stopped");
    Ok(())
}

pub fn main_router(state: AppState) -> Router<()> {
    Router::new()
        .nest("/api/reviews", rest_api::review::router())
        // All above routes are protected
        .layer(TokenLayer::new(state.clone()))
        .nest("/api/tours", rest_api::tour::router(state.clone()))
        .nest("/api/users", users_router(state.clone()))
        .layer(tower_cookies::CookieManagerLayer::new())
        .with_state(state)
        .route("/health", get(health))
        .fallback(not_found)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("Can't find {} on this server", uri.path()))
}

pub async fn build_state(config: &ServerConfig) -> Result<AppState> {
    let data_dir = config.backend.ensure_data_dir()?;
    let app_config: AppConfig = config.into();

    let pool = tourhub_dal::new_pool(&config.database_url()).await?;
    tourhub_dal::migrate(&pool).await?;
    info!("Database ready at {}", config.database_url());

    let secret = read_secret(&data_dir).await?;
    if secret.len() != SECRET_SIZE {
        anyhow::bail!(
            "Secret file in {} is corrupted, remove it to generate new one",
            data_dir.display()
        );
    }
    let tokens = TokenManager::new(&secret, config.token_validity);
    Ok(AppState::new(app_config, pool, tokens, LogNotifier))
}

async fn read_secret(data_dir: &Path) -> Result<Vec<u8>, std::io::Error> {
    let secret_file = data_dir.join("secret");

    let secret = if fs::try_exists(&secret_file).await? {
        fs::read(&secret_file).await?
    } else {
        let random_bytes = rand::random::<[u8; SECRET_SIZE]>();
        #[cfg(unix)]
        let mut file = {
            use std::fs::OpenOptions;
            use std::os::unix::fs::OpenOptionsExt;
            {
                // Readable only by the current user
                let _f = OpenOptions::new()
                    .mode(0o600)
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(&secret_file)?;
            }
            fs::File::options().write(true).open(&secret_file).await?
        };
        #[cfg(not(unix))]
        let mut file = fs::File::create(&secret_file).await?;

        file.write_all(&random_bytes).await?;
        info!("Generated new token secret");
        random_bytes.as_ref().to_vec()
    };
    Ok(secret)
}
