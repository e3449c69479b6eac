use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use rand::Rng as _;
use reqwest::{Url, header};
use tempfile::TempDir;
use tourhub_app::auth::TokenResponse;
use tourhub_dal::user::{CreateUser, UserRepository};
use tourhub_server::config::{Parser, ServerConfig};
use tourhub_types::claim::Role;
use tracing::{debug, info};

pub mod rest;

pub const TEST_PASSWORD: &str = "test-password-123";

fn random_port() -> Result<u16> {
    let mut rng = rand::rng();

    let mut retries = 3;
    while retries > 0 {
        let port: u16 = rng.random_range(3030..4030);
        let addr: std::net::SocketAddr = format!("127.0.0.1:{}", port).parse()?;
        match std::net::TcpStream::connect_timeout(&addr, std::time::Duration::from_millis(100)) {
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => return Ok(port),
            Err(_) => retries -= 1,
            Ok(_) => retries -= 1,
        }
    }

    Err(anyhow!("Could not find a free port"))
}

pub struct ConfigGuard {
    #[allow(dead_code)]
    data_dir: TempDir,
}

pub fn test_config(test_name: &str, base_dir: &Path) -> Result<(ServerConfig, ConfigGuard)> {
    let tmp_data_dir = TempDir::with_prefix_in(format!("{}_", test_name), base_dir)?;
    let data_dir = tmp_data_dir.path().to_string_lossy().to_string();
    let port = random_port()?;
    let port = port.to_string();
    let base_url = format!("http://localhost:{}", port);
    let args = &[
        "tourhub-e2e-tests",
        "--data-dir",
        &data_dir,
        "--port",
        &port,
        "--base-url",
        &base_url,
        "--default-page-size",
        "10",
    ];
    let config = ServerConfig::try_parse_from(args)?;
    Ok((
        config,
        ConfigGuard {
            data_dir: tmp_data_dir,
        },
    ))
}

pub fn test_data_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("test-data")
}

/// Config in fresh data directory with migrated database
pub async fn prepare_env(test_name: &str) -> Result<(ServerConfig, ConfigGuard)> {
    let base_dir = test_data_dir();
    tokio::fs::create_dir_all(&base_dir).await?;
    let (args, guard) = test_config(test_name, &base_dir)?;
    let pool = tourhub_dal::new_pool(&args.database_url()).await?;
    tourhub_dal::migrate(&pool).await?;
    pool.close().await;
    Ok((args, guard))
}

/// Starts server in background and waits until it is healthy
pub async fn spawn_server(args: ServerConfig) -> Result<()> {
    let health_url = args.base_url.join("health")?;
    tokio::spawn(async move {
        if let Err(e) = tourhub_server::run::run(args).await {
            tracing::error!("Server failed: {e}");
        }
    });

    let client = reqwest::Client::new();
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(response) = client.get(health_url.clone()).send().await {
            if response.status().is_success() {
                debug!("Server is up");
                return Ok(());
            }
        }
    }
    Err(anyhow!("Server did not start"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestUser {
    Admin,
    LeadGuide,
    Guide,
    User,
    OtherUser,
}

impl TestUser {
    pub const ALL: [TestUser; 5] = [
        TestUser::Admin,
        TestUser::LeadGuide,
        TestUser::Guide,
        TestUser::User,
        TestUser::OtherUser,
    ];

    pub fn email(&self) -> &'static str {
        match self {
            TestUser::Admin => "admin@example.com",
            TestUser::LeadGuide => "lead@example.com",
            TestUser::Guide => "guide@example.com",
            TestUser::User => "user@example.com",
            TestUser::OtherUser => "other@example.com",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TestUser::Admin => "Admin Adminson",
            TestUser::LeadGuide => "Lead Guide",
            TestUser::Guide => "Just Guide",
            TestUser::User => "Ursula User",
            TestUser::OtherUser => "Otto Other",
        }
    }

    pub fn role(&self) -> Role {
        match self {
            TestUser::Admin => Role::Admin,
            TestUser::LeadGuide => Role::LeadGuide,
            TestUser::Guide => Role::Guide,
            TestUser::User | TestUser::OtherUser => Role::User,
        }
    }
}

async fn create_test_users(args: &ServerConfig) -> Result<()> {
    let pool = tourhub_dal::new_pool(&args.database_url()).await?;
    let repository = UserRepository::new(pool.clone());
    for user in TestUser::ALL {
        let payload = CreateUser {
            name: user.name().to_string(),
            email: user.email().parse()?,
            photo: None,
            password: TEST_PASSWORD.to_string(),
            password_confirm: TEST_PASSWORD.to_string(),
        };
        repository.create(payload, user.role()).await?;
    }
    pool.close().await;
    Ok(())
}

/// Logs in and returns client sending the token in Authorization header
pub async fn login(base_url: &Url, user: TestUser) -> Result<(reqwest::Client, TokenResponse)> {
    let response = reqwest::Client::new()
        .post(base_url.join("api/users/login")?)
        .json(&serde_json::json!({"email": user.email(), "password": TEST_PASSWORD}))
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(anyhow!("Login failed with status {}", response.status()));
    }
    let token: TokenResponse = response.json().await?;
    let client = bearer_client(&token.token)?;
    Ok((client, token))
}

pub fn bearer_client(token: &str) -> Result<reqwest::Client> {
    let mut headers = header::HeaderMap::new();
    let mut value = header::HeaderValue::from_str(&format!("Bearer {}", token))?;
    value.set_sensitive(true);
    headers.insert(header::AUTHORIZATION, value);
    let client = reqwest::Client::builder()
        .default_headers(headers)
        .build()?;
    Ok(client)
}

/// Creates all test users, starts server and logs in as given user
pub async fn launch_env(
    args: ServerConfig,
    user: TestUser,
) -> Result<(reqwest::Client, TokenResponse)> {
    create_test_users(&args).await?;
    let base_url = args.base_url.clone();
    spawn_server(args).await?;
    let res = login(&base_url, user).await?;
    info!("Logged in as {:?}", user);
    Ok(res)
}

pub fn extend_url(url: &Url, segment: impl ToString) -> Url {
    let mut url = url.clone();
    url.path_segments_mut()
        .map(|mut segments| {
            segments.pop_if_empty().push(&segment.to_string());
        })
        .ok();
    url
}

pub fn now() -> time::PrimitiveDateTime {
    let now = time::OffsetDateTime::now_utc();
    time::PrimitiveDateTime::new(now.date(), now.time())
}
