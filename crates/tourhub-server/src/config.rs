use std::{path::PathBuf, time::Duration};

use crate::error::Result;
pub use clap::Parser;
use tourhub_app::state::AppConfig;
use tourhub_types::config::BackendConfig;
use url::Url;

#[derive(Debug, Clone, clap::Parser)]
pub struct ServerConfig {
    #[arg(
        short,
        long,
        default_value_t = 3000,
        env = "TOURHUB_LISTEN_PORT",
        help = "Port to listen on"
    )]
    pub port: u16,
    #[arg(
        short,
        long,
        default_value = "127.0.0.1",
        env = "TOURHUB_LISTEN_ADDRESS",
        help = "Address to listen on"
    )]
    pub listen_address: String,

    #[arg(
        long,
        env = "TOURHUB_BASE_URL",
        default_value = "http://localhost:3000",
        help = "Base URL of server, as visible to users"
    )]
    pub base_url: Url,

    #[command(flatten)]
    pub backend: BackendConfig,

    #[arg(
        long,
        env = "TOURHUB_TOKEN_VALIDITY",
        default_value = "90 days",
        help = "Default token validity in human friendly format (e.g. 1d, 1h, 1m, 1s - or combined)",
        value_parser = humantime::parse_duration
    )]
    pub token_validity: Duration,

    #[arg(
        long,
        env = "TOURHUB_DEFAULT_PAGE_SIZE",
        default_value = "100",
        help = "Default page size of listings",
        value_parser = clap::value_parser!(u32).range(1..=10_000)
    )]
    pub default_page_size: u32,

    #[arg(long, env = "TOURHUB_CORS", help = "Enable permissive CORS")]
    pub cors: bool,

    #[arg(
        long,
        env = "TOURHUB_SECURE_COOKIES",
        help = "Send token cookie only over https"
    )]
    pub secure_cookies: bool,
}

impl ServerConfig {
    pub fn load() -> Result<Self> {
        ServerConfig::try_parse().map_err(|e| e.into())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.backend.data_dir()
    }

    pub fn database_url(&self) -> String {
        self.backend.database_url()
    }
}

impl From<&ServerConfig> for AppConfig {
    fn from(config: &ServerConfig) -> Self {
        AppConfig {
            base_url: config.base_url.clone(),
            default_page_size: config.default_page_size,
            secure_cookies: config.secure_cookies,
        }
    }
}
