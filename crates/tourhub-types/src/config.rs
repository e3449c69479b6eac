use clap::Parser;
use std::{fs, path::PathBuf};

#[derive(Debug, Clone, Parser)]
pub struct BackendConfig {
    #[arg(
        long,
        env = "TOURHUB_DATABASE_URL",
        help = "Database URL e.g. sqlite://file.db or similar, default is sqlite://[data-dir]/tourhub.db, where data-dir is set by --data-dir"
    )]
    database_url: Option<String>,

    #[arg(
        long,
        env = "TOURHUB_DATA_DIR",
        help = "Data directory (database, token secret etc.), default is system default like ~/.local/share/tourhub",
        default_value_t = default_data_dir()
    )]
    data_dir: String,
}

fn default_data_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("tourhub"))
        .unwrap_or_else(|| PathBuf::from("tourhub"))
        .to_string_lossy()
        .to_string()
}

impl BackendConfig {
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    /// Creates data directory if it does not exist yet
    pub fn ensure_data_dir(&self) -> anyhow::Result<PathBuf> {
        let dir = self.data_dir();
        if !fs::exists(&dir)? {
            fs::create_dir_all(&dir)?;
        } else if !dir.is_dir() {
            anyhow::bail!("Data directory {} is not a directory", dir.display());
        }
        Ok(dir)
    }

    pub fn database_url(&self) -> String {
        self.database_url
            .clone()
            .unwrap_or_else(|| format!("sqlite://{}/tourhub.db", self.data_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_database_url() {
        let config = BackendConfig::try_parse_from(["test", "--data-dir", "/tmp/th"]).unwrap();
        assert_eq!(config.database_url(), "sqlite:///tmp/th/tourhub.db");
        assert_eq!(config.data_dir(), PathBuf::from("/tmp/th"));

        let config = BackendConfig::try_parse_from([
            "test",
            "--data-dir",
            "/tmp/th",
            "--database-url",
            "sqlite::memory:",
        ])
        .unwrap();
        assert_eq!(config.database_url(), "sqlite::memory:");
    }
}
