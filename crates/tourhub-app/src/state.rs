use std::sync::Arc;

use axum::extract::FromRef;
use tourhub_auth::token::TokenManager;
use tourhub_dal::Pool;
use url::Url;

use crate::notify::ResetNotifier;

#[derive(Clone)]
pub struct AppState {
    state: Arc<AppStateInner>,
}

impl AppState {
    pub fn new(
        app_config: AppConfig,
        pool: Pool,
        tokens: TokenManager,
        notifier: impl ResetNotifier + 'static,
    ) -> Self {
        AppState {
            state: Arc::new(AppStateInner {
                pool,
                tokens,
                app_config,
                notifier: Box::new(notifier),
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.state.app_config
    }

    pub fn build_url(&self, relative_url: &str) -> Result<Url, url::ParseError> {
        self.config().base_url.join(relative_url)
    }

    pub fn pool(&self) -> &Pool {
        &self.state.pool
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.state.tokens
    }

    pub fn notifier(&self) -> &dyn ResetNotifier {
        self.state.notifier.as_ref()
    }
}

/// Context of payloads validated by `axum_valid::Garde`
impl FromRef<AppState> for () {
    fn from_ref(_: &AppState) -> Self {}
}

struct AppStateInner {
    pool: Pool,
    tokens: TokenManager,
    app_config: AppConfig,
    notifier: Box<dyn ResetNotifier>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub base_url: Url,
    pub default_page_size: u32,
    /// Only send token cookie over https
    pub secure_cookies: bool,
}
