//! Delivery of password reset links.

use futures::future::BoxFuture;
use tourhub_dal::user::User;
use tracing::info;
use url::Url;

pub trait ResetNotifier: Send + Sync {
    fn send_reset<'a>(&'a self, user: &'a User, reset_url: &'a Url)
        -> BoxFuture<'a, anyhow::Result<()>>;
}

/// Just logs reset link, for development and tests
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl ResetNotifier for LogNotifier {
    fn send_reset<'a>(
        &'a self,
        user: &'a User,
        reset_url: &'a Url,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            info!(
                "Password reset for {} requested, submit new password to {reset_url} (valid for 10 min)",
                user.email
            );
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use tourhub_types::claim::Role;
    use tracing_test::traced_test;

    use super::*;

    #[tokio::test]
    #[traced_test]
    async fn test_log_notifier() {
        let now = time::OffsetDateTime::now_utc();
        let user = User {
            id: 1,
            name: "Leo Gillespie".to_string(),
            email: "leo@example.com".to_string(),
            photo: None,
            role: Role::User,
            active: true,
            version: 1,
            created: time::PrimitiveDateTime::new(now.date(), now.time()),
        };
        let url: Url = "http://localhost:3000/api/users/reset-password/abcd"
            .parse()
            .unwrap();
        let notifier: Box<dyn ResetNotifier> = Box::new(LogNotifier);
        notifier.send_reset(&user, &url).await.unwrap();
        assert!(logs_contain("leo@example.com"));
        assert!(logs_contain("reset-password/abcd"));
    }
}
