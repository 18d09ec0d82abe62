use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

/// Errors a push delivery can report
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Delivery timed out")]
    Timeout,

    #[error("Retryable delivery error: {0}")]
    Retryable(String),

    #[error("Delivery rejected: {0}")]
    Rejected(String),
}

impl NotifyError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, NotifyError::Retryable(_) | NotifyError::Timeout)
    }

    pub fn retryable(msg: impl Into<String>) -> Self {
        NotifyError::Retryable(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        NotifyError::Rejected(msg.into())
    }
}

/// Delivers a push message to the devices following a game
#[async_trait]
pub trait PushNotifier: Send + Sync {
    async fn notify(&self, game_id: &str, title: &str, body: &str) -> Result<(), NotifyError>;

    /// Name used in delivery logs
    fn name(&self) -> &'static str;
}

/// Notifier that only writes the message to the log.
///
/// Used when no push provider is configured.
pub struct LoggingPushNotifier;

#[async_trait]
impl PushNotifier for LoggingPushNotifier {
    async fn notify(&self, game_id: &str, title: &str, body: &str) -> Result<(), NotifyError> {
        info!(game_id = %game_id, title = %title, body = %body, "Push notification");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "LoggingPushNotifier"
    }
}
