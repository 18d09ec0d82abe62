use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::push::{NotifyError, PushNotifier};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub game_id: String,
    pub title: String,
    pub body: String,
}

/// Detached queue in front of a [`PushNotifier`].
///
/// Callers enqueue and return immediately; a worker task delivers each message
/// with a timeout and bounded retries, and failures end in the log.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::UnboundedSender<PushMessage>,
}

impl NotificationDispatcher {
    /// Spawn the delivery worker. Must be called inside a tokio runtime.
    pub fn start(notifier: Arc<dyn PushNotifier>) -> Self {
        Self::start_with(notifier, Duration::from_secs(5), 2)
    }

    pub fn start_with(
        notifier: Arc<dyn PushNotifier>,
        delivery_timeout: Duration,
        max_retries: u32,
    ) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<PushMessage>();

        info!(
            notifier = notifier.name(),
            timeout_ms = delivery_timeout.as_millis() as u64,
            max_retries,
            "Starting notification dispatcher"
        );

        tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                let notifier = notifier.clone();
                // One task per message so a slow delivery never holds up the queue
                tokio::spawn(async move {
                    if let Err(e) =
                        deliver_with_retry(notifier, &message, delivery_timeout, max_retries).await
                    {
                        error!(
                            game_id = %message.game_id,
                            title = %message.title,
                            error = %e,
                            "Push notification dropped"
                        );
                    }
                });
            }

            info!("Notification dispatcher stopped");
        });

        Self { sender }
    }

    /// Dispatcher whose messages go nowhere
    pub fn disabled() -> Self {
        let (sender, _) = mpsc::unbounded_channel();
        Self { sender }
    }

    /// Queue a notification. Never blocks and never fails the caller.
    pub fn notify(&self, game_id: &str, title: impl Into<String>, body: impl Into<String>) {
        let message = PushMessage {
            game_id: game_id.to_string(),
            title: title.into(),
            body: body.into(),
        };
        if self.sender.send(message).is_err() {
            debug!(game_id = %game_id, "Notification dispatcher not running; message discarded");
        }
    }
}

async fn deliver_with_retry(
    notifier: Arc<dyn PushNotifier>,
    message: &PushMessage,
    delivery_timeout: Duration,
    max_retries: u32,
) -> Result<(), NotifyError> {
    let mut attempt = 0;
    loop {
        let outcome = match timeout(
            delivery_timeout,
            notifier.notify(&message.game_id, &message.title, &message.body),
        )
        .await
        {
            Ok(result) => result,
            Err(_elapsed) => Err(NotifyError::Timeout),
        };

        match outcome {
            Ok(()) => return Ok(()),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                warn!(
                    notifier = notifier.name(),
                    game_id = %message.game_id,
                    attempt = attempt + 1,
                    error = %e,
                    "Push delivery failed, will retry"
                );
                tokio::time::sleep(Duration::from_millis(100 * 2_u64.pow(attempt))).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
