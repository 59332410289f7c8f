//! Notification delivery channels.

use async_trait::async_trait;
use repcoach_core::{NotificationId, NotificationReceipt, NotificationRequest};
use tokio::sync::Mutex;

/// Error type for notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The channel rejected or failed the delivery.
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// HTTP transport error (webhook channel).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Notification sender abstraction.
///
/// Delivery is at-least-once: the runtime may retry a failed invocation,
/// and the send step is journaled per invocation, so duplicates only occur
/// when the journal itself is lost.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification and report the stored id.
    async fn send(&self, request: &NotificationRequest) -> Result<NotificationReceipt, NotifyError>;
}

/// Logs notifications instead of delivering them. For local runs.
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn send(&self, request: &NotificationRequest) -> Result<NotificationReceipt, NotifyError> {
        tracing::info!(
            user = %request.user_id,
            org = %request.org_id,
            title = %request.title,
            action_url = %request.action_url,
            "notification"
        );
        Ok(NotificationReceipt {
            notification_id: NotificationId::new(),
            email_sent: false,
        })
    }
}

/// Posts each notification as JSON to a webhook endpoint.
///
/// The endpoint owns in-app storage and the optional email leg; a JSON
/// response with an `email_sent` boolean is honored in the receipt.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    /// Create a notifier posting to `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, request: &NotificationRequest) -> Result<NotificationReceipt, NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await?
            .error_for_status()?;

        let email_sent = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| body.get("email_sent").and_then(|v| v.as_bool()))
            .unwrap_or(false);

        Ok(NotificationReceipt {
            notification_id: NotificationId::new(),
            email_sent,
        })
    }
}

/// Records every request instead of delivering. Test double for handler
/// and embedding tests.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<NotificationRequest>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded requests, oldest first.
    pub async fn sent(&self) -> Vec<NotificationRequest> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, request: &NotificationRequest) -> Result<NotificationReceipt, NotifyError> {
        self.sent.lock().await.push(request.clone());
        Ok(NotificationReceipt {
            notification_id: NotificationId::new(),
            email_sent: request.recipient_email.is_some(),
        })
    }
}
