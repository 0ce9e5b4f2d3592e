use serde::Serialize;

use crate::metrics::WELCOME_NOTIFICATIONS;
use crate::security::compute_hmac;

pub const WELCOME_SUBJECT: &str = "Welcome to BitsInBinary!";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomeMessage {
    pub event: &'static str,
    pub email: String,
    pub name: String,
    pub subject: &'static str,
    pub timestamp: i64,
}

impl WelcomeMessage {
    pub fn new(email: &str, name: &str) -> Self {
        Self {
            event: "user.welcome",
            email: email.to_string(),
            name: name.to_string(),
            subject: WELCOME_SUBJECT,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Hands welcome messages to a mail relay webhook.
///
/// Delivery is fire-and-forget: registration never waits on it and a failed
/// delivery is only logged. Without a webhook URL the message is logged instead.
#[derive(Clone)]
pub struct WelcomeNotifier {
    client: reqwest::Client,
    url: Option<String>,
    secret: Option<Vec<u8>>,
}

impl WelcomeNotifier {
    pub fn new(client: reqwest::Client, url: Option<String>, secret: Option<Vec<u8>>) -> Self {
        if let Some(ref u) = url {
            if !u.starts_with("https://") {
                tracing::warn!(
                    url = %u,
                    "welcome webhook URL does not use HTTPS — payloads will be sent in cleartext"
                );
            }
        }
        Self {
            client,
            url,
            secret,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    /// Dispatch a welcome message in the background.
    pub fn send_welcome(&self, email: &str, name: &str) {
        let message = WelcomeMessage::new(email, name);

        let Some(url) = self.url.clone() else {
            tracing::info!(email = %message.email, "welcome notification skipped (no relay configured)");
            WELCOME_NOTIFICATIONS.with_label_values(&["skipped"]).inc();
            return;
        };

        let body = match serde_json::to_vec(&message) {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize welcome payload");
                return;
            }
        };
        let signature = self.secret.as_deref().map(|s| compute_hmac(s, &body));
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut req = client
                .post(&url)
                .header("content-type", "application/json")
                .timeout(std::time::Duration::from_secs(5));

            if let Some(ref sig) = signature {
                req = req.header("X-Webhook-Signature", sig.as_str());
            }

            match req.body(body).send().await {
                Ok(resp) if resp.status().is_success() => {
                    WELCOME_NOTIFICATIONS.with_label_values(&["delivered"]).inc();
                    tracing::debug!(url = %url, status = %resp.status(), "welcome notification delivered")
                }
                Ok(resp) => {
                    WELCOME_NOTIFICATIONS.with_label_values(&["rejected"]).inc();
                    tracing::warn!(url = %url, status = %resp.status(), "welcome notification rejected")
                }
                Err(e) => {
                    WELCOME_NOTIFICATIONS.with_label_values(&["failed"]).inc();
                    tracing::warn!(url = %url, error = %e, "welcome notification delivery failed")
                }
            }
        });
    }
}
