//! SendGrid email delivery.
//!
//! Sends plain-text campaign messages through the v3 mail API with open and
//! click tracking enabled, so delivery events flow back through the webhook.

use async_trait::async_trait;
use campaign_core::config::DeliveryConfig;
use campaign_core::error::TransportError;
use campaign_core::DeliveryTransport;
use std::time::Duration;
use tracing::{debug, info, warn};

/// SendGrid email transport.
pub struct SendGridTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from_email: String,
    from_name: String,
    timeout: Duration,
}

impl SendGridTransport {
    pub fn new(config: &DeliveryConfig) -> Self {
        info!(
            from = %config.from_email,
            endpoint = %config.endpoint,
            "SendGrid transport initialized"
        );
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            from_email: config.from_email.clone(),
            from_name: config.from_name.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn payload(&self, recipient: &str, subject: &str, body: &str) -> serde_json::Value {
        serde_json::json!({
            "personalizations": [{
                "to": [{"email": recipient}]
            }],
            "from": {
                "email": self.from_email,
                "name": self.from_name
            },
            "subject": subject,
            "content": [{
                "type": "text/plain",
                "value": body
            }],
            "tracking_settings": {
                "click_tracking": {"enable": true},
                "open_tracking": {"enable": true}
            }
        })
    }
}

#[async_trait]
impl DeliveryTransport for SendGridTransport {
    async fn deliver(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<u16, TransportError> {
        let start = std::time::Instant::now();

        debug!(to = %recipient, subject = %subject, "Sending email via SendGrid");

        let resp = self
            .client
            .post(format!("{}/v3/mail/send", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&self.payload(recipient, subject, body))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = resp.status().as_u16();
        metrics::histogram!("sendgrid.latency_ms").record(start.elapsed().as_millis() as f64);

        if resp.status().is_success() {
            metrics::counter!("sendgrid.emails_sent").increment(1);
            Ok(status)
        } else {
            let body = resp.text().await.unwrap_or_default();
            warn!(to = %recipient, status, "SendGrid rejected email");
            metrics::counter!("sendgrid.emails_rejected").increment(1);
            Err(TransportError::Rejected { status, body })
        }
    }

    fn name(&self) -> &str {
        "sendgrid"
    }
}

/// Dry-run transport: logs the message and reports `202 Accepted`.
pub struct LogTransport;

#[async_trait]
impl DeliveryTransport for LogTransport {
    async fn deliver(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<u16, TransportError> {
        info!(
            to = %recipient,
            subject = %subject,
            body_len = body.len(),
            "Dry run: email not sent"
        );
        Ok(202)
    }

    fn name(&self) -> &str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let transport = SendGridTransport::new(&DeliveryConfig {
            from_email: "news@shop.example".into(),
            ..Default::default()
        });
        let payload = transport.payload("ada@example.com", "Custom Email", "Hello Ada");

        assert_eq!(payload["personalizations"][0]["to"][0]["email"], "ada@example.com");
        assert_eq!(payload["from"]["email"], "news@shop.example");
        assert_eq!(payload["subject"], "Custom Email");
        assert_eq!(payload["content"][0]["type"], "text/plain");
        assert_eq!(payload["content"][0]["value"], "Hello Ada");
        assert_eq!(payload["tracking_settings"]["open_tracking"]["enable"], true);
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let transport = SendGridTransport::new(&DeliveryConfig {
            endpoint: "http://localhost:3030/".into(),
            ..Default::default()
        });
        assert_eq!(transport.endpoint, "http://localhost:3030");
    }

    #[tokio::test]
    async fn test_log_transport_accepts() {
        let status = LogTransport
            .deliver("a@x", "Custom Email", "body")
            .await
            .unwrap();
        assert_eq!(status, 202);
    }
}
