use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use gigreach_core::error::AppError;
use gigreach_core::outreach::{Mailer, sanitize_subject};

const DEFAULT_MAIL_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the external delivery service.
///
/// The service owns SMTP credentials and sending; this side only speaks
/// its `{recipient, subject, body}` → success/failure contract.
#[derive(Clone)]
pub struct HttpMailer {
    client: Client,
    base_url: String,
    timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct MailRequest {
    mail_id: String,
    subject: String,
    mail_body: String,
}

#[derive(Debug, Deserialize)]
struct MailResponse {
    #[allow(dead_code)]
    status: u16,
    message: String,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

impl HttpMailer {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(DEFAULT_MAIL_TIMEOUT)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs: DEFAULT_MAIL_TIMEOUT.as_secs(),
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            AppError::NetworkError(format!("Connection failed: {e}"))
        } else {
            AppError::HttpError(e.to_string())
        }
    }

    /// Probe the delivery service.
    pub async fn health(&self) -> Result<(), AppError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(AppError::MailerError(format!(
                "Delivery service unhealthy: HTTP {}",
                response.status().as_u16()
            )));
        }
        let body: HealthResponse = response
            .json()
            .await
            .map_err(|e| AppError::MailerError(format!("Bad health response: {e}")))?;
        if body.status != "healthy" {
            return Err(AppError::MailerError(format!(
                "Delivery service reports: {}",
                body.status
            )));
        }
        Ok(())
    }
}

impl Mailer for HttpMailer {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<String, AppError> {
        let url = format!("{}/send-mail", self.base_url);
        let request = MailRequest {
            mail_id: recipient.to_string(),
            subject: sanitize_subject(subject),
            mail_body: body.to_string(),
        };

        tracing::info!(%recipient, "Sending outreach email");
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::MailerError(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let body: MailResponse = response
            .json()
            .await
            .map_err(|e| AppError::MailerError(format!("Bad delivery response: {e}")))?;
        tracing::info!(%recipient, "Delivery service: {}", body.message);
        Ok(body.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_payload_shape() {
        let request = MailRequest {
            mail_id: "hire@example.com".into(),
            subject: sanitize_subject("Re: your\r\nposting"),
            mail_body: "Hello".into(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["mail_id"], "hire@example.com");
        assert_eq!(json["subject"], "Re: your posting");
        assert_eq!(json["mail_body"], "Hello");
    }

    #[test]
    fn test_response_parsing_shape() {
        let raw = r#"{"status":200,"message":"Mail sent to hire@example.com"}"#;
        let parsed: MailResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.message, "Mail sent to hire@example.com");
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let mailer = HttpMailer::new("http://localhost:8080/").unwrap();
        assert_eq!(mailer.base_url, "http://localhost:8080");
    }
}
