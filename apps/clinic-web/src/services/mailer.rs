//! Envio de emails transacionais

use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Serialize;
use thiserror::Error;

use crate::config::MailGatewayConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail gateway unreachable: {0}")]
    Transport(String),
    #[error("Mail gateway rejected the message ({status})")]
    Rejected { status: u16 },
}

pub trait Mailer: Send + Sync {
    fn send(&self, email: Email) -> BoxFuture<'_, Result<(), MailError>>;
}

#[derive(Serialize)]
struct OutgoingMessage<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

/// Gateway HTTP: recebe o email em JSON
pub struct HttpMailer {
    client: reqwest::Client,
    config: MailGatewayConfig,
    from: String,
}

impl HttpMailer {
    pub fn new(config: MailGatewayConfig, from: String) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| MailError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            config,
            from,
        })
    }

    async fn deliver(&self, email: Email) -> Result<(), MailError> {
        let message = OutgoingMessage {
            from: &self.from,
            to: [email.to.as_str()],
            subject: &email.subject,
            text: &email.body,
        };

        let mut request = self.client.post(&self.config.url).json(&message);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(MailError::Rejected {
                status: response.status().as_u16(),
            });
        }

        tracing::info!(to = %email.to, subject = %email.subject, "Email enviado");
        Ok(())
    }
}

impl Mailer for HttpMailer {
    fn send(&self, email: Email) -> BoxFuture<'_, Result<(), MailError>> {
        Box::pin(self.deliver(email))
    }
}

/// Para desenvolvimento: registra destinatário e assunto no log. O corpo não é
/// registrado porque pode conter códigos de verificação.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, email: Email) -> BoxFuture<'_, Result<(), MailError>> {
        Box::pin(async move {
            tracing::info!(
                to = %email.to,
                subject = %email.subject,
                body_len = email.body.len(),
                "Gateway de email não configurado; mensagem descartada"
            );
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn email() -> Email {
        Email {
            to: "joana@clinica.test".to_string(),
            subject: "Password Reset Code".to_string(),
            body: "Your verification code is: 123456".to_string(),
        }
    }

    fn mailer_for(server: &MockServer) -> HttpMailer {
        HttpMailer::new(
            MailGatewayConfig {
                url: format!("{}/send", server.uri()),
                api_key: None,
            },
            "no-reply@clinica.test".to_string(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_posts_json_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(body_partial_json(serde_json::json!({
                "from": "no-reply@clinica.test",
                "to": ["joana@clinica.test"],
                "subject": "Password Reset Code"
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        mailer_for(&server).send(email()).await.unwrap();
    }

    #[tokio::test]
    async fn test_gateway_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = mailer_for(&server).send(email()).await.unwrap_err();
        assert!(matches!(err, MailError::Rejected { status: 503 }));
    }

    #[tokio::test]
    async fn test_log_mailer_accepts_everything() {
        assert!(LogMailer.send(email()).await.is_ok());
    }
}
