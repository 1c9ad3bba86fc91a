// src/services/mailer.rs

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Falha ao entregar e-mail para {to}: {reason}")]
pub struct NotificationDeliveryError {
    pub to: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Transporte real das mensagens (SMTP, API, ...). Pode falhar.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, message: &MailMessage) -> Result<(), NotificationDeliveryError>;
}

/// Envio de notificações para o agendador. Nunca retorna erro.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str);
}

/// Transporte padrão: escreve a mensagem no log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn deliver(&self, message: &MailMessage) -> Result<(), NotificationDeliveryError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "📧 E-mail enviado:\n{}",
            message.body
        );
        Ok(())
    }
}

// Envolve um transporte e engole as falhas (só registra no log)
#[derive(Clone)]
pub struct Mailer {
    from: String,
    transport: Arc<dyn MailTransport>,
}

impl Mailer {
    pub fn new(from: impl Into<String>, transport: Arc<dyn MailTransport>) -> Self {
        Self { from: from.into(), transport }
    }
}

#[async_trait]
impl NotificationSender for Mailer {
    async fn send(&self, to: &str, subject: &str, body: &str) {
        let message = MailMessage {
            from: self.from.clone(),
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        };

        // Falha de e-mail nunca derruba o ciclo do agendador; sem retentativa.
        if let Err(e) = self.transport.deliver(&message).await {
            tracing::error!("🔥 [MAIL ERROR] {}", e);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingTransport;
    use super::*;

    #[tokio::test]
    async fn delivery_failures_are_swallowed() {
        let transport = Arc::new(RecordingTransport::failing_for("down@example.com"));
        let mailer = Mailer::new("desk@example.com", transport.clone());

        mailer.send("down@example.com", "Oi", "corpo").await;
        mailer.send("ok@example.com", "Oi", "corpo").await;

        let delivered = transport.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].to, "ok@example.com");
        assert_eq!(delivered[0].from, "desk@example.com");
    }
}
