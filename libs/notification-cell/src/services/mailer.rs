use async_trait::async_trait;
use lettre::{
    message::Mailbox,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info};

use shared_config::{AppConfig, MailTls};

use crate::models::NotificationError;

/// Best-effort transactional mail. One synchronous attempt per triggering
/// event; no retry queue, no backoff.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str)
        -> Result<(), NotificationError>;
}

#[derive(Debug)]
pub struct SmtpMailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Option<Mailbox>,
    suppress_send: bool,
}

impl SmtpMailer {
    pub fn from_config(config: &AppConfig) -> Result<Self, NotificationError> {
        let mail = &config.mail;

        if mail.suppress_send {
            return Ok(Self {
                transport: None,
                from: None,
                suppress_send: true,
            });
        }

        let from: Mailbox = mail
            .from
            .parse()
            .map_err(|_| NotificationError::Config(format!("bad MAIL_FROM: {:?}", mail.from)))?;

        let mut builder = match mail.tls {
            MailTls::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(&mail.server)
                .map_err(|e| NotificationError::Config(e.to_string()))?,
            MailTls::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&mail.server)
                    .map_err(|e| NotificationError::Config(e.to_string()))?
            }
            MailTls::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&mail.server)
            }
        };
        builder = builder.port(mail.port);
        if !mail.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                mail.username.clone(),
                mail.password.clone(),
            ));
        }

        Ok(Self {
            transport: Some(builder.build()),
            from: Some(from),
            suppress_send: false,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), NotificationError> {
        if self.suppress_send {
            info!(recipient = to, subject, "mail send suppressed");
            return Ok(());
        }

        let (Some(transport), Some(from)) = (&self.transport, &self.from) else {
            return Err(NotificationError::Config(
                "mail transport not configured".to_string(),
            ));
        };

        let recipient: Mailbox = to
            .parse()
            .map_err(|_| NotificationError::InvalidAddress(to.to_string()))?;

        let message = Message::builder()
            .from(from.clone())
            .to(recipient)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| NotificationError::Build(e.to_string()))?;

        debug!(recipient = to, subject, "sending mail");
        transport
            .send(message)
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        Ok(())
    }
}

/// Stand-in used when the SMTP transport cannot be built from configuration.
/// Every send fails, so callers take their normal non-fatal warning path
/// instead of refusing the originating action.
pub struct UnconfiguredMailer {
    pub reason: String,
}

#[async_trait]
impl Mailer for UnconfiguredMailer {
    async fn send(
        &self,
        _to: &str,
        _subject: &str,
        _body: &str,
    ) -> Result<(), NotificationError> {
        Err(NotificationError::Config(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_config::MailConfig;

    fn config(suppress: bool, from: &str) -> AppConfig {
        AppConfig {
            secret_key: "s".to_string(),
            database_path: ":memory:".to_string(),
            base_url: "http://localhost:3000".to_string(),
            bind_addr: String::new(),
            mail: MailConfig {
                server: "smtp.example.com".to_string(),
                port: 587,
                username: String::new(),
                password: String::new(),
                from: from.to_string(),
                tls: MailTls::Starttls,
                suppress_send: suppress,
            },
        }
    }

    #[tokio::test]
    async fn suppressed_mailer_reports_success_without_sending() {
        let mailer = SmtpMailer::from_config(&config(true, "")).unwrap();
        mailer
            .send("patient@example.com", "subject", "body")
            .await
            .unwrap();
    }

    #[test]
    fn bad_from_address_is_a_config_error() {
        let err = SmtpMailer::from_config(&config(false, "not an address")).unwrap_err();
        assert!(matches!(err, NotificationError::Config(_)));
    }
}
