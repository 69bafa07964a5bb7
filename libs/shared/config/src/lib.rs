use std::env;
use tracing::warn;

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailTls {
    /// Plain connection, no TLS. Local relays and test setups only.
    None,
    /// Plain connection upgraded via STARTTLS.
    Starttls,
    /// TLS from the first byte (typically port 465).
    Implicit,
}

impl MailTls {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "none" => Some(MailTls::None),
            "starttls" => Some(MailTls::Starttls),
            "implicit" => Some(MailTls::Implicit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub tls: MailTls,
    /// When set, mail is logged instead of sent. For non-production environments.
    pub suppress_send: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Secret key for signing access tokens and staff session cookies.
    pub secret_key: String,
    pub database_path: String,
    /// Base URL used to build absolute links embedded in emails.
    pub base_url: String,
    pub bind_addr: String,
    pub mail: MailConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            secret_key: env::var("SECRET_KEY").unwrap_or_else(|_| {
                warn!("SECRET_KEY not set, using empty value");
                String::new()
            }),
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| {
                warn!("DATABASE_PATH not set, using default");
                "instance/appointment.db".to_string()
            }),
            base_url: env::var("BASE_URL").unwrap_or_else(|_| {
                warn!("BASE_URL not set, using default");
                "http://localhost:3000".to_string()
            }),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            mail: MailConfig {
                server: env::var("MAIL_SERVER").unwrap_or_else(|_| {
                    warn!("MAIL_SERVER not set, using empty value");
                    String::new()
                }),
                port: env::var("MAIL_PORT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(587),
                username: env::var("MAIL_USERNAME").unwrap_or_default(),
                password: env::var("MAIL_PASSWORD").unwrap_or_default(),
                from: env::var("MAIL_FROM").unwrap_or_else(|_| {
                    warn!("MAIL_FROM not set, using empty value");
                    String::new()
                }),
                tls: env::var("MAIL_TLS")
                    .ok()
                    .and_then(|v| {
                        let parsed = MailTls::parse(&v);
                        if parsed.is_none() {
                            warn!("MAIL_TLS value {:?} not recognized, using starttls", v);
                        }
                        parsed
                    })
                    .unwrap_or(MailTls::Starttls),
                suppress_send: env::var("MAIL_SUPPRESS_SEND")
                    .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                    .unwrap_or(false),
            },
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.secret_key.is_empty() && !self.database_path.is_empty()
    }

    pub fn is_mail_configured(&self) -> bool {
        self.mail.suppress_send || (!self.mail.server.is_empty() && !self.mail.from.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mail_tls_parses_known_modes() {
        assert_eq!(MailTls::parse("none"), Some(MailTls::None));
        assert_eq!(MailTls::parse("STARTTLS"), Some(MailTls::Starttls));
        assert_eq!(MailTls::parse("implicit"), Some(MailTls::Implicit));
        assert_eq!(MailTls::parse("opportunistic"), None);
    }
}
