use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};

use shared_config::{AppConfig, MailConfig, MailTls};

use crate::tokens;

pub struct TestConfig {
    pub secret_key: String,
    pub database_path: String,
    pub base_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            secret_key: "test-secret-key-for-token-signing-must-be-long-enough".to_string(),
            database_path: ":memory:".to_string(),
            base_url: "http://localhost:3000".to_string(),
        }
    }
}

impl TestConfig {
    /// Point the config at a real database file. Tests that span multiple
    /// requests need this, since every request opens its own connection.
    pub fn with_database(path: &str) -> Self {
        Self {
            database_path: path.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            secret_key: self.secret_key.clone(),
            database_path: self.database_path.clone(),
            base_url: self.base_url.clone(),
            bind_addr: "127.0.0.1:0".to_string(),
            mail: MailConfig {
                server: String::new(),
                port: 25,
                username: String::new(),
                password: String::new(),
                from: "clinic@example.com".to_string(),
                tls: MailTls::None,
                suppress_send: true,
            },
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TokenTestUtils;

impl TokenTestUtils {
    /// Issue a token whose embedded issuance time lies `age_secs` in the
    /// past, for exercising expiry paths without sleeping.
    pub fn issue_token_with_age(
        secret: &str,
        purpose: &str,
        payload: Map<String, Value>,
        age_secs: i64,
    ) -> String {
        tokens::issue_token_at(secret, purpose, payload, Utc::now().timestamp() - age_secs)
    }

    /// Flip one character of the signed body, keeping the overall shape.
    pub fn tamper(token: &str) -> String {
        let mut bytes = token.as_bytes().to_vec();
        bytes[1] = if bytes[1] == b'A' { b'B' } else { b'A' };
        String::from_utf8(bytes).expect("tokens are ASCII")
    }

    pub fn email_payload(email: &str) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("email".to_string(), Value::String(email.to_string()));
        map
    }

    pub fn reschedule_payload(email: &str, reservation_id: &str) -> Map<String, Value> {
        let mut map = Self::email_payload(email);
        map.insert(
            "reservation_id".to_string(),
            Value::String(reservation_id.to_string()),
        );
        map
    }
}
