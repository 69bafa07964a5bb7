pub mod messages;
pub mod models;
pub mod services;

pub use models::NotificationError;
pub use services::mailer::{Mailer, SmtpMailer, UnconfiguredMailer};
