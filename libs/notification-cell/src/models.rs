use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Mail configuration error: {0}")]
    Config(String),

    #[error("Invalid mail address: {0}")]
    InvalidAddress(String),

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Mail transport error: {0}")]
    Transport(String),
}
