use reqwest::StatusCode;
use rota_core::AdapterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscordError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Discord API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("not a Discord snowflake: '{0}'")]
    InvalidId(String),
}

impl From<DiscordError> for AdapterError {
    fn from(err: DiscordError) -> Self {
        let message = err.to_string();
        match err {
            DiscordError::Status { status, .. } => match status {
                StatusCode::NOT_FOUND => AdapterError::NotFound(message),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    AdapterError::Forbidden(message)
                }
                _ => AdapterError::Transient(message),
            },
            DiscordError::InvalidId(_) => AdapterError::NotFound(message),
            DiscordError::Http(_) => AdapterError::Transient(message),
        }
    }
}
