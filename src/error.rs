/// Failure of a single chat exchange.
///
/// The `Display` text of each variant is exactly what the UI shows beneath
/// the transcript.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("OpenRouter API key is missing")]
    MissingApiKey,

    /// Message supplied by the service in `error.message`.
    #[error("{0}")]
    Api(String),

    /// HTTP status reason phrase of a failed request.
    #[error("{0}")]
    Status(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("{0}")]
    Network(String),

    #[error("An unknown error occurred")]
    Unknown,
}

impl ChatError {
    /// Build a transport error, falling back to [`ChatError::Unknown`] when the
    /// underlying failure carries no text.
    pub fn network(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            ChatError::Unknown
        } else {
            ChatError::Network(message)
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::network(err.to_string())
    }
}
