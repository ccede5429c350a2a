//! Error types shared by the provider clients and the poll handler

/// Result type alias for live-lyrics operations
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can make a single poll (or startup) fail
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Album art could not be decoded
    #[error("Image decoding failed: {0}")]
    Image(#[from] image::ImageError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// No Spotify token and nothing to refresh from
    #[error("Spotify is not connected yet, open /login to authorize this app")]
    NotAuthorized,

    /// Token endpoint rejected the request, or the login callback was bogus
    #[error("Spotify authorization failed: {0}")]
    Auth(String),

    /// A provider answered with a non-success status
    #[error("{service} API error ({status}): {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    /// Playback payload lacked something we need
    #[error("Playback response is missing {0}")]
    MissingField(&'static str),

    /// Every pixel was transparent or near-white
    #[error("No usable pixels in album art")]
    EmptyImage,

    #[error("Color count must be between 2 and 256, got {0}")]
    ColorCount(usize),

    /// Median cut produced no box to split
    #[error("Color quantization failed")]
    Quantize,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build an `Api` error from a failed response, using the provider's
    /// `{"error": {"message": ..}}` body when there is one.
    pub async fn from_response(service: &'static str, resp: reqwest::Response) -> Self {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                let err = v.get("error")?;
                err.get("message")
                    .and_then(|m| m.as_str())
                    .or_else(|| err.as_str())
                    .map(str::to_string)
            })
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| body.trim().to_string());

        Self::Api {
            service,
            status: status.as_u16(),
            message,
        }
    }
}
