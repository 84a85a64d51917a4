use thiserror::Error;

/// Error taxonomy for the vendor API client. Transport and server failures
/// are retried inside the executor; everything that escapes here is final.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error {status}, max retries reached")]
    Server { status: u16 },

    #[error("Rate limit exceeded, max retries reached")]
    RateLimited,

    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Interrupted")]
    Interrupted,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Process exit code for the CLI. Documented in `--help`.
    pub fn exit_code(&self) -> i32 {
        match self {
            ApiError::Auth(_) => 2,
            ApiError::Network(_) | ApiError::Server { .. } => 3,
            ApiError::RateLimited => 4,
            ApiError::Interrupted => 130,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_documented_contract() {
        assert_eq!(ApiError::Auth("bad credentials".into()).exit_code(), 2);
        assert_eq!(ApiError::Network("connection refused".into()).exit_code(), 3);
        assert_eq!(ApiError::Server { status: 503 }.exit_code(), 3);
        assert_eq!(ApiError::RateLimited.exit_code(), 4);
        assert_eq!(ApiError::Interrupted.exit_code(), 130);
        assert_eq!(
            ApiError::Api {
                status: 404,
                message: "not found".into()
            }
            .exit_code(),
            1
        );
        assert_eq!(ApiError::Config("missing email".into()).exit_code(), 1);
    }
}
