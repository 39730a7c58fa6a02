use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("sampling failed: {0}")]
    SampleFailed(String),
    #[error("alert feed request failed: {0}")]
    FeedUnreachable(#[from] reqwest::Error),
    #[error("alert feed returned malformed payload: {0}")]
    FeedMalformed(String),
}
