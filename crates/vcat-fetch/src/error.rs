use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("empty response body from {url}")]
    EmptyBody { url: String },

    #[error("invalid image URL \"{url}\"")]
    InvalidUrl { url: String },

    #[error("cannot read fallback image {path}: {source}")]
    FallbackImage {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
