pub mod error;
pub mod fetcher;

pub use error::FetchError;
pub use fetcher::{
    load_fallback_image, ImageFetcher, ImageOutcome, ImageSource, BUILTIN_FALLBACK_PNG,
};
