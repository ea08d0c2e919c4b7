pub mod config;
pub mod corpus;
pub mod extractor;
pub mod fetcher;
pub mod models;
pub mod steam;

pub use config::{Config, ExtractConfig, FetchConfig};
pub use corpus::JsonlWriter;
pub use extractor::{normalize, ExtractStats, Extractor, GenerateError, Generator, OllamaGenerator};
pub use fetcher::{fetch_all, FetchOutcome, FetchParams};
pub use models::*;
pub use steam::{ReviewQuery, SteamClient};
