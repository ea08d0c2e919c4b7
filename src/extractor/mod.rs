pub mod dispatch;
pub mod ollama;
pub mod repair;

pub use dispatch::{build_prompt, ExtractStats, Extractor};
pub use ollama::{GenerateError, Generator, OllamaGenerator};
pub use repair::{normalize, PAYLOAD_MARKER};
