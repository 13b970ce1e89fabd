pub mod config;
pub mod fetcher;
pub mod generator;
pub mod request;
pub mod transfer;

pub use fetcher::{BatchFetcher, ItemOutcome, Progress, RunResult, Step};
pub use generator::{ArtifactReference, GenerationOptions, ImageGenerator, OpenAiGenerator};
pub use request::GenerationRequest;
pub use transfer::{ArtifactTransfer, HttpTransfer};
