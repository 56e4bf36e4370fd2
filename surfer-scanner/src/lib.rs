pub mod activity;
pub mod cancel;
pub mod config;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod http;
pub mod model;
pub mod quiescence;
pub mod relay;
pub mod visited;

pub use cancel::CancelToken;
pub use config::SurferConfig;
pub use engine::{EdgeStream, Surfer};
pub use error::SurfError;
pub use extractor::LinkExtractor;
pub use http::{ExtractMode, HttpLinkExtractor};
pub use model::{Edge, ExtractionFailure, Node, TraversalOutcome, TraversalReport};
