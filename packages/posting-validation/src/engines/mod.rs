//! Inference engine adapters.

pub mod disabled;
pub mod http;

pub use disabled::DisabledEngine;
pub use http::HttpInferenceEngine;
