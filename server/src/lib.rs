//! Chorus server library.
//!
//! Drives a native speech engine over HTTP:
//!
//! ```text
//! HTTP request → api (router) → encoder | voices → native::Gateway → engine
//! ```
//!
//! `encoder` turns JSON command batches into the engine's fixed-layout
//! records, `voices` implements voice enumeration and property edits, and
//! `native` owns the engine itself.

pub mod api;
pub mod config;
pub mod encoder;
pub mod error;
pub mod native;
pub mod voices;

pub use api::router;
pub use config::ServerConfig;
pub use error::ApiError;
pub use native::{Gateway, NativeEngine, SimulatedEngine};
