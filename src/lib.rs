//! Streaming orchestration and result application for document-editor AI
//! commands: a single-flight stream controller over pluggable model
//! backends, plus a router that applies, reviews, or discards the result.

pub mod backend;
pub mod config;
pub mod display;
pub mod error;
pub mod host;
pub mod request;
pub mod review;
pub mod router;
pub mod session;
pub mod stream;

pub use backend::registry::Registry;
pub use backend::{GenerateRequest, ModelBackend};
pub use config::Config;
pub use error::{Fault, QuillError};
pub use host::{DocumentSink, HostHooks, Notifier};
pub use request::{EditRequest, LocationIntent, SelectionSnapshot};
pub use review::{ReviewItem, ReviewSurface};
pub use router::{ResultRouter, RouteTargets};
pub use session::TerminalOutcome;
pub use stream::{StreamController, StreamSinks};
