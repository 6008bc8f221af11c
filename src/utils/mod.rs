//! Utility modules supporting the fetch and download pipelines.
//!
//! - [`HttpClient`]: batch-owned HTTP client with browser-like defaults
//! - [`ResultCollector`]: rank-indexed sink for concurrent producers
//! - [`ProgressMonitor`]: polls a [`ProgressSource`] and detects stalls
//! - [`Stagger`]: rank-proportional dispatch delays

mod collector;
mod http;
mod monitor;
mod stagger;

pub use collector::{ProgressSource, ResultCollector};
pub use http::HttpClient;
pub use monitor::{Progress, ProgressEvent, ProgressMonitor};
pub use stagger::Stagger;
