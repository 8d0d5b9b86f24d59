//! Blocking API client for the sketch editor's project endpoints.
//!
//! # Overview
//! `SketchClient` wraps an HTTP transport with credential handling (session
//! cookie or basic token), structured request/response logging through
//! `tracing`, and exponential backoff when the server answers 429.
//!
//! # Design
//! - `SketchClient` is stateless between calls; it holds only immutable
//!   configuration and can be shared across threads.
//! - Every operation is expressed through `request(RequestDescriptor)`; the
//!   project helpers only fix the method and path.
//! - The network sits behind `HttpTransport`, so tests script responses
//!   without a server. `UreqTransport` is the default.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod request;
pub mod retry;
pub mod types;
pub mod workflow;

pub use auth::Credential;
pub use client::{ClientOptions, SketchClient};
pub use config::ClientConfig;
pub use error::{ClientError, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, UreqTransport};
pub use request::{RateLimitInfo, RequestDescriptor, Response, ResponseBody};
pub use retry::{RetryPolicy, Sleeper, ThreadSleeper};
pub use types::{
    AccessCheck, ErrorDetail, ErrorEnvelope, FileEntry, FileType, NewProject, Owner, Project,
    ProjectUpdate, SketchSummary,
};
pub use workflow::{run_upload, UploadOptions, UploadReport};
