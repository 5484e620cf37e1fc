/*
[INPUT]:  HTTP client configuration and API endpoints
[OUTPUT]: HTTP responses and typed API results
[POS]:    HTTP layer - REST API communication through the token pipeline
[UPDATE]: When adding new endpoints or changing client behavior
*/

pub mod auth;
pub mod client;
pub mod error;
pub mod pipeline;
pub mod processes;
pub mod tasks;

pub use error::{Result, WorkflowError};
pub use pipeline::{ApiRequest, RequestBody};

pub use client::{ClientConfig, WorkflowClient};
