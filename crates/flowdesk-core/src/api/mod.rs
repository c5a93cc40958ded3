//! REST API client module for the flowdesk backend.
//!
//! This module provides the `ApiClient` and the interceptor `Pipeline`
//! every request passes through.
//!
//! The API uses JWT bearer token authentication obtained from the
//! `/token` endpoint. A 401 from any endpoint ends the local session.

pub mod client;
pub mod error;
pub mod models;
pub mod pipeline;

pub use client::ApiClient;
pub use reqwest::Method;
pub use error::ApiError;
pub use models::{TokenResponse, UserProfile};
pub use pipeline::{BearerAuth, Outcome, Pipeline, RequestInterceptor, ResponseInterceptor, SessionInvalidation};
