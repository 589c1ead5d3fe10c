//! Networking utilities for Larry Butter
//!
//! This crate provides the HTTP client used for the public catalogs, with
//! timeout handling and retry on transient failures.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod retry;

pub use client::{HttpClient, HttpClientConfig, HttpError};
pub use retry::RetryConfig;
