//! # quantastor-core
//!
//! Core types and utilities for working with QuantaStor storage arrays.
//!
//! This crate provides the error taxonomy, retry logic, HTTP client defaults,
//! and configuration shared by QuantaStor client crates.
//!
//! ## Modules
//!
//! - [`error`] - Error taxonomy for transport, API, parsing, and task failures
//! - [`client`] - HTTP client defaults and bounded retry with back-off
//! - [`config`] - Validated connection configuration for a managed array
//! - [`query`] - Builder for query-encoded request payloads

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod query;

// Re-export commonly used types
pub use client::{retry, RetryPolicy};
pub use config::QuantastorConfig;
pub use error::{Error, Result};
pub use query::QueryParams;
