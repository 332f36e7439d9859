//! # quantastor-api
//!
//! Asynchronous client for the QuantaStor storage management API.
//!
//! The array exposes its management surface as GET endpoints under
//! `https://<host>:8153/qstorapi/`. Long-running calls answer with a task
//! reference that [`TaskPoller`] follows to completion.
//!
//! ## Example
//!
//! ```no_run
//! use quantastor_api::{QuantastorClient, QuantastorConfig};
//!
//! # async fn example() -> quantastor_api::Result<()> {
//! let config = QuantastorConfig::new("array.example.com", "admin", "password")?;
//! let client = QuantastorClient::from_config(&config)?;
//!
//! let volume = client
//!     .create_volume("db-data", 10 * 1024 * 1024 * 1024, "", "pool-A")
//!     .await?;
//! println!("Created {} ({})", volume.name, volume.id);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod models;
pub mod task;
pub mod transport;

pub use client::{QuantastorClient, QuantastorClientBuilder};
pub use models::{Host, HostGroup, Pool, StorageSystem, Tier, Volume, VolumeAcl};
pub use task::{TaskPoller, TaskState};
pub use transport::{HttpTransport, HttpTransportBuilder, Transport};

/// Result type for QuantaStor API operations.
pub type Result<T> = quantastor_core::Result<T>;

// Re-export core types
pub use quantastor_core::{Error, QueryParams, QuantastorConfig, RetryPolicy};
