//! Google Cloud Storage document store for Matchline.
//!
//! [`GcsDocstore`] keeps each [`Document`](matchline_core::Document) as a JSON
//! object named `{prefix}{id}` in a bucket, so a vector index that only
//! stores ids can map its neighbors back to full documents.
//!
//! ```rust,no_run
//! use matchline_gcs::{GcsDocstore, GcsDocstoreConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GcsDocstoreConfig::from_url("gs://my-bucket/docs/")?;
//! let store = GcsDocstore::connect(config, None).await?;
//! # Ok(())
//! # }
//! ```

mod docstore;

pub use docstore::{GcsDocstore, GcsDocstoreConfig, DEFAULT_STORAGE_ENDPOINT};

// Re-export core traits for convenience.
pub use matchline_core::{Docstore, Document};
