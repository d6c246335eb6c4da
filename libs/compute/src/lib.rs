//! # kip-compute
//!
//! Client for the pieces of the Compute Engine API the kip agent touches.
//!
//! ## Capabilities
//!
//! The agent never talks to HTTP directly. It consumes three narrow traits:
//! - [`AddressApi`]: list regional addresses with a filter expression
//! - [`InstanceApi`]: delete / add an access config on a network interface
//! - [`OperationApi`]: fetch the status of a zonal operation
//!
//! [`GceClient`] implements all three over REST. Tests substitute an
//! in-memory provider.
//!
//! ## Glue
//!
//! - [`MetadataClient`]: project id, cluster name and service account token
//!   from the instance metadata server
//! - [`TokenSource`]: bearer tokens for the REST client

mod api;
mod auth;
mod client;
mod error;
mod metadata;
mod types;

pub use api::{AddressApi, ComputeApi, InstanceApi, OperationApi};
pub use auth::{MetadataTokenSource, StaticToken, TokenSource};
pub use client::{GceClient, DEFAULT_COMPUTE_URL, DEFAULT_CONTAINER_URL};
pub use error::{ComputeError, Result};
pub use metadata::{MetadataClient, ServiceAccountToken, DEFAULT_METADATA_URL};
pub use types::*;
