//! kip agent library
//!
//! Swaps the ephemeral external IP of a compute instance for a reserved
//! static address drawn from a labelled pool.
//!
//! ## Architecture
//!
//! ```text
//! intake (JSON lines) ──mpsc──▶ Worker ──▶ IpReplacer ─┬─▶ AddressFinder
//!                                                       └─▶ OperationWaiter
//! ```
//!
//! - **Worker**: consumes replacement requests one at a time, in order
//! - **IpReplacer**: find address, detach `external-nat`, attach the new
//!   config, waiting on each provider operation in between
//! - **AddressFinder**: first `RESERVED` address carrying the filter label
//! - **OperationWaiter**: polls a zonal operation until it is `DONE`

pub mod config;
pub mod error;
pub mod finder;
pub mod intake;
pub mod replacer;
pub mod request;
pub mod waiter;
pub mod worker;

pub use config::{AddressFilter, Config};
pub use error::{FindError, ReplaceError, Stage, WaitError};
pub use finder::AddressFinder;
pub use replacer::IpReplacer;
pub use request::ReplacementRequest;
pub use waiter::{OperationWaiter, WaiterConfig};
pub use worker::{Worker, WorkerStats};
