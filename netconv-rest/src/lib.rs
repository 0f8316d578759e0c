//! REST gateway for netconv.
//!
//! [`ManagerClient`] owns the HTTP connection, credentials and retry policy
//! and is shared by every [`RestGateway`], one gateway per object kind.

mod client;
mod error;
mod gateway;

pub use client::{ManagerClient, ManagerConfig};
pub use error::{ClientError, Result};
pub use gateway::RestGateway;
