//! strand-rpc
//!
//! The node's public request surface as a JSON-RPC 2.0 server: DID
//! resolution, operation submission (the thin request handler in front of
//! the batch queue), and node status.

pub mod api;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerState};
