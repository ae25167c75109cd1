//! Roombook MCP (Model Context Protocol) Server
//!
//! Exposes room search, direct reservations, notifications and the booking dialog as MCP
//! tools over stdio.
//!
//! - `BookingTools`: transport-independent tool logic producing JSON envelopes
//! - `RoombookMcpServer`: rmcp adapter registering every tool

pub mod bootstrap;
mod handlers;
mod server;
mod sweeper;
mod tools;

pub use bootstrap::{bootstrap_with_config, notifier_for, Application, BootstrapError};
pub use handlers::*;
pub use server::RoombookMcpServer;
pub use sweeper::spawn_session_sweeper;
pub use tools::*;
