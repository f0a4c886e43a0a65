//! x11core - An X11 core protocol display server
//!
//! The server speaks the core protocol to any number of clients over TCP and
//! Unix sockets, keeps the shared window tree, atoms, properties, selections
//! and input state, and hands rendering to a pluggable [`backend::Backend`].

pub mod protocol;
pub mod backend;
pub mod server;
pub mod connection;
pub mod security;
pub mod resources;

pub use backend::{Backend, BackendDrawable};
pub use server::{Server, ServerConfig, ServerError};

/// Server version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
